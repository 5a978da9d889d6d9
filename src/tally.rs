// 该文件是 Gangjian （钢检） 项目的一部分。
// src/tally.rs - 缺陷类别计数
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use serde::{Serialize, ser::SerializeSeq};

use crate::model::DetectResult;

/// 缺陷类别计数，按类别首次出现的顺序排列
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefectTally {
  entries: Vec<(String, usize)>,
}

impl DefectTally {
  pub fn from_result(result: &DetectResult) -> Self {
    let mut tally = Self::default();
    for item in result.items.iter() {
      tally.add(&result.class_name(item));
    }
    tally
  }

  fn add(&mut self, name: &str) {
    match self.entries.iter_mut().find(|(n, _)| n == name) {
      Some((_, count)) => *count += 1,
      None => self.entries.push((name.to_string(), 1)),
    }
  }

  pub fn get(&self, name: &str) -> Option<usize> {
    self
      .entries
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, count)| *count)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
    self.entries.iter().map(|(n, c)| (n.as_str(), *c))
  }

  /// 所有类别计数之和，等于检测框数量
  pub fn total(&self) -> usize {
    self.entries.iter().map(|(_, c)| c).sum()
  }

  /// 不同类别的数量
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[derive(Serialize)]
struct TallyEntry<'a> {
  name: &'a str,
  count: usize,
}

impl Serialize for DefectTally {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
    for (name, count) in self.iter() {
      seq.serialize_element(&TallyEntry { name, count })?;
    }
    seq.end()
  }
}
