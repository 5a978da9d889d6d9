// 该文件是 Gangjian （钢检） 项目的一部分。
// src/model/labels.rs - 类别名称表
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

use std::{borrow::Cow, collections::BTreeMap, path::Path};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// NEU-DET 数据集的六类表面缺陷
pub const NEU_DET_LABELS: [&str; 6] = [
  "crazing",
  "inclusion",
  "patches",
  "pitted_surface",
  "rolled-in_scale",
  "scratches",
];

/// 元数据中类别编号允许的最大空缺数
const MAX_ID_GAP: usize = 1024;

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("TOML 解析错误: {0}")]
  TomlError(#[from] toml::de::Error),
  #[error("类别表格式错误: {0}")]
  Malformed(String),
  #[error("类别表为空")]
  Empty,
}

#[derive(Debug, Deserialize)]
struct LabelFile {
  labels: Vec<String>,
}

/// 类别 ID 到名称的映射
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
  names: Vec<String>,
}

impl Default for LabelTable {
  fn default() -> Self {
    Self::neu_det()
  }
}

impl LabelTable {
  pub fn neu_det() -> Self {
    Self::from_names(NEU_DET_LABELS)
  }

  pub fn from_names<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      names: names.into_iter().map(Into::into).collect(),
    }
  }

  /// 读取 TOML 类别文件：`labels = ["crazing", ...]`
  pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let text = std::fs::read_to_string(path.as_ref())?;
    debug!("读取类别文件: {}", path.as_ref().display());
    Self::from_toml_str(&text)
  }

  pub fn from_toml_str(text: &str) -> Result<Self, LabelError> {
    let file: LabelFile = toml::from_str(text)?;
    if file.labels.is_empty() {
      return Err(LabelError::Empty);
    }
    Ok(Self::from_names(file.labels))
  }

  /// 解析 ultralytics 导出的 ONNX 元数据 `names` 字段，
  /// 形如 `{0: 'crazing', 1: 'inclusion'}`
  pub fn from_metadata(text: &str) -> Result<Self, LabelError> {
    let body = text
      .trim()
      .strip_prefix('{')
      .and_then(|s| s.strip_suffix('}'))
      .ok_or_else(|| LabelError::Malformed(text.to_string()))?;

    let mut entries = BTreeMap::new();
    let mut rest = body.trim_start();
    while !rest.is_empty() {
      let (key, after_key) = rest
        .split_once(':')
        .ok_or_else(|| LabelError::Malformed(rest.to_string()))?;
      let id: u32 = key
        .trim()
        .parse()
        .map_err(|_| LabelError::Malformed(key.to_string()))?;

      let after_key = after_key.trim_start();
      let quote = after_key
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| LabelError::Malformed(after_key.to_string()))?;
      let value_body = &after_key[1..];
      let end = value_body
        .find(quote)
        .ok_or_else(|| LabelError::Malformed(after_key.to_string()))?;
      entries.insert(id, value_body[..end].to_string());

      rest = value_body[end + 1..].trim_start();
      rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }

    let max_id = match entries.keys().next_back() {
      Some(id) => *id,
      None => return Err(LabelError::Empty),
    };
    if max_id as usize >= entries.len() + MAX_ID_GAP {
      return Err(LabelError::Malformed(format!(
        "类别编号 {} 远超类别数量 {}",
        max_id,
        entries.len()
      )));
    }
    let names = (0..=max_id)
      .map(|id| entries.remove(&id).unwrap_or_else(|| format!("class_{}", id)))
      .collect::<Vec<_>>();

    Ok(Self { names })
  }

  pub fn name(&self, id: u32) -> Cow<'_, str> {
    match self.names.get(id as usize) {
      Some(name) => Cow::Borrowed(name.as_str()),
      None => Cow::Owned(format!("class_{}", id)),
    }
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }
}
