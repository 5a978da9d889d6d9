// 该文件是 Gangjian （钢检） 项目的一部分。
// src/dashboard/state.rs - 看板状态
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

use std::sync::Arc;

use tracing::debug;

use crate::{
  inspection::{Inspection, Verdict},
  model::DEFAULT_CONFIDENCE,
};

pub const CONFIDENCE_MIN: f32 = 0.0;
pub const CONFIDENCE_MAX: f32 = 1.0;
pub const CONFIDENCE_STEP: f32 = 0.05;

/// 滑块取值：限制在 0..=1 并对齐到步长
pub fn snap_confidence(value: f32) -> f32 {
  if !value.is_finite() {
    return DEFAULT_CONFIDENCE;
  }
  let steps = (CONFIDENCE_MAX - CONFIDENCE_MIN) / CONFIDENCE_STEP;
  let index = ((value.clamp(CONFIDENCE_MIN, CONFIDENCE_MAX) - CONFIDENCE_MIN) / CONFIDENCE_STEP).round();
  CONFIDENCE_MIN + index.min(steps) * CONFIDENCE_STEP
}

/// 已发布到看板的检测结果，图像预先编码为 data URI
#[derive(Debug)]
pub struct Snapshot {
  pub inspection: Inspection,
  pub original_uri: String,
  pub annotated_uri: String,
}

/// 看板的全部可变状态：当前滑块值与最近一次检测
#[derive(Debug, Clone)]
pub struct Dashboard {
  confidence: f32,
  latest: Option<Arc<Snapshot>>,
}

impl Default for Dashboard {
  fn default() -> Self {
    Self::new(DEFAULT_CONFIDENCE)
  }
}

impl Dashboard {
  pub fn new(confidence: f32) -> Self {
    Self {
      confidence: snap_confidence(confidence),
      latest: None,
    }
  }

  pub fn confidence(&self) -> f32 {
    self.confidence
  }

  /// 只修改滑块值，不触发推理，也不改动已显示的结果
  pub fn set_confidence(&mut self, value: f32) -> f32 {
    self.confidence = snap_confidence(value);
    debug!("置信度阈值调整为 {:.2}", self.confidence);
    self.confidence
  }

  pub fn latest(&self) -> Option<&Arc<Snapshot>> {
    self.latest.as_ref()
  }

  pub fn publish(&mut self, snapshot: Snapshot) -> Arc<Snapshot> {
    let snapshot = Arc::new(snapshot);
    self.latest = Some(snapshot.clone());
    snapshot
  }

  pub fn view(&self, model_info: &str) -> DashboardView {
    let panel = match &self.latest {
      None => Panel::Idle,
      Some(snapshot) => {
        let images = ImagePanels {
          original_uri: snapshot.original_uri.clone(),
          annotated_uri: snapshot.annotated_uri.clone(),
        };
        let inspection = &snapshot.inspection;
        match inspection.verdict() {
          Verdict::Approved => Panel::Approved { images },
          Verdict::ActionRequired => Panel::Defects {
            images,
            total: inspection.total_defects(),
            warnings: inspection
              .tally
              .iter()
              .map(|(name, count)| format!("{}: {} detected", name, count))
              .collect(),
          },
        }
      }
    };

    DashboardView {
      model_info: model_info.to_string(),
      confidence: self.confidence,
      panel,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImagePanels {
  pub original_uri: String,
  pub annotated_uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Panel {
  /// 尚未上传图像
  Idle,
  /// 无缺陷，材料放行
  Approved { images: ImagePanels },
  /// 有缺陷：总数与逐类告警
  Defects {
    images: ImagePanels,
    total: usize,
    warnings: Vec<String>,
  },
}

/// 页面渲染所需的全部数据
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
  pub model_info: String,
  pub confidence: f32,
  pub panel: Panel,
}

impl DashboardView {
  pub fn warnings(&self) -> &[String] {
    match &self.panel {
      Panel::Defects { warnings, .. } => warnings,
      _ => &[],
    }
  }

  pub fn total_defects(&self) -> Option<usize> {
    match &self.panel {
      Panel::Idle => None,
      Panel::Approved { .. } => Some(0),
      Panel::Defects { total, .. } => Some(*total),
    }
  }
}
