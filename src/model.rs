// 该文件是 Gangjian （钢检） 项目的一部分。
// src/model.rs - 模型
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

use serde::Serialize;

pub const DEFAULT_CONFIDENCE: f32 = 0.25;
pub const DEFAULT_IOU: f32 = 0.7;

pub trait Model {
  type Input;
  type Output;
  type Error;

  /// 每次推理都携带阈值，置信度由调用方（看板滑块）决定
  fn infer(&self, input: &Self::Input, thresholds: &Thresholds) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
  pub confidence: f32,
  pub iou: f32,
}

impl Default for Thresholds {
  fn default() -> Self {
    Self {
      confidence: DEFAULT_CONFIDENCE,
      iou: DEFAULT_IOU,
    }
  }
}

impl Thresholds {
  pub fn with_confidence(mut self, confidence: f32) -> Self {
    self.confidence = clamp_unit(confidence);
    self
  }

  pub fn with_iou(mut self, iou: f32) -> Self {
    self.iou = clamp_unit(iou);
    self
  }
}

fn clamp_unit(v: f32) -> f32 {
  if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，相对原图归一化
}

impl DetectItem {
  pub fn area(&self) -> f32 {
    (self.bbox[2] - self.bbox[0]).max(0.0) * (self.bbox[3] - self.bbox[1]).max(0.0)
  }

  pub fn iou(&self, other: &DetectItem) -> f32 {
    let x1 = self.bbox[0].max(other.bbox[0]);
    let y1 = self.bbox[1].max(other.bbox[1]);
    let x2 = self.bbox[2].min(other.bbox[2]);
    let y2 = self.bbox[3].min(other.bbox[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = self.area() + other.area() - intersection;

    if union > 0.0 { intersection / union } else { 0.0 }
  }
}

/// 单张图像的检测结果，附带类别名称表
#[derive(Debug, Clone)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
  pub labels: Arc<LabelTable>,
}

impl DetectResult {
  pub fn new(items: Vec<DetectItem>, labels: Arc<LabelTable>) -> Self {
    Self {
      items: items.into_boxed_slice(),
      labels,
    }
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn class_name(&self, item: &DetectItem) -> std::borrow::Cow<'_, str> {
    self.labels.name(item.class_id)
  }
}

mod labels;
pub use self::labels::{LabelError, LabelTable};

mod yolov8;
pub use self::yolov8::{Yolov8, Yolov8Builder, Yolov8Error};

#[cfg(test)]
mod tests {
  use super::*;

  fn item(bbox: [f32; 4]) -> DetectItem {
    DetectItem {
      class_id: 0,
      score: 0.9,
      bbox,
    }
  }

  #[test]
  fn iou_of_identical_boxes_is_one() {
    let a = item([0.1, 0.1, 0.5, 0.5]);
    assert!((a.iou(&a) - 1.0).abs() < 1e-6);
  }

  #[test]
  fn iou_of_disjoint_boxes_is_zero() {
    let a = item([0.0, 0.0, 0.2, 0.2]);
    let b = item([0.5, 0.5, 0.7, 0.7]);
    assert_eq!(a.iou(&b), 0.0);
  }

  #[test]
  fn thresholds_are_clamped() {
    let t = Thresholds::default().with_confidence(1.7).with_iou(-0.3);
    assert_eq!(t.confidence, 1.0);
    assert_eq!(t.iou, 0.0);
    assert_eq!(Thresholds::default().with_confidence(f32::NAN).confidence, 0.0);
  }
}
