// 该文件是 Gangjian （钢检） 项目的一部分。
// src/inspection.rs - 单张图像的缺陷检测流程
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

use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::{
  model::{DetectResult, Model, Thresholds},
  output::draw::Draw,
  tally::DefectTally,
};

#[derive(Error, Debug)]
pub enum InspectError {
  #[error("模型推理失败: {0}")]
  Infer(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// 检测结论：无缺陷放行，或需要人工处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
  Approved,
  ActionRequired,
}

/// 一次上传对应的完整检测结果
#[derive(Debug, Clone)]
pub struct Inspection {
  pub original: RgbImage,
  pub annotated: RgbImage,
  pub result: DetectResult,
  pub tally: DefectTally,
  pub confidence: f32,
  pub elapsed: Duration,
  pub inspected_at: DateTime<Local>,
}

impl Inspection {
  /// 缺陷总数即检测框数量，与类别分布无关
  pub fn total_defects(&self) -> usize {
    self.result.len()
  }

  pub fn verdict(&self) -> Verdict {
    if self.result.is_empty() {
      Verdict::Approved
    } else {
      Verdict::ActionRequired
    }
  }

  pub fn report(&self) -> InspectionReport {
    InspectionReport {
      inspected_at: self.inspected_at,
      confidence: self.confidence,
      elapsed_ms: self.elapsed.as_secs_f64() * 1000.0,
      width: self.original.width(),
      height: self.original.height(),
      total_defects: self.total_defects(),
      verdict: self.verdict(),
      tally: self.tally.clone(),
      detections: self
        .result
        .items
        .iter()
        .map(|item| ReportDetection {
          class_id: item.class_id,
          class_name: self.result.class_name(item).into_owned(),
          score: item.score,
          bbox: item.bbox,
        })
        .collect(),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportDetection {
  pub class_id: u32,
  pub class_name: String,
  pub score: f32,
  pub bbox: [f32; 4],
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectionReport {
  pub inspected_at: DateTime<Local>,
  pub confidence: f32,
  pub elapsed_ms: f64,
  pub width: u32,
  pub height: u32,
  pub total_defects: usize,
  pub verdict: Verdict,
  pub tally: DefectTally,
  pub detections: Vec<ReportDetection>,
}

/// 持有模型与绘制样式，执行 推理 -> 绘制 -> 计数
pub struct Inspector<M> {
  model: M,
  draw: Draw,
  model_info: String,
}

impl<M> Inspector<M> {
  pub fn new(model: M) -> Self {
    Self {
      model,
      draw: Draw::default(),
      model_info: "YOLOv8".to_string(),
    }
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  /// 看板侧栏显示的模型说明
  pub fn with_model_info(mut self, info: impl Into<String>) -> Self {
    self.model_info = info.into();
    self
  }

  pub fn model_info(&self) -> &str {
    &self.model_info
  }

  pub fn model(&self) -> &M {
    &self.model
  }
}

impl<M> Inspector<M>
where
  M: Model<Input = RgbImage, Output = DetectResult>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn inspect(&self, image: RgbImage, thresholds: &Thresholds) -> Result<Inspection, InspectError> {
    let now = Instant::now();
    let result = self
      .model
      .infer(&image, thresholds)
      .map_err(|e| InspectError::Infer(Box::new(e)))?;
    let elapsed = now.elapsed();
    info!(
      "推理完成，耗时: {:.2?}，检测到 {} 个缺陷 (置信度阈值 {:.2})",
      elapsed,
      result.len(),
      thresholds.confidence
    );

    let annotated = self.draw.annotate(&image, &result);
    let tally = DefectTally::from_result(&result);
    for (name, count) in tally.iter() {
      info!("  - {}: {}", name, count);
    }

    Ok(Inspection {
      original: image,
      annotated,
      result,
      tally,
      confidence: thresholds.confidence,
      elapsed,
      inspected_at: Local::now(),
    })
  }
}
