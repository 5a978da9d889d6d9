// 该文件是 Gangjian （钢检） 项目的一部分。
// src/task.rs - 任务定义
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

use image::RgbImage;
use tracing::info;

use crate::{
  inspection::{Inspection, Inspector},
  model::{DetectResult, Model, Thresholds},
  output::Render,
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, inspector: &Inspector<M>, output: &O) -> Result<Self::Output, Self::Error>;
}

/// 取输入的第一帧，检测并输出
#[derive(Debug, Default, Clone, Copy)]
pub struct OneShotTask {
  thresholds: Thresholds,
}

impl OneShotTask {
  pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
    self.thresholds = thresholds;
    self
  }
}

impl<I, M, O, RE> Task<I, M, O> for OneShotTask
where
  I: Iterator<Item = RgbImage>,
  M: Model<Input = RgbImage, Output = DetectResult>,
  M::Error: std::error::Error + Send + Sync + 'static,
  O: Render<Inspection, Error = RE>,
  RE: std::error::Error + Send + Sync + 'static,
{
  type Output = Inspection;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, inspector: &Inspector<M>, output: &O) -> Result<Inspection, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功 ({}x{})，开始推理...", frame.width(), frame.height());

    let inspection = inspector.inspect(frame, &self.thresholds)?;
    output.render_result(&inspection)?;
    info!("渲染完成，缺陷总数: {}", inspection.total_defects());

    Ok(inspection)
  }
}
