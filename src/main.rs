// 该文件是 Gangjian （钢检） 项目的一部分。
// src/main.rs - 看板服务主程序
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

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gangjian::{
  FromUrl,
  dashboard::{self, AppState, Settings},
  inspection::Inspector,
  model::{LabelTable, Yolov8, Yolov8Builder},
};

fn load_model(args: &args::Args) -> Result<Yolov8> {
  let mut builder = Yolov8Builder::from_url(&args.model)?
    .intra_threads(args.threads)
    .max_detections(args.max_detections);

  if let (Some(width), Some(height)) = (args.input_width, args.input_height) {
    builder = builder.input_size(width, height);
  }

  if let Some(path) = &args.labels {
    let labels = LabelTable::from_toml_file(path)
      .with_context(|| format!("无法读取类别表 {}", path.display()))?;
    builder = builder.labels(labels);
  }

  Ok(builder.build()?)
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();

  info!("Gangjian 钢材表面缺陷检测看板");
  info!("模型文件路径: {}", args.model);
  info!("监听地址: {}", args.bind);
  info!("置信度阈值: {:.2}", args.confidence);
  info!("NMS 阈值: {:.2}", args.iou);

  // 模型加载失败时不启动服务
  let model = match load_model(&args) {
    Ok(model) => model,
    Err(e) => {
      error!("模型加载失败: {:#}", e);
      return Err(e.context("模型加载失败"));
    }
  };
  let (input_w, input_h) = model.input_size();
  info!(
    "模型加载完成，类别数: {}，输入尺寸 {}x{}",
    model.labels().len(),
    input_w,
    input_h
  );

  let inspector = Inspector::new(model).with_model_info(args.model_info.clone());
  let settings = Settings {
    confidence: args.confidence,
    iou: args.iou,
    max_upload_bytes: args.max_upload_bytes,
  };

  dashboard::serve(args.bind, AppState::new(inspector, settings))
    .await
    .with_context(|| format!("看板服务运行失败 ({})", args.bind))?;

  Ok(())
}
