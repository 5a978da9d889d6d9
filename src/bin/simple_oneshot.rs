// 该文件是 Gangjian （钢检） 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图像检测
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

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use gangjian::{
  FromUrl,
  input::ImageFileInput,
  inspection::Inspector,
  model::{LabelTable, Thresholds, Yolov8Builder},
  output::{Record, SaveImageFileOutput, draw::Draw},
  task::{OneShotTask, Task},
};

/// 对单张钢材图像进行缺陷检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型路径
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 标注图像输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 类别表 TOML 文件
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.25", value_name = "THRESHOLD")]
  pub confidence: f32,
  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.7", value_name = "THRESHOLD")]
  pub iou: f32,
  /// 标签字号（像素）
  #[arg(long, default_value = "18", value_name = "PIXELS")]
  pub font_size: f32,
  /// 不写出 JSON 检测记录
  #[arg(long)]
  pub no_record: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = ImageFileInput::from_url(&args.input)?;

  let mut builder = Yolov8Builder::from_url(&args.model)?;
  if let Some(path) = &args.labels {
    let labels = LabelTable::from_toml_file(path)
      .with_context(|| format!("无法读取类别表 {}", path.display()))?;
    builder = builder.labels(labels);
  }
  let inspector = Inspector::new(builder.build()?).with_draw(Draw::default().with_font_size(args.font_size));

  let mut output = SaveImageFileOutput::from_url(&args.output)?;
  if !args.no_record {
    output = output.with_record(Record { pretty: true });
  }

  let thresholds = Thresholds::default()
    .with_confidence(args.confidence)
    .with_iou(args.iou);
  let inspection = OneShotTask::default()
    .with_thresholds(thresholds)
    .run_task(input, &inspector, &output)?;

  if inspection.tally.is_empty() {
    info!("未检测到缺陷，材料放行");
  } else {
    info!("检测到 {} 个缺陷，需要处理:", inspection.total_defects());
    for (name, count) in inspection.tally.iter() {
      info!("  - {}: {} detected", name, count);
    }
  }

  Ok(())
}
