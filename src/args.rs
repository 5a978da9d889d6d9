// 该文件是 Gangjian （钢检） 项目的一部分。
// src/args.rs - 看板服务参数配置
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

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use url::Url;

/// Gangjian 钢材表面缺陷检测看板
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型路径，例如 onnx:///opt/gangjian/best.onnx
  #[arg(long, env = "GANGJIAN_MODEL", value_name = "MODEL")]
  pub model: Url,

  /// 类别表 TOML 文件，缺省时读取模型元数据
  #[arg(long, env = "GANGJIAN_LABELS", value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 监听地址
  #[arg(long, env = "GANGJIAN_BIND", default_value = "127.0.0.1:8501", value_name = "ADDR")]
  pub bind: SocketAddr,

  /// 滑块初始置信度阈值 (0.0 - 1.0)
  #[arg(long, env = "GANGJIAN_CONFIDENCE", default_value = "0.25", value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, env = "GANGJIAN_IOU", default_value = "0.7", value_name = "THRESHOLD")]
  pub iou: f32,

  /// 覆盖模型输入宽度，缺省时读取模型元数据
  #[arg(long, env = "GANGJIAN_INPUT_WIDTH", requires = "input_height", value_name = "PIXELS")]
  pub input_width: Option<u32>,

  /// 覆盖模型输入高度
  #[arg(long, env = "GANGJIAN_INPUT_HEIGHT", requires = "input_width", value_name = "PIXELS")]
  pub input_height: Option<u32>,

  /// 单张图像最多保留的检测框数量
  #[arg(long, env = "GANGJIAN_MAX_DETECTIONS", default_value = "300", value_name = "COUNT")]
  pub max_detections: usize,

  /// 推理线程数
  #[arg(long, env = "GANGJIAN_THREADS", default_value = "4", value_name = "COUNT")]
  pub threads: usize,

  /// 上传图像大小上限（字节）
  #[arg(long, env = "GANGJIAN_MAX_UPLOAD_BYTES", default_value = "10485760", value_name = "BYTES")]
  pub max_upload_bytes: usize,

  /// 侧栏显示的模型说明
  #[arg(long, env = "GANGJIAN_MODEL_INFO", default_value = "YOLOv8 Nano | 13ms Real-Time", value_name = "TEXT")]
  pub model_info: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_follow_dashboard_settings() {
    let args = Args::try_parse_from(["gangjian", "--model", "onnx:///models/best.onnx"]).unwrap();
    assert_eq!(args.bind, "127.0.0.1:8501".parse::<SocketAddr>().unwrap());
    assert_eq!(args.confidence, 0.25);
    assert_eq!(args.iou, 0.7);
    assert_eq!(args.max_detections, 300);
    assert_eq!(args.max_upload_bytes, 10 * 1024 * 1024);
    assert!(args.labels.is_none());
    assert!(args.input_width.is_none());
    assert_eq!(args.model_info, "YOLOv8 Nano | 13ms Real-Time");
  }

  #[test]
  fn input_size_needs_both_sides() {
    let args = Args::try_parse_from([
      "gangjian",
      "--model",
      "onnx:///models/best.onnx",
      "--input-width",
      "480",
      "--input-height",
      "320",
    ])
    .unwrap();
    assert_eq!((args.input_width, args.input_height), (Some(480), Some(320)));

    assert!(
      Args::try_parse_from(["gangjian", "--model", "onnx:///m.onnx", "--input-width", "480"]).is_err()
    );
  }

  #[test]
  fn model_is_required() {
    assert!(Args::try_parse_from(["gangjian"]).is_err());
  }
}
