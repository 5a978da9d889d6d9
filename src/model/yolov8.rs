// 该文件是 Gangjian （钢检） 项目的一部分。
// src/model/yolov8.rs - YOLOv8 ONNX 检测模型
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

use std::{
  path::Path,
  sync::{Arc, Mutex},
};

use image::RgbImage;
use ndarray::{ArrayViewD, Axis, Ix2};
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::Value,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Letterbox, LetterboxFrame},
  model::{DetectItem, DetectResult, LabelError, LabelTable, Model, Thresholds},
  url_file_path,
};

const YOLOV8_INPUT_SIZE: u32 = 640;
const YOLOV8_BOX_DIMS: usize = 4;
const YOLOV8_MAX_DETECTIONS: usize = 300;
const YOLOV8_INTRA_THREADS: usize = 4;

#[derive(Error, Debug)]
pub enum Yolov8Error {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("类别表错误: {0}")]
  LabelError(#[from] LabelError),
  #[error("模型输出形状异常: {0:?}")]
  UnexpectedOutputShape(Vec<usize>),
  #[error("推理会话锁已损坏")]
  SessionPoisoned,
}

pub struct Yolov8Builder {
  model_path: String,
  labels: Option<LabelTable>,
  input_size: Option<(u32, u32)>,
  intra_threads: usize,
  max_detections: usize,
}

impl FromUrlWithScheme for Yolov8Builder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for Yolov8Builder {
  type Error = Yolov8Error;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(Yolov8Error::ModelPathError(format!(
        "模型路径必须使用 {} 方案，实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    Ok(Self::new(url_file_path(url)))
  }
}

impl Yolov8Builder {
  pub fn new(model_path: impl Into<String>) -> Self {
    Self {
      model_path: model_path.into(),
      labels: None,
      input_size: None,
      intra_threads: YOLOV8_INTRA_THREADS,
      max_detections: YOLOV8_MAX_DETECTIONS,
    }
  }

  /// 覆盖模型元数据中的类别表
  pub fn labels(mut self, labels: LabelTable) -> Self {
    self.labels = Some(labels);
    self
  }

  /// 覆盖模型输入尺寸（宽, 高）
  pub fn input_size(mut self, width: u32, height: u32) -> Self {
    self.input_size = Some((width.max(32), height.max(32)));
    self
  }

  pub fn intra_threads(mut self, threads: usize) -> Self {
    self.intra_threads = threads.max(1);
    self
  }

  pub fn max_detections(mut self, max: usize) -> Self {
    self.max_detections = max.max(1);
    self
  }

  pub fn build(self) -> Result<Yolov8, Yolov8Error> {
    info!("加载模型文件: {}", self.model_path);
    let path = Path::new(&self.model_path);
    if !path.is_file() {
      error!("模型文件不存在: {}", self.model_path);
      return Err(Yolov8Error::ModelPathError(format!(
        "模型文件不存在: {}",
        self.model_path
      )));
    }
    debug!(
      "模型文件大小: {:.2} MB",
      std::fs::metadata(path)?.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 ONNX Runtime 推理会话");
    let session = Session::builder()?
      .with_optimization_level(GraphOptimizationLevel::Level3)?
      .with_intra_threads(self.intra_threads)?
      .commit_from_file(path)?;

    if session.inputs.len() != 1 {
      return Err(Yolov8Error::ModelInvalid(format!(
        "预期模型输入数量为 1, 实际为 {}",
        session.inputs.len()
      )));
    }
    if session.outputs.is_empty() {
      return Err(Yolov8Error::ModelInvalid("模型没有输出".to_string()));
    }

    let input_name = session.inputs[0].name.clone();
    debug!("模型输入: {}", input_name);
    debug!("模型输出数量: {}", session.outputs.len());

    let (names_meta, imgsz_meta) = read_metadata(&session);

    let labels = match (self.labels, names_meta) {
      (Some(labels), _) => labels,
      (None, Some(names)) => LabelTable::from_metadata(&names)?,
      (None, None) => {
        warn!("模型元数据中没有类别表，使用 NEU-DET 默认类别");
        LabelTable::neu_det()
      }
    };
    info!("类别数量: {}", labels.len());

    // imgsz 元数据为 [高, 宽]
    let (input_w, input_h) = self
      .input_size
      .or(imgsz_meta.map(|(h, w)| (w, h)))
      .unwrap_or((YOLOV8_INPUT_SIZE, YOLOV8_INPUT_SIZE));
    info!("模型加载完成，输入尺寸 {}x{}", input_w, input_h);

    Ok(Yolov8 {
      session: Mutex::new(session),
      input_name,
      input_w,
      input_h,
      labels: Arc::new(labels),
      max_detections: self.max_detections,
    })
  }
}

/// 读取 ultralytics 写入的 `names` 与 `imgsz` 元数据
fn read_metadata(session: &Session) -> (Option<String>, Option<(u32, u32)>) {
  let metadata = match session.metadata() {
    Ok(metadata) => metadata,
    Err(e) => {
      warn!("读取模型元数据失败: {}", e);
      return (None, None);
    }
  };

  let names = metadata.custom("names").ok().flatten();
  let imgsz = metadata
    .custom("imgsz")
    .ok()
    .flatten()
    .and_then(|s| parse_imgsz(&s));

  (names, imgsz)
}

/// `[320, 480]` -> (320, 480)，即 (高, 宽)；单个值表示方形输入
fn parse_imgsz(text: &str) -> Option<(u32, u32)> {
  let dims = text
    .trim_matches(|c: char| c == '[' || c == ']' || c.is_whitespace())
    .split(',')
    .map(|v| v.trim().parse::<u32>().ok())
    .collect::<Option<Vec<_>>>()?;

  match dims.as_slice() {
    [size] => Some((*size, *size)),
    [h, w] => Some((*h, *w)),
    _ => None,
  }
}

pub struct Yolov8 {
  session: Mutex<Session>,
  input_name: String,
  input_w: u32,
  input_h: u32,
  labels: Arc<LabelTable>,
  max_detections: usize,
}

impl std::fmt::Debug for Yolov8 {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Yolov8")
      .field("input_name", &self.input_name)
      .field("input_w", &self.input_w)
      .field("input_h", &self.input_h)
      .field("num_classes", &self.labels.len())
      .field("max_detections", &self.max_detections)
      .finish_non_exhaustive()
  }
}

impl Yolov8 {
  pub fn labels(&self) -> &Arc<LabelTable> {
    &self.labels
  }

  /// 模型输入尺寸（宽, 高）
  pub fn input_size(&self) -> (u32, u32) {
    (self.input_w, self.input_h)
  }
}

impl Model for Yolov8 {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = Yolov8Error;

  fn infer(&self, input: &Self::Input, thresholds: &Thresholds) -> Result<Self::Output, Self::Error> {
    debug!("预处理输入图像 {}x{}", input.width(), input.height());
    let frame = LetterboxFrame::from_rgb_image(input, self.input_w, self.input_h);
    let letterbox = *frame.letterbox();
    let input_value = Value::from_array(frame.into_tensor())?;

    debug!("执行模型推理");
    let mut session = self.session.lock().map_err(|_| Yolov8Error::SessionPoisoned)?;
    let outputs = session.run(ort::inputs![&self.input_name => input_value])?;
    let output = outputs[0].try_extract_array::<f32>()?;
    debug!("模型输出形状: {:?}", output.shape());

    let items = postprocess(
      output.view(),
      &letterbox,
      thresholds,
      self.labels.len(),
      self.max_detections,
    )?;
    debug!("检测到 {} 个目标", items.len());

    Ok(DetectResult::new(items, self.labels.clone()))
  }
}

/// 解码 YOLOv8 检测头输出 `[1, 4 + nc, anchors]`（兼容转置的 `[1, anchors, 4 + nc]`）
pub(crate) fn postprocess(
  output: ArrayViewD<f32>,
  letterbox: &Letterbox,
  thresholds: &Thresholds,
  num_classes: usize,
  max_detections: usize,
) -> Result<Vec<DetectItem>, Yolov8Error> {
  let shape = output.shape().to_vec();
  if shape.len() != 3 || shape[0] != 1 {
    return Err(Yolov8Error::UnexpectedOutputShape(shape));
  }

  let preds = output
    .index_axis(Axis(0), 0)
    .into_dimensionality::<Ix2>()
    .map_err(|_| Yolov8Error::UnexpectedOutputShape(shape.clone()))?;

  // 通道数为 4 + nc；若第二维等于该值则无需转置
  let channels = YOLOV8_BOX_DIMS + num_classes;
  let preds = if preds.shape()[0] == channels || preds.shape()[0] < preds.shape()[1] {
    preds
  } else {
    preds.reversed_axes()
  };

  let (rows, anchors) = (preds.shape()[0], preds.shape()[1]);
  if rows <= YOLOV8_BOX_DIMS {
    return Err(Yolov8Error::UnexpectedOutputShape(shape));
  }

  let mut candidates = Vec::new();
  for a in 0..anchors {
    let (class_id, score) = (YOLOV8_BOX_DIMS..rows)
      .map(|r| (r - YOLOV8_BOX_DIMS, preds[[r, a]]))
      .fold((0usize, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

    if score <= thresholds.confidence {
      continue;
    }

    let (cx, cy, w, h) = (preds[[0, a]], preds[[1, a]], preds[[2, a]], preds[[3, a]]);
    let bbox = letterbox.restore_bbox([cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]);
    if bbox[2] <= bbox[0] || bbox[3] <= bbox[1] {
      continue;
    }

    candidates.push(DetectItem {
      class_id: class_id as u32,
      score,
      bbox,
    });
  }
  debug!("置信度过滤后候选框: {}", candidates.len());

  let mut items = nms(candidates, thresholds.iou);
  items.truncate(max_detections);
  Ok(items)
}

/// 按类别的非极大值抑制，结果按置信度降序
pub(crate) fn nms(mut candidates: Vec<DetectItem>, iou_threshold: f32) -> Vec<DetectItem> {
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut kept: Vec<DetectItem> = Vec::new();
  for candidate in candidates {
    let suppressed = kept
      .iter()
      .any(|k| k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold);
    if !suppressed {
      kept.push(candidate);
    }
  }
  kept
}

#[cfg(test)]
mod tests {
  use super::*;
  use ndarray::Array3;

  /// 构造 [1, 4 + nc, anchors] 输出，每个锚点为 (cx, cy, w, h, scores...)
  fn head(anchors: &[[f32; 6]]) -> Array3<f32> {
    let mut out = Array3::<f32>::zeros((1, 6, anchors.len()));
    for (a, values) in anchors.iter().enumerate() {
      for (r, v) in values.iter().enumerate() {
        out[[0, r, a]] = *v;
      }
    }
    out
  }

  fn square() -> Letterbox {
    Letterbox::new(640, 640, 640, 640)
  }

  #[test]
  fn decodes_boxes_above_threshold() {
    let out = head(&[
      [320.0, 320.0, 64.0, 64.0, 0.9, 0.1],
      [100.0, 100.0, 20.0, 20.0, 0.1, 0.2],
    ]);
    let items = postprocess(out.view().into_dyn(), &square(), &Thresholds::default(), 2, 300).unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].class_id, 0);
    assert!((items[0].score - 0.9).abs() < 1e-6);
    assert!((items[0].bbox[0] - 0.45).abs() < 1e-4);
    assert!((items[0].bbox[3] - 0.55).abs() < 1e-4);
  }

  #[test]
  fn picks_best_class_per_anchor() {
    let out = head(&[[320.0, 320.0, 64.0, 64.0, 0.3, 0.8]]);
    let items = postprocess(out.view().into_dyn(), &square(), &Thresholds::default(), 2, 300).unwrap();
    assert_eq!(items[0].class_id, 1);
  }

  #[test]
  fn confidence_threshold_is_per_call() {
    let out = head(&[[320.0, 320.0, 64.0, 64.0, 0.5, 0.0]]);
    let strict = Thresholds::default().with_confidence(0.6);
    let loose = Thresholds::default().with_confidence(0.4);
    assert!(postprocess(out.view().into_dyn(), &square(), &strict, 2, 300).unwrap().is_empty());
    assert_eq!(postprocess(out.view().into_dyn(), &square(), &loose, 2, 300).unwrap().len(), 1);
  }

  #[test]
  fn overlapping_same_class_boxes_are_suppressed() {
    let out = head(&[
      [320.0, 320.0, 100.0, 100.0, 0.9, 0.0],
      [322.0, 322.0, 100.0, 100.0, 0.8, 0.0],
      [322.0, 322.0, 100.0, 100.0, 0.0, 0.7],
    ]);
    let items = postprocess(out.view().into_dyn(), &square(), &Thresholds::default(), 2, 300).unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].class_id, 0);
    assert_eq!(items[1].class_id, 1);
  }

  #[test]
  fn transposed_output_is_accepted() {
    let out = head(&[
      [320.0, 320.0, 64.0, 64.0, 0.9, 0.1],
      [100.0, 100.0, 20.0, 20.0, 0.1, 0.2],
      [500.0, 500.0, 20.0, 20.0, 0.1, 0.7],
      [50.0, 500.0, 20.0, 20.0, 0.1, 0.1],
      [500.0, 50.0, 20.0, 20.0, 0.1, 0.1],
      [200.0, 200.0, 20.0, 20.0, 0.1, 0.1],
      [300.0, 50.0, 20.0, 20.0, 0.1, 0.1],
    ]);
    let transposed = out.permuted_axes([0, 2, 1]);
    let items =
      postprocess(transposed.view().into_dyn(), &square(), &Thresholds::default(), 2, 300).unwrap();
    assert_eq!(items.len(), 2);
  }

  #[test]
  fn detections_are_capped() {
    let out = head(&[
      [100.0, 100.0, 20.0, 20.0, 0.9, 0.0],
      [300.0, 300.0, 20.0, 20.0, 0.8, 0.0],
      [500.0, 500.0, 20.0, 20.0, 0.7, 0.0],
    ]);
    let items = postprocess(out.view().into_dyn(), &square(), &Thresholds::default(), 2, 2).unwrap();
    assert_eq!(items.len(), 2);
    assert!(items[0].score >= items[1].score);
  }

  #[test]
  fn rejects_unexpected_shapes() {
    let out = ndarray::Array2::<f32>::zeros((6, 10));
    assert!(matches!(
      postprocess(out.view().into_dyn(), &square(), &Thresholds::default(), 2, 300),
      Err(Yolov8Error::UnexpectedOutputShape(_))
    ));
  }

  #[test]
  fn parses_imgsz_metadata() {
    assert_eq!(parse_imgsz("[640, 640]"), Some((640, 640)));
    assert_eq!(parse_imgsz("[320, 480]"), Some((320, 480)));
    assert_eq!(parse_imgsz("512"), Some((512, 512)));
    assert_eq!(parse_imgsz("nonsense"), None);
    assert_eq!(parse_imgsz("[1, 2, 3]"), None);
  }

  #[test]
  fn rectangular_input_keeps_width_and_height() {
    // imgsz=[320, 480] 的导出：输入张量为 [1, 3, 320, 480]
    let (h, w) = parse_imgsz("[320, 480]").unwrap();
    let image = RgbImage::from_pixel(600, 300, image::Rgb([9, 9, 9]));
    let frame = LetterboxFrame::from_rgb_image(&image, w, h);
    assert_eq!(frame.tensor().shape(), &[1, 3, 320, 480]);

    // 原图右下角映射回 1.0
    let lb = frame.letterbox();
    let x_max = 600.0 * lb.scale + lb.pad_x;
    let y_max = 300.0 * lb.scale + lb.pad_y;
    let restored = lb.restore_bbox([lb.pad_x, lb.pad_y, x_max, y_max]);
    for v in restored {
      assert!(v == 0.0 || (v - 1.0).abs() < 1e-3, "{restored:?}");
    }
  }

  #[test]
  fn moderately_overlapping_boxes_survive_default_nms() {
    // 同类两个框：交集 7500，并集 12500，IoU = 0.6
    let out = head(&[
      [300.0, 320.0, 100.0, 100.0, 0.9, 0.0],
      [325.0, 320.0, 100.0, 100.0, 0.8, 0.0],
    ]);
    let items = postprocess(out.view().into_dyn(), &square(), &Thresholds::default(), 2, 300).unwrap();
    assert_eq!(items.len(), 2);

    let strict = Thresholds::default().with_iou(0.45);
    let items = postprocess(out.view().into_dyn(), &square(), &strict, 2, 300).unwrap();
    assert_eq!(items.len(), 1);
  }

  #[test]
  fn scheme_is_checked() {
    let url = Url::parse("file:///models/a.onnx").unwrap();
    assert!(matches!(
      Yolov8Builder::from_url(&url),
      Err(Yolov8Error::ModelPathError(_))
    ));
  }

  #[test]
  fn missing_model_file_fails_to_build() {
    let url = Url::parse("onnx:///definitely/not/here.onnx").unwrap();
    let result = Yolov8Builder::from_url(&url).unwrap().build();
    assert!(matches!(result, Err(Yolov8Error::ModelPathError(_))));
  }
}
