// 该文件是 Gangjian （钢检） 项目的一部分。
// src/dashboard/handlers.rs - 看板路由处理
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

use axum::{
  Form, Json,
  body::Bytes,
  extract::{Multipart, State},
  response::{Html, Redirect},
};
use image::RgbImage;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
  dashboard::{AppState, DashboardError, page, state::Snapshot},
  input::decode_image_bytes,
  inspection::InspectionReport,
  model::{DetectResult, Model, Thresholds},
};

pub async fn index<M>(State(state): State<AppState<M>>) -> Html<String>
where
  M: Send + Sync + 'static,
{
  let board = state.board.read().await;
  Html(page::render(&board.view(state.inspector.model_info())))
}

pub async fn health() -> &'static str {
  "ok"
}

#[derive(Debug, Deserialize)]
pub struct ConfidenceForm {
  confidence: String,
}

fn parse_confidence(text: &str) -> Result<f32, DashboardError> {
  text
    .trim()
    .parse::<f32>()
    .map_err(|_| DashboardError::InvalidConfidence(text.to_string()))
}

/// 仅调整滑块，不重新推理
pub async fn set_confidence<M>(
  State(state): State<AppState<M>>,
  Form(form): Form<ConfidenceForm>,
) -> Result<Redirect, DashboardError>
where
  M: Send + Sync + 'static,
{
  let value = parse_confidence(&form.confidence)?;
  state.board.write().await.set_confidence(value);
  Ok(Redirect::to("/"))
}

#[derive(Debug, Default)]
struct Upload {
  image: Option<Bytes>,
  confidence: Option<f32>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, DashboardError> {
  let mut upload = Upload::default();

  while let Some(field) = multipart.next_field().await? {
    let name = field.name().map(str::to_owned);
    match name.as_deref() {
      Some("image") => {
        let unnamed = field.file_name().is_none_or(str::is_empty);
        let bytes = field.bytes().await?;
        // 浏览器未选择文件时仍会提交一个空的文件字段
        if !(unnamed && bytes.is_empty()) {
          upload.image = Some(bytes);
        }
      }
      Some("confidence") => {
        let text = field.text().await?;
        upload.confidence = Some(parse_confidence(&text)?);
      }
      other => debug!("忽略表单字段: {:?}", other),
    }
  }

  Ok(upload)
}

async fn run_inspection<M>(state: &AppState<M>, image: Bytes, confidence: Option<f32>) -> Result<Arc<Snapshot>, DashboardError>
where
  M: Model<Input = RgbImage, Output = DetectResult> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let confidence = match confidence {
    Some(value) => state.board.write().await.set_confidence(value),
    None => state.board.read().await.confidence(),
  };
  let thresholds = Thresholds::default()
    .with_confidence(confidence)
    .with_iou(state.settings.iou);
  info!("收到检测请求: {} 字节，置信度阈值 {:.2}", image.len(), confidence);

  let inspector = state.inspector.clone();
  let max_bytes = state.settings.max_upload_bytes;
  let snapshot = tokio::task::spawn_blocking(move || -> Result<Snapshot, DashboardError> {
    let frame = decode_image_bytes(&image, max_bytes)?;
    let inspection = inspector.inspect(frame, &thresholds)?;
    let original_uri = page::png_data_uri(&inspection.original)?;
    let annotated_uri = page::png_data_uri(&inspection.annotated)?;
    Ok(Snapshot {
      inspection,
      original_uri,
      annotated_uri,
    })
  })
  .await??;

  Ok(state.board.write().await.publish(snapshot))
}

/// 网页表单提交：检测后回到看板页面
pub async fn inspect<M>(State(state): State<AppState<M>>, multipart: Multipart) -> Result<Redirect, DashboardError>
where
  M: Model<Input = RgbImage, Output = DetectResult> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let upload = read_upload(multipart).await?;
  match upload.image {
    Some(image) => {
      run_inspection(&state, image, upload.confidence).await?;
    }
    None => {
      // 没有上传图像时看板保持原状，只记录滑块
      if let Some(value) = upload.confidence {
        state.board.write().await.set_confidence(value);
      }
    }
  }
  Ok(Redirect::to("/"))
}

pub async fn api_inspect<M>(
  State(state): State<AppState<M>>,
  multipart: Multipart,
) -> Result<Json<InspectionReport>, DashboardError>
where
  M: Model<Input = RgbImage, Output = DetectResult> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let upload = read_upload(multipart).await?;
  let image = upload.image.ok_or(DashboardError::MissingImage)?;
  let snapshot = run_inspection(&state, image, upload.confidence).await?;
  Ok(Json(snapshot.inspection.report()))
}

pub async fn latest<M>(State(state): State<AppState<M>>) -> Result<Json<InspectionReport>, DashboardError>
where
  M: Send + Sync + 'static,
{
  let board = state.board.read().await;
  let snapshot = board.latest().ok_or(DashboardError::NoInspection)?;
  Ok(Json(snapshot.inspection.report()))
}
