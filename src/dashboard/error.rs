// 该文件是 Gangjian （钢检） 项目的一部分。
// src/dashboard/error.rs - 看板 HTTP 错误
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

use axum::{
  Json,
  extract::multipart::MultipartError,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::{input::InputError, inspection::InspectError};

#[derive(Error, Debug)]
pub enum DashboardError {
  #[error("上传数据解析失败: {0}")]
  Multipart(#[from] MultipartError),
  #[error("缺少上传图像字段 `image`")]
  MissingImage,
  #[error("置信度取值无效: {0}")]
  InvalidConfidence(String),
  #[error("{0}")]
  Input(#[from] InputError),
  #[error("{0}")]
  Inspect(#[from] InspectError),
  #[error("结果图像编码失败: {0}")]
  Encode(#[from] image::ImageError),
  #[error("后台任务失败: {0}")]
  Join(#[from] tokio::task::JoinError),
  #[error("尚无检测结果")]
  NoInspection,
}

impl DashboardError {
  pub fn status(&self) -> StatusCode {
    match self {
      DashboardError::Multipart(e) => e.status(),
      DashboardError::MissingImage | DashboardError::InvalidConfidence(_) => StatusCode::BAD_REQUEST,
      DashboardError::Input(e) => match e {
        InputError::Empty | InputError::Decode(_) => StatusCode::BAD_REQUEST,
        InputError::TooLarge(..) => StatusCode::PAYLOAD_TOO_LARGE,
        InputError::UnsupportedFormat => StatusCode::UNSUPPORTED_MEDIA_TYPE,
      },
      DashboardError::NoInspection => StatusCode::NOT_FOUND,
      DashboardError::Inspect(_) | DashboardError::Encode(_) | DashboardError::Join(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}

impl IntoResponse for DashboardError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!("请求处理失败: {}", self);
    } else if status != StatusCode::NOT_FOUND {
      warn!("拒绝请求: {}", self);
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn input_errors_map_to_client_statuses() {
    assert_eq!(DashboardError::from(InputError::Empty).status(), StatusCode::BAD_REQUEST);
    assert_eq!(
      DashboardError::from(InputError::TooLarge(11, 10)).status(),
      StatusCode::PAYLOAD_TOO_LARGE
    );
    assert_eq!(
      DashboardError::from(InputError::UnsupportedFormat).status(),
      StatusCode::UNSUPPORTED_MEDIA_TYPE
    );
    assert_eq!(DashboardError::MissingImage.status(), StatusCode::BAD_REQUEST);
  }

  #[test]
  fn inference_failure_is_server_error() {
    let err = InspectError::Infer("no session".into());
    assert_eq!(
      DashboardError::from(err).status(),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }

  #[test]
  fn missing_inspection_is_not_found() {
    let response = DashboardError::NoInspection.into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
  }
}
