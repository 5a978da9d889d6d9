// 该文件是 Gangjian （钢检） 项目的一部分。
// src/dashboard.rs - 质检网页看板
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

use std::{net::SocketAddr, sync::Arc};

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use image::RgbImage;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
  input::DEFAULT_MAX_IMAGE_BYTES,
  inspection::Inspector,
  model::{DEFAULT_CONFIDENCE, DEFAULT_IOU, DetectResult, Model},
};

mod error;
mod handlers;
pub mod page;
pub mod state;

pub use self::{
  error::DashboardError,
  state::{Dashboard, DashboardView, Panel, Snapshot},
};

/// multipart 边界与其他表单字段的额外空间
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct Settings {
  /// 启动时滑块的初始值
  pub confidence: f32,
  pub iou: f32,
  pub max_upload_bytes: usize,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      confidence: DEFAULT_CONFIDENCE,
      iou: DEFAULT_IOU,
      max_upload_bytes: DEFAULT_MAX_IMAGE_BYTES,
    }
  }
}

pub struct AppState<M> {
  pub inspector: Arc<Inspector<M>>,
  pub board: Arc<RwLock<Dashboard>>,
  pub settings: Settings,
}

impl<M> Clone for AppState<M> {
  fn clone(&self) -> Self {
    Self {
      inspector: self.inspector.clone(),
      board: self.board.clone(),
      settings: self.settings,
    }
  }
}

impl<M> AppState<M> {
  pub fn new(inspector: Inspector<M>, settings: Settings) -> Self {
    Self {
      inspector: Arc::new(inspector),
      board: Arc::new(RwLock::new(Dashboard::new(settings.confidence))),
      settings,
    }
  }
}

pub fn create_app<M>(state: AppState<M>) -> Router
where
  M: Model<Input = RgbImage, Output = DetectResult> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let body_limit = state.settings.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

  Router::new()
    .route("/", get(handlers::index::<M>))
    .route("/confidence", post(handlers::set_confidence::<M>))
    .route("/inspect", post(handlers::inspect::<M>))
    .route("/api/inspect", post(handlers::api_inspect::<M>))
    .route("/api/inspection", get(handlers::latest::<M>))
    .route("/health", get(handlers::health))
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// 监听并服务，直到收到 Ctrl-C
pub async fn serve<M>(addr: SocketAddr, state: AppState<M>) -> std::io::Result<()>
where
  M: Model<Input = RgbImage, Output = DetectResult> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let listener = tokio::net::TcpListener::bind(addr).await?;
  info!("看板服务已启动: http://{}", listener.local_addr()?);

  axum::serve(listener, create_app(state))
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  info!("看板服务已停止");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!("无法监听 Ctrl-C 信号: {}", e);
    std::future::pending::<()>().await;
  }
  info!("收到 Ctrl-C，正在停止服务...");
}
