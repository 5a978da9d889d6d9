// 该文件是 Gangjian （钢检） 项目的一部分。
// src/output/save_image_file.rs - 保存标注图像与检测记录
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  inspection::{Inspection, InspectionReport},
  output::Render,
  url_file_path,
};

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 把检测报告以 JSON 写在图像旁边（同名 `.json`）
#[derive(Debug, Clone, Default)]
pub struct Record {
  pub pretty: bool,
}

impl Record {
  pub fn record(&self, report: &InspectionReport, image_path: &Path) -> Result<PathBuf, SaveImageFileError> {
    let path = image_path.with_extension("json");
    let text = if self.pretty {
      serde_json::to_string_pretty(report)?
    } else {
      serde_json::to_string(report)?
    };
    std::fs::write(&path, text)?;
    Ok(path)
  }
}

pub struct SaveImageFileOutput {
  path: PathBuf,
  record: Option<Record>,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: PathBuf::from(url_file_path(uri)),
      record: None,
    })
  }
}

impl SaveImageFileOutput {
  pub fn with_record(mut self, record: Record) -> Self {
    self.record = Some(record);
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn save_image(&self, image: &image::RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;
    info!("保存标注图像到文件: {}", self.path.display());

    Ok(())
  }
}

impl Render<Inspection> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, result: &Inspection) -> Result<(), Self::Error> {
    self.save_image(&result.annotated)?;

    if let Some(record) = &self.record {
      let path = record.record(&result.report(), &self.path)?;
      info!("保存检测记录到文件: {}", path.display());
    }

    Ok(())
  }
}
