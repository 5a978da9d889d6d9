// 该文件是 Gangjian （钢检） 项目的一部分。
// src/input.rs - 图像输入与解码
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

use image::{DynamicImage, ImageFormat, RgbImage};
use thiserror::Error;
use tracing::debug;

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

/// 上传图像的默认大小上限（10 MiB）
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// 允许上传的图像格式：jpg / jpeg / png / bmp
pub const ACCEPTED_FORMATS: [ImageFormat; 3] = [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::Bmp];

#[derive(Error, Debug)]
pub enum InputError {
  #[error("图像数据为空")]
  Empty,
  #[error("图像数据过大: {0} 字节 (上限 {1} 字节)")]
  TooLarge(usize, usize),
  #[error("不支持的图像格式")]
  UnsupportedFormat,
  #[error("图像解码失败: {0}")]
  Decode(#[from] image::ImageError),
}

/// 将任意颜色模式的图像统一为 8 位 RGB
pub fn ensure_rgb(image: DynamicImage) -> RgbImage {
  match image {
    DynamicImage::ImageRgb8(rgb) => rgb,
    other => {
      debug!("图像颜色模式为 {:?}，转换为 RGB", other.color());
      other.to_rgb8()
    }
  }
}

/// 解码内存中的图像数据（用于上传）
pub fn decode_image_bytes(bytes: &[u8], max_bytes: usize) -> Result<RgbImage, InputError> {
  if bytes.is_empty() {
    return Err(InputError::Empty);
  }

  if bytes.len() > max_bytes {
    return Err(InputError::TooLarge(bytes.len(), max_bytes));
  }

  let format = image::guess_format(bytes).map_err(|_| InputError::UnsupportedFormat)?;
  if !ACCEPTED_FORMATS.contains(&format) {
    debug!("拒绝图像格式: {:?}", format);
    return Err(InputError::UnsupportedFormat);
  }

  let image = image::load_from_memory_with_format(bytes, format)?;
  debug!(
    "解码图像: {}x{} {:?} ({} 字节)",
    image.width(),
    image.height(),
    format,
    bytes.len()
  );

  Ok(ensure_rgb(image))
}
