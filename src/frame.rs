// 该文件是 Gangjian （钢检） 项目的一部分。
// src/frame.rs - 信箱缩放（letterbox）NCHW 帧定义
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

use image::{RgbImage, imageops::FilterType};
use ndarray::{Array3, Array4, Axis};

const RGB_CHANNELS: usize = 3;
const PAD_VALUE: f32 = 114.0 / 255.0;

/// 信箱缩放参数，用于把模型输入坐标映射回原图
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub scale: f32,
  pub pad_x: f32,
  pub pad_y: f32,
  pub orig_w: u32,
  pub orig_h: u32,
}

impl Letterbox {
  pub fn new(orig_w: u32, orig_h: u32, input_w: u32, input_h: u32) -> Self {
    let scale = (input_w as f32 / orig_w.max(1) as f32).min(input_h as f32 / orig_h.max(1) as f32);
    let (new_w, new_h) = Self::resized_dims(orig_w, orig_h, input_w, input_h, scale);

    // 填充取整数像素，与画布上的实际偏移一致
    Self {
      scale,
      pad_x: Self::pad(input_w - new_w),
      pad_y: Self::pad(input_h - new_h),
      orig_w,
      orig_h,
    }
  }

  fn pad(space: u32) -> f32 {
    (space as f32 / 2.0 - 0.1).round().max(0.0)
  }

  fn resized_dims(orig_w: u32, orig_h: u32, input_w: u32, input_h: u32, scale: f32) -> (u32, u32) {
    let new_w = ((orig_w as f32) * scale).round() as u32;
    let new_h = ((orig_h as f32) * scale).round() as u32;
    (new_w.clamp(1, input_w), new_h.clamp(1, input_h))
  }

  /// 将模型输入像素坐标 [x_min, y_min, x_max, y_max] 转为原图归一化坐标
  pub fn restore_bbox(&self, bbox: [f32; 4]) -> [f32; 4] {
    let w = self.orig_w.max(1) as f32;
    let h = self.orig_h.max(1) as f32;
    let unpad = |v: f32, pad: f32, full: f32| ((v - pad) / self.scale).clamp(0.0, full) / full;

    [
      unpad(bbox[0], self.pad_x, w),
      unpad(bbox[1], self.pad_y, h),
      unpad(bbox[2], self.pad_x, w),
      unpad(bbox[3], self.pad_y, h),
    ]
  }
}

/// 模型输入帧：[1, 3, H, W]，取值 0..=1，灰色（114）填充
#[derive(Debug, Clone)]
pub struct LetterboxFrame {
  tensor: Array4<f32>,
  letterbox: Letterbox,
}

impl LetterboxFrame {
  pub fn from_rgb_image(image: &RgbImage, input_w: u32, input_h: u32) -> Self {
    let (orig_w, orig_h) = image.dimensions();
    let letterbox = Letterbox::new(orig_w, orig_h, input_w, input_h);
    let (new_w, new_h) =
      Letterbox::resized_dims(orig_w, orig_h, input_w, input_h, letterbox.scale);

    let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let mut canvas =
      Array3::<f32>::from_elem((RGB_CHANNELS, input_h as usize, input_w as usize), PAD_VALUE);
    let offset_x = letterbox.pad_x as usize;
    let offset_y = letterbox.pad_y as usize;

    for (x, y, pixel) in resized.enumerate_pixels() {
      let (cx, cy) = (offset_x + x as usize, offset_y + y as usize);
      if cx >= input_w as usize || cy >= input_h as usize {
        continue;
      }
      for c in 0..RGB_CHANNELS {
        canvas[[c, cy, cx]] = pixel[c] as f32 / 255.0;
      }
    }

    Self {
      tensor: canvas.insert_axis(Axis(0)),
      letterbox,
    }
  }

  pub fn tensor(&self) -> &Array4<f32> {
    &self.tensor
  }

  pub fn into_tensor(self) -> Array4<f32> {
    self.tensor
  }

  pub fn letterbox(&self) -> &Letterbox {
    &self.letterbox
  }

  pub fn height(&self) -> usize {
    self.tensor.shape()[2]
  }

  pub fn width(&self) -> usize {
    self.tensor.shape()[3]
  }

}
