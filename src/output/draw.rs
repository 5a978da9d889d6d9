// 该文件是 Gangjian （钢检） 项目的一部分。
// src/output/draw.rs - 缺陷检测结果可视化
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};

use crate::model::{DetectItem, DetectResult};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 18.0;
const LABEL_PADDING: i32 = 2;
const BOX_THICKNESS: u32 = 2;
const PALETTE_SIZE: u32 = 20;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// 检测框绘制工具
#[derive(Clone)]
pub struct Draw {
  font: FontArc,
  font_scale: PxScale,
  colors: Vec<Rgb<u8>>,
}

impl std::fmt::Debug for Draw {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Draw")
      .field("font_scale", &self.font_scale)
      .field("colors", &self.colors.len())
      .finish_non_exhaustive()
  }
}

impl Default for Draw {
  fn default() -> Self {
    let font_data: &'static [u8] = include_bytes!("../../assets/font.ttf");
    let font = FontArc::try_from_slice(font_data).expect("无法加载嵌入的字体文件");

    // 类别颜色按色相均匀分布
    let colors = (0..PALETTE_SIZE)
      .map(|i| hsv_to_rgb((i as f32 / PALETTE_SIZE as f32) * 360.0, 0.85, 0.95))
      .collect();

    Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      colors,
    }
  }
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = match h {
    h if h < 60.0 => (c, x, 0.0),
    h if h < 120.0 => (x, c, 0.0),
    h if h < 180.0 => (0.0, c, x),
    h if h < 240.0 => (0.0, x, c),
    h if h < 300.0 => (x, 0.0, c),
    _ => (c, 0.0, x),
  };

  Rgb([
    ((r + m) * 255.0).round() as u8,
    ((g + m) * 255.0).round() as u8,
    ((b + m) * 255.0).round() as u8,
  ])
}

impl Draw {
  pub fn with_font_size(mut self, size: f32) -> Self {
    self.font_scale = PxScale::from(size.max(6.0));
    self
  }

  pub fn class_color(&self, class_id: u32) -> Rgb<u8> {
    self.colors[class_id as usize % self.colors.len()]
  }

  /// 返回画好检测框的新图像，原图不变
  pub fn annotate(&self, image: &RgbImage, result: &DetectResult) -> RgbImage {
    let mut annotated = image.clone();
    self.draw_detections_on_image(&mut annotated, result);
    annotated
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    for item in result.items.iter() {
      let label = format!("{} {:.2}", result.class_name(item), item.score);
      self.draw_bbox_with_label(image, item, &label);
    }
  }

  // bbox 为归一化坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox_with_label(&self, image: &mut RgbImage, item: &DetectItem, label: &str) {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
      return;
    }

    let x_min = ((item.bbox[0] * w as f32).floor() as i32).clamp(0, w as i32 - 1);
    let y_min = ((item.bbox[1] * h as f32).floor() as i32).clamp(0, h as i32 - 1);
    let x_max = ((item.bbox[2] * w as f32).ceil() as i32).clamp(0, w as i32 - 1);
    let y_max = ((item.bbox[3] * h as f32).ceil() as i32).clamp(0, h as i32 - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    let color = self.class_color(item.class_id);
    for t in 0..BOX_THICKNESS as i32 {
      let bw = (x_max - x_min + 1 - 2 * t).max(1) as u32;
      let bh = (y_max - y_min + 1 - 2 * t).max(1) as u32;
      draw_hollow_rect_mut(image, Rect::at(x_min + t, y_min + t).of_size(bw, bh), color);
    }

    let (text_w, text_h) = text_size(self.font_scale, &self.font, label);
    let label_w = text_w as i32 + 2 * LABEL_PADDING;
    let label_h = text_h as i32 + 2 * LABEL_PADDING;

    // 标签优先放在框上方，空间不足时放进框内
    let label_x = x_min;
    let label_y = if y_min >= label_h { y_min - label_h } else { y_min };
    let label_w = label_w.min(w as i32 - label_x);
    if label_w <= 0 {
      return;
    }

    draw_filled_rect_mut(
      image,
      Rect::at(label_x, label_y).of_size(label_w as u32, label_h as u32),
      color,
    );
    draw_text_mut(
      image,
      TEXT_COLOR,
      label_x + LABEL_PADDING,
      label_y + LABEL_PADDING,
      self.font_scale,
      &self.font,
      label,
    );
  }
}
