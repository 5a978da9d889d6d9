// 该文件是 Gangjian （钢检） 项目的一部分。
// src/dashboard/page.rs - 看板页面渲染
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

use std::{fmt::Write as _, io::Cursor};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{ImageFormat, RgbImage};

use crate::dashboard::state::{
  CONFIDENCE_MAX, CONFIDENCE_MIN, CONFIDENCE_STEP, DashboardView, ImagePanels, Panel,
};

const TEMPLATE: &str = include_str!("../../assets/dashboard.html");
const ACCEPT: &str = ".jpg,.jpeg,.png,.bmp";

pub const IDLE_HINT: &str =
  "Upload an image from datasets/NEU-DET-YOLO/images/val to test the system.";
pub const APPROVED_MESSAGE: &str = "No Defects Detected. Material Approved.";

/// 将图像编码为 PNG data URI，供 `<img src>` 直接使用
pub fn png_data_uri(image: &RgbImage) -> Result<String, image::ImageError> {
  let mut buf = Cursor::new(Vec::new());
  image.write_to(&mut buf, ImageFormat::Png)?;
  Ok(format!(
    "data:image/png;base64,{}",
    STANDARD.encode(buf.into_inner())
  ))
}

fn escape(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      c => out.push(c),
    }
  }
  out
}

fn render_images(out: &mut String, images: &ImagePanels) {
  let _ = write!(
    out,
    r#"    <div class="columns">
      <div><h3>Original Feed</h3><img alt="original" src="{}"></div>
      <div><h3>AI Detection Output</h3><img alt="detection" src="{}"></div>
    </div>
    <hr>
"#,
    escape(&images.original_uri),
    escape(&images.annotated_uri)
  );
}

fn render_main(panel: &Panel) -> String {
  let mut out = String::new();
  match panel {
    Panel::Idle => {
      let _ = writeln!(out, r#"    <div class="info">{}</div>"#, escape(IDLE_HINT));
    }
    Panel::Approved { images } => {
      render_images(&mut out, images);
      let _ = writeln!(out, r#"    <div class="success">{}</div>"#, escape(APPROVED_MESSAGE));
    }
    Panel::Defects {
      images,
      total,
      warnings,
    } => {
      render_images(&mut out, images);
      let _ = write!(
        out,
        r#"    <div class="columns">
      <div class="metric"><div class="label">Total Defects</div><div class="value">{}</div><div class="delta">Action Required</div></div>
      <div>
        <p>Identified Issues:</p>
"#,
        total
      );
      for warning in warnings {
        let _ = writeln!(out, r#"        <div class="warning">{}</div>"#, escape(warning));
      }
      out.push_str("      </div>\n    </div>\n");
    }
  }
  out
}

pub fn render(view: &DashboardView) -> String {
  TEMPLATE
    .replace("{{confidence}}", &format!("{:.2}", view.confidence))
    .replace("{{confidence_min}}", &format!("{:.2}", CONFIDENCE_MIN))
    .replace("{{confidence_max}}", &format!("{:.2}", CONFIDENCE_MAX))
    .replace("{{confidence_step}}", &format!("{:.2}", CONFIDENCE_STEP))
    .replace("{{accept}}", ACCEPT)
    .replace("{{model_info}}", &escape(&view.model_info))
    .replace("{{main}}", &render_main(&view.panel))
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn images() -> ImagePanels {
    ImagePanels {
      original_uri: "data:image/png;base64,AAAA".to_string(),
      annotated_uri: "data:image/png;base64,BBBB".to_string(),
    }
  }

  fn view(panel: Panel) -> DashboardView {
    DashboardView {
      model_info: "YOLOv8 Nano".to_string(),
      confidence: 0.25,
      panel,
    }
  }

  #[test]
  fn idle_page_shows_hint_and_slider() {
    let html = render(&view(Panel::Idle));
    assert!(html.contains(IDLE_HINT));
    assert!(html.contains(r#"value="0.25""#));
    assert!(html.contains(r#"step="0.05""#));
    assert!(html.contains("Model: YOLOv8 Nano"));
    assert!(!html.contains("Original Feed"));
    assert!(!html.contains("{{"));
  }

  #[test]
  fn approved_page_has_success_and_no_warnings() {
    let html = render(&view(Panel::Approved { images: images() }));
    assert!(html.contains(APPROVED_MESSAGE));
    assert!(html.contains("Original Feed"));
    assert!(html.contains("AI Detection Output"));
    assert!(!html.contains(r#"class="warning""#));
  }

  #[test]
  fn defect_page_lists_warnings_and_total() {
    let html = render(&view(Panel::Defects {
      images: images(),
      total: 3,
      warnings: vec!["scratches: 2 detected".to_string(), "patches: 1 detected".to_string()],
    }));

    assert!(html.contains(r#"<div class="value">3</div>"#));
    assert!(html.contains("Action Required"));
    assert_eq!(html.matches(r#"class="warning""#).count(), 2);
    let first = html.find("scratches: 2 detected").unwrap();
    let second = html.find("patches: 1 detected").unwrap();
    assert!(first < second);
    assert!(!html.contains(APPROVED_MESSAGE));
  }

  #[test]
  fn class_names_are_escaped() {
    let html = render(&view(Panel::Defects {
      images: images(),
      total: 1,
      warnings: vec!["<script>: 1 detected".to_string()],
    }));
    assert!(html.contains("&lt;script&gt;: 1 detected"));
  }

  #[test]
  fn data_uri_is_png() {
    let uri = png_data_uri(&RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]))).unwrap();
    assert!(uri.starts_with("data:image/png;base64,iVBORw0KGgo"));
  }
}
