// 该文件是 Gangjian （钢检） 项目的一部分。
// src/lib.rs - 库主文件
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

#[cfg(feature = "dashboard")]
pub mod dashboard;
pub mod frame;
pub mod input;
pub mod inspection;
pub mod model;
pub mod output;
pub mod tally;
pub mod task;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 将 URL 路径还原为文件系统路径（处理百分号编码，如空格、中文目录名）
pub(crate) fn url_file_path(url: &url::Url) -> String {
  let path = url.path();
  match urlencoding::decode(path) {
    Ok(decoded) => decoded.into_owned(),
    Err(_) => path.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn url_path_is_percent_decoded() {
    let url = url::Url::parse("image:///data/steel%20samples/%E9%92%A2.png").unwrap();
    assert_eq!(url_file_path(&url), "/data/steel samples/钢.png");
  }

  #[test]
  fn plain_url_path_is_unchanged() {
    let url = url::Url::parse("onnx:///models/defectdetector.onnx").unwrap();
    assert_eq!(url_file_path(&url), "/models/defectdetector.onnx");
  }
}
