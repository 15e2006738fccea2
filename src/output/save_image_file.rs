// 该文件是 Tanjing （探镜） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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
  path::{Path, PathBuf},
  sync::atomic::{AtomicUsize, Ordering},
};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::ImageFrame,
  model::DetectResult,
  output::{
    Render,
    draw::{Draw, DrawError, resize_to_width},
  },
  query_value, url_file_path,
};

/// `image:///path/out.png?font=...&width=...`
pub struct SaveImageFileOutput {
  path: PathBuf,
  draw: Draw,
  display_width: Option<u32>,
  rendered: AtomicUsize,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("绘制器错误: {0}")]
  DrawError(#[from] DrawError),
  #[error("显示宽度无效: {0}")]
  InvalidWidth(String),
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

    let display_width = match query_value(uri, "width") {
      Some(v) => match v.parse::<u32>() {
        Ok(width) if width > 0 => Some(width),
        _ => return Err(SaveImageFileError::InvalidWidth(v)),
      },
      None => None,
    };

    Ok(SaveImageFileOutput {
      path: url_file_path(uri),
      draw: Draw::from_font_path(query_value(uri, "font").as_deref())?,
      display_width,
      rendered: AtomicUsize::new(0),
    })
  }
}

impl SaveImageFileOutput {
  /// 第一帧写入配置的路径；之后的帧在文件名主干后追加帧名
  fn frame_path(&self, frame: &ImageFrame) -> PathBuf {
    if self.rendered.fetch_add(1, Ordering::Relaxed) == 0 {
      return self.path.clone();
    }
    let stem = self
      .path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_default();
    let file_name = match self.path.extension() {
      Some(ext) => format!("{}-{}.{}", stem, frame.name(), ext.to_string_lossy()),
      None => format!("{}-{}", stem, frame.name()),
    };
    self.path.with_file_name(file_name)
  }

  fn save_image(&self, image: image::RgbImage, path: &Path) -> Result<(), SaveImageFileError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(SaveImageFileError::IoError)?;
    }

    image.save(path).map_err(SaveImageFileError::ImageError)?;

    info!("保存图像到文件: {}", path.display());

    Ok(())
  }
}

impl Render<ImageFrame, DetectResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &ImageFrame, result: &DetectResult) -> Result<(), Self::Error> {
    let mut image = self.draw.draw_detection_on_frame(frame, result);
    if let Some(width) = self.display_width {
      image = resize_to_width(&image, width);
    }
    let path = self.frame_path(frame);
    self.save_image(image, &path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{Detection, PixelRect};
  use image::{Rgb, RgbImage};

  fn frame(name: &str) -> ImageFrame {
    ImageFrame::new(name, RgbImage::from_pixel(80, 80, Rgb([0, 0, 0])))
  }

  fn result() -> DetectResult {
    DetectResult::from(vec![Detection::new(
      0.9,
      "cat",
      16,
      PixelRect {
        left: 5,
        top: 40,
        right: 30,
        bottom: 75,
      },
    )])
  }

  #[test]
  fn saves_annotated_image_and_names_later_frames() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("out.png");
    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();

    output.render_result(&frame("first"), &result()).unwrap();
    output.render_result(&frame("second"), &result()).unwrap();

    let saved = image::open(&path).unwrap().into_rgb8();
    // 右下角远离框上方的文字
    assert_eq!(saved.get_pixel(30, 75), &Rgb([100, 255, 0]));
    assert!(dir.path().join("nested").join("out-second.png").exists());
  }

  #[test]
  fn scales_to_display_width() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.png");
    let url = Url::parse(&format!("image://{}?width=20", path.display())).unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();

    output.render_result(&frame("photo"), &result()).unwrap();
    let saved = image::open(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), (20, 20));
  }

  #[test]
  fn rejects_bad_parameters() {
    let url = Url::parse("image:///tmp/out.png?width=0").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::InvalidWidth(_))
    ));

    let url = Url::parse("folder:///tmp/out").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }
}
