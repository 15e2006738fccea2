// 该文件是 Tanjing （探镜） 项目的一部分。
// src/input/gallery_dir.rs - 图库目录输入
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

use std::{collections::VecDeque, path::PathBuf};

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, frame::ImageFrame, input::read_image_file::decode_image_file,
  url_file_path,
};

const GALLERY_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

#[derive(Error, Debug)]
pub enum GalleryInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("无法读取图库目录 {0}: {1}")]
  IoError(String, std::io::Error),
}

/// 图库目录输入：按文件名顺序逐张读取
pub struct GalleryInput {
  pending: VecDeque<PathBuf>,
}

impl FromUrlWithScheme for GalleryInput {
  const SCHEME: &'static str = "gallery";
}

impl FromUrl for GalleryInput {
  type Error = GalleryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GalleryInputError::SchemeMismatch);
    }

    let directory = url_file_path(url);
    let entries = std::fs::read_dir(&directory)
      .map_err(|e| GalleryInputError::IoError(directory.display().to_string(), e))?;

    let mut paths = Vec::new();
    for entry in entries {
      let path = entry
        .map_err(|e| GalleryInputError::IoError(directory.display().to_string(), e))?
        .path();
      if path.is_file() && is_gallery_image(&path) {
        paths.push(path);
      }
    }
    paths.sort();
    info!("图库 {} 中共有 {} 张图片", directory.display(), paths.len());

    Ok(GalleryInput {
      pending: paths.into(),
    })
  }
}

fn is_gallery_image(path: &std::path::Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      GALLERY_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
    })
    .unwrap_or(false)
}

impl GalleryInput {
  pub fn remaining(&self) -> usize {
    self.pending.len()
  }
}

impl Iterator for GalleryInput {
  type Item = ImageFrame;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.pending.pop_front() {
      match decode_image_file(&path) {
        Ok(frame) => return Some(frame),
        Err(e) => warn!("跳过无法读取的图片 {}: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{ImageFormat, Rgb, RgbImage};

  #[test]
  fn iterates_images_in_name_order_and_skips_broken_files() {
    let dir = tempfile::tempdir().unwrap();
    RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]))
      .save(dir.path().join("b.png"))
      .unwrap();
    RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]))
      .save_with_format(dir.path().join("a.PNG"), ImageFormat::Png)
      .unwrap();
    std::fs::write(dir.path().join("c.jpg"), b"not a jpeg").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let url = Url::parse(&format!("gallery://{}", dir.path().display())).unwrap();
    let input = GalleryInput::from_url(&url).unwrap();
    assert_eq!(input.remaining(), 3);

    let names: Vec<String> = input.map(|f| f.name().to_string()).collect();
    assert_eq!(names, vec!["a", "b"]);
  }

  #[test]
  fn reads_directory_with_space_in_name() {
    let dir = tempfile::tempdir().unwrap();
    let gallery = dir.path().join("holiday photos");
    std::fs::create_dir(&gallery).unwrap();
    RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]))
      .save(gallery.join("beach.png"))
      .unwrap();

    let url = Url::parse(&format!("gallery://{}", gallery.display())).unwrap();
    let names: Vec<String> = GalleryInput::from_url(&url)
      .unwrap()
      .map(|f| f.name().to_string())
      .collect();
    assert_eq!(names, vec!["beach"]);
  }

  #[test]
  fn missing_directory_is_an_error() {
    let url = Url::parse("gallery:///nonexistent/gallery").unwrap();
    assert!(matches!(
      GalleryInput::from_url(&url),
      Err(GalleryInputError::IoError(..))
    ));
  }
}
