// 该文件是 Tanjing （探镜） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use chrono::{DateTime, Datelike, Local};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::ImageFrame,
  model::DetectResult,
  output::{
    Render,
    draw::{Draw, DrawError, Record, RecordFormat},
  },
  query_value, url_file_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("绘制器错误: {0}")]
  DrawError(#[from] DrawError),
}

pub enum DrawWrapper {
  Draw(Box<Draw>),
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result(
    &self,
    path: &Path,
    frame: &ImageFrame,
    result: &DetectResult,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        let image: RgbImage = draw.draw_detection_on_frame(frame, result);
        image.save(path)?;
      }
      DrawWrapper::Record(record) => {
        frame.image().save(path)?;
        record.record(frame, result, path)?;
      }
    };

    Ok(())
  }
}

/// `folder:///dir?record=name|id|json&always&font=...`
///
/// 文件按日期分目录保存：`dir/YYYY/MM/DD/HH-MM-SS-XXXX-<帧名>.png`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: Mutex<u16>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let draw = match query_value(uri, "record").as_deref() {
      Some("id") => DrawWrapper::Record(Record {
        format: RecordFormat::Id,
      }),
      Some("json") => DrawWrapper::Record(Record {
        format: RecordFormat::Json,
      }),
      Some(_) => DrawWrapper::Record(Record {
        format: RecordFormat::Name,
      }),
      None => DrawWrapper::Draw(Box::new(Draw::from_font_path(
        query_value(uri, "font").as_deref(),
      )?)),
    };

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: url_file_path(uri),
      draw,
      frame_counter: Mutex::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    let mut counter = self
      .frame_counter
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    *counter = counter.wrapping_add(1);
    *counter
  }

  fn frame_path(
    &self,
    now: DateTime<Local>,
    frame: &ImageFrame,
  ) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}-{}.png",
      now.format("%H-%M-%S"),
      self.frame_id(),
      frame.name()
    )))
  }
}

impl Render<ImageFrame, DetectResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &ImageFrame, result: &DetectResult) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("{} 无检测结果，跳过保存", frame.name());
      return Ok(());
    }
    let path = self.frame_path(Local::now(), frame)?;
    self.draw.save_result(&path, frame, result)?;
    info!("记录 {} 到 {}", frame.name(), path.display());
    Ok(())
  }
}
