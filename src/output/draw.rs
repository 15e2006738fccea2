// 该文件是 Tanjing （探镜） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{
  Rgb, RgbImage,
  imageops::{self, FilterType},
};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  frame::ImageFrame,
  model::{DetectResult, Detection},
};

// 绘制常量
const BOX_COLOR: [u8; 3] = [100, 255, 0];
const BOX_THICKNESS: i32 = 4;
const LABEL_FONT_SIZE: f32 = 36.0;
const LABEL_COLOR: [u8; 3] = [255, 0, 0];
const SCORE_FONT_SIZE: f32 = 20.0;
const SCORE_COLOR: [u8; 3] = [255, 255, 255];
// 分数文本相对框左上角向上偏移
const SCORE_OFFSET_Y: i32 = 40;

// 未指定字体时依次尝试的系统字体
const SYSTEM_FONT_PATHS: [&str; 6] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
  "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(String),
}

/// 检测结果绘制器，没有可用字体时只绘制矩形框
pub struct Draw {
  font: Option<FontVec>,
  box_color: [u8; 3],
  box_thickness: i32,
  label_font_size: f32,
  label_color: [u8; 3],
  score_font_size: f32,
  score_color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      box_color: BOX_COLOR,
      box_thickness: BOX_THICKNESS,
      label_font_size: LABEL_FONT_SIZE,
      label_color: LABEL_COLOR,
      score_font_size: SCORE_FONT_SIZE,
      score_color: SCORE_COLOR,
    }
  }
}

impl Draw {
  pub fn with_font_file(path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data).map_err(|e| DrawError::InvalidFont(e.to_string()))?;
    info!("加载字体: {}", path.display());
    Ok(Self {
      font: Some(font),
      ..Self::default()
    })
  }

  /// 按可选的字体路径构造，未指定时回退到系统字体
  pub fn from_font_path(path: Option<&str>) -> Result<Self, DrawError> {
    match path {
      Some(path) => Self::with_font_file(path),
      None => Ok(Self::with_system_font(&SYSTEM_FONT_PATHS)),
    }
  }

  /// 使用候选列表中第一个可加载的字体
  pub fn with_system_font(candidates: &[&str]) -> Self {
    for path in candidates {
      if Path::new(path).is_file()
        && let Ok(draw) = Self::with_font_file(path)
      {
        return draw;
      }
    }
    warn!("未找到可用字体，只绘制检测框");
    Self::default()
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  fn draw_detection(&self, image: &mut RgbImage, detection: &Detection) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let bbox = detection.bbox();

    let left = bbox.left.clamp(0, w - 1);
    let top = bbox.top.clamp(0, h - 1);
    let right = bbox.right.clamp(0, w - 1);
    let bottom = bbox.bottom.clamp(0, h - 1);

    if left >= right || top >= bottom {
      return;
    }

    // 向内逐像素加粗
    for t in 0..self.box_thickness {
      let width = right - left + 1 - 2 * t;
      let height = bottom - top + 1 - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(left + t, top + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(self.box_color));
    }

    let Some(font) = &self.font else {
      return;
    };

    // 类别名位于框左上角之上，分数再向上偏移
    let label_y = (top - self.label_font_size as i32).max(0);
    draw_text_mut(
      image,
      Rgb(self.label_color),
      left,
      label_y,
      PxScale::from(self.label_font_size),
      font,
      detection.label(),
    );

    let score_y = (top - SCORE_OFFSET_Y - self.score_font_size as i32).max(0);
    draw_text_mut(
      image,
      Rgb(self.score_color),
      left,
      score_y,
      PxScale::from(self.score_font_size),
      font,
      &format!("{:.2}", detection.score()),
    );
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    for detection in result.items.iter() {
      self.draw_detection(image, detection);
    }
  }

  pub fn draw_detection_on_frame(&self, frame: &ImageFrame, result: &DetectResult) -> RgbImage {
    let mut image = frame.image().clone();
    self.draw_detections_on_image(&mut image, result);
    image
  }
}

/// 按显示宽度等比缩放
pub fn resize_to_width(image: &RgbImage, width: u32) -> RgbImage {
  let ratio = width as f32 / image.width() as f32;
  let height = ((image.height() as f32 * ratio) as u32).max(1);
  imageops::resize(image, width, height, FilterType::Triangle)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
  Name,
  Id,
  Json,
}

/// 检测结果旁路记录
pub struct Record {
  pub format: RecordFormat,
}

impl Record {
  pub fn record(
    &self,
    frame: &ImageFrame,
    result: &DetectResult,
    path: &Path,
  ) -> Result<(), std::io::Error> {
    match self.format {
      RecordFormat::Json => {
        let detections: Vec<_> = result
          .items
          .iter()
          .map(|item| {
            let bbox = item.bbox();
            json!({
              "label": item.label(),
              "class_id": item.class_id(),
              "score": item.score(),
              "bbox": [bbox.left, bbox.top, bbox.right, bbox.bottom],
            })
          })
          .collect();
        let document = json!({
          "frame": frame.name(),
          "width": frame.width(),
          "height": frame.height(),
          "detections": detections,
        });
        std::fs::write(
          path.with_extension("json"),
          serde_json::to_string_pretty(&document)?,
        )?;
      }
      RecordFormat::Name | RecordFormat::Id => {
        let mut records = Vec::new();
        for item in result.items.iter() {
          let name = if self.format == RecordFormat::Name {
            item.label().to_string()
          } else {
            item.class_id().to_string()
          };
          let bbox = item.bbox();
          records.push(format!(
            "{}, {:.4}, {}, {}, {}, {}",
            name, item.score(), bbox.left, bbox.top, bbox.right, bbox.bottom
          ));
        }
        std::fs::write(path.with_extension("txt"), records.join("\n"))?;
      }
    }
    Ok(())
  }
}
