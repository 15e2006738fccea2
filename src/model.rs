// 该文件是 Tanjing （探镜） 项目的一部分。
// src/model.rs - 模型
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

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 原图像素坐标下的矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
  pub left: i32,
  pub top: i32,
  pub right: i32,
  pub bottom: i32,
}

impl PixelRect {
  pub fn width(&self) -> i32 {
    self.right - self.left
  }

  pub fn height(&self) -> i32 {
    self.bottom - self.top
  }
}

/// 单个检测结果，构造后不可修改
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  score: f32,
  label: String,
  class_id: u32,
  bbox: PixelRect,
}

impl Detection {
  pub fn new(score: f32, label: impl Into<String>, class_id: u32, bbox: PixelRect) -> Self {
    Self {
      score,
      label: label.into(),
      class_id,
      bbox,
    }
  }

  pub fn score(&self) -> f32 {
    self.score
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn class_id(&self) -> u32 {
    self.class_id
  }

  pub fn bbox(&self) -> &PixelRect {
    &self.bbox
  }
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

mod engine;
mod label;
mod raw_output;
mod ssd;
#[cfg(feature = "engine_tract")]
mod tract_engine;

pub use self::engine::InferenceEngine;
pub use self::label::{LabelError, LabelTable};
pub use self::raw_output::{DecodeError, MAX_DETECTION_NUM, RawModelOutput};
pub use self::ssd::{
  DetectorConfig, DetectorError, MAX_RESULTS, ObjectDetector, ObjectDetectorBuilder,
  SCORE_THRESHOLD, SSD_INPUT_H, SSD_INPUT_W,
};
#[cfg(feature = "engine_tract")]
pub use self::tract_engine::TractEngine;
