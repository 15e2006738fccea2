// 该文件是 Tanjing （探镜） 项目的一部分。
// src/model/ssd.rs - SSD 检测后处理
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
  sync::Arc,
};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{ImageFrame, Normalize, RgbNhwcFrame},
  model::{
    DecodeError, DetectResult, Detection, InferenceEngine, LabelError, LabelTable, Model,
  },
  query_value, url_file_path,
};

pub const SSD_INPUT_W: u32 = 300;
pub const SSD_INPUT_H: u32 = 300;
pub const SCORE_THRESHOLD: f32 = 0.5;
pub const MAX_RESULTS: usize = 4;

const SSD_DEFAULT_LABEL_FILE: &str = "coco_dataset_labels.txt";

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[source] BoxError),
  #[error("标签加载错误: {0}")]
  LabelError(#[from] LabelError),
  #[error("推理失败: {0}")]
  InferenceFailed(#[source] BoxError),
  #[error("{0}")]
  DecodeError(#[from] DecodeError),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("配置参数无效: {0}")]
  InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
  pub score_threshold: f32,
  pub max_results: usize,
  pub normalize: Normalize,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      score_threshold: SCORE_THRESHOLD,
      max_results: MAX_RESULTS,
      normalize: Normalize::default(),
    }
  }
}

impl DetectorConfig {
  pub fn validate(&self) -> Result<(), DetectorError> {
    if !(0.0..=1.0).contains(&self.score_threshold) {
      return Err(DetectorError::InvalidConfig(format!(
        "置信度阈值必须在 [0, 1] 之间, 实际为 {}",
        self.score_threshold
      )));
    }
    if self.max_results == 0 {
      return Err(DetectorError::InvalidConfig(
        "最大结果数必须大于 0".to_string(),
      ));
    }
    if !self.normalize.mean.is_finite()
      || !self.normalize.std.is_finite()
      || self.normalize.std == 0.0
    {
      return Err(DetectorError::InvalidConfig(format!(
        "归一化参数无效: mean={}, std={}",
        self.normalize.mean, self.normalize.std
      )));
    }
    Ok(())
  }
}

/// 目标检测器：预处理、推理、解码
///
/// 只持有不可变状态，输出缓冲每次调用重新分配，可以在线程间共享。
pub struct ObjectDetector<E> {
  engine: E,
  labels: Arc<LabelTable>,
  config: DetectorConfig,
}

impl<E: InferenceEngine> ObjectDetector<E> {
  pub fn new(engine: E, labels: Arc<LabelTable>) -> Self {
    Self {
      engine,
      labels,
      config: DetectorConfig::default(),
    }
  }

  pub fn with_config(mut self, config: DetectorConfig) -> Self {
    self.config = config;
    self
  }

  pub fn labels(&self) -> &LabelTable {
    &self.labels
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn detect(&self, frame: &ImageFrame) -> Result<Vec<Detection>, DetectorError> {
    let (width, height) = (frame.width(), frame.height());

    // 每次调用都重新缩放和归一化
    let input = RgbNhwcFrame::<SSD_INPUT_W, SSD_INPUT_H>::resize_from(frame.image());
    let tensor = self.config.normalize.apply(&input);
    debug!(
      "输入 {} ({}x{}) 缩放至 {}x{}",
      frame.name(),
      width,
      height,
      SSD_INPUT_W,
      SSD_INPUT_H
    );

    let raw = self
      .engine
      .run(&tensor)
      .map_err(|e| DetectorError::InferenceFailed(e.into()))?;
    debug!("模型原始输出: {:?}", raw);

    let detections = raw.decode(
      &self.labels,
      width,
      height,
      self.config.score_threshold,
      self.config.max_results,
    )?;
    info!("{}: 检测到 {} 个物体", frame.name(), detections.len());
    for det in &detections {
      let bbox = det.bbox();
      info!(
        "  - {}: {:.2}% at ({}, {}, {}, {})",
        det.label(),
        det.score() * 100.0,
        bbox.left,
        bbox.top,
        bbox.right,
        bbox.bottom
      );
    }

    Ok(detections)
  }
}

impl<E: InferenceEngine> Model for ObjectDetector<E> {
  type Input = ImageFrame;
  type Output = DetectResult;
  type Error = DetectorError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.detect(input).map(DetectResult::from)
  }
}

/// 由 `ssd:///path/model.tflite?labels=...&threshold=...&top_k=...&mean=...&std=...` 构造
#[derive(Debug, Clone)]
pub struct ObjectDetectorBuilder {
  model_path: PathBuf,
  label_path: PathBuf,
  config: DetectorConfig,
}

impl FromUrlWithScheme for ObjectDetectorBuilder {
  const SCHEME: &'static str = "ssd";
}

fn parse_query<T: std::str::FromStr>(url: &Url, key: &str) -> Result<Option<T>, DetectorError> {
  query_value(url, key)
    .map(|v| {
      v.parse::<T>()
        .map_err(|_| DetectorError::InvalidConfig(format!("无法解析参数 {}={}", key, v)))
    })
    .transpose()
}

impl FromUrl for ObjectDetectorBuilder {
  type Error = DetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DetectorError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let model_path = url_file_path(url);
    if model_path.file_name().is_none() {
      return Err(DetectorError::ModelPathError(format!(
        "模型路径缺少文件名: {}",
        url
      )));
    }

    let label_path = query_value(url, "labels")
      .map(PathBuf::from)
      .unwrap_or_else(|| model_path.with_file_name(SSD_DEFAULT_LABEL_FILE));

    let mut config = DetectorConfig::default();
    if let Some(threshold) = parse_query(url, "threshold")? {
      config.score_threshold = threshold;
    }
    if let Some(top_k) = parse_query(url, "top_k")? {
      config.max_results = top_k;
    }
    if let Some(mean) = parse_query(url, "mean")? {
      config.normalize.mean = mean;
    }
    if let Some(std) = parse_query(url, "std")? {
      config.normalize.std = std;
    }
    config.validate()?;

    Ok(Self {
      model_path,
      label_path,
      config,
    })
  }
}

impl ObjectDetectorBuilder {
  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn label_path(&self) -> &Path {
    &self.label_path
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  /// 加载标签表，并与给定的推理引擎组合
  pub fn build_with<E: InferenceEngine>(self, engine: E) -> Result<ObjectDetector<E>, DetectorError> {
    let labels = LabelTable::load(&self.label_path)?;
    info!(
      "检测器就绪: 引擎 {}, {} 个标签, 阈值 {}, 最多 {} 个结果",
      engine.name(),
      labels.len(),
      self.config.score_threshold,
      self.config.max_results
    );
    Ok(ObjectDetector::new(engine, Arc::new(labels)).with_config(self.config))
  }

  #[cfg(feature = "engine_tract")]
  pub fn build(self) -> Result<ObjectDetector<crate::model::TractEngine>, DetectorError> {
    let engine = crate::model::TractEngine::load(&self.model_path)
      .map_err(|e| DetectorError::ModelLoadError(e.into()))?;
    self.build_with(engine)
  }
}
