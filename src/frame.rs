// 该文件是 Tanjing （探镜） 项目的一部分。
// src/frame.rs - 图像帧与模型输入张量
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

use image::{
  RgbImage,
  imageops::{self, FilterType},
};
use thiserror::Error;

const RGB_CHANNELS: usize = 3;

/// 用户选取的原始图像，尺寸保持不变
#[derive(Debug, Clone)]
pub struct ImageFrame {
  name: String,
  image: RgbImage,
}

impl ImageFrame {
  pub fn new(name: impl Into<String>, image: RgbImage) -> Self {
    Self {
      name: name.into(),
      image,
    }
  }

  /// 帧名称（通常为文件名主干），用于命名输出文件
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
pub struct FrameSizeError {
  pub expected: usize,
  pub actual: usize,
}

/// 模型输入尺寸的 RGB 帧，NHWC 排布
#[derive(Debug, Clone)]
pub struct RgbNhwcFrame<const W: u32, const H: u32> {
  data: Box<[u8]>,
}

impl<const W: u32, const H: u32> TryFrom<Vec<u8>> for RgbNhwcFrame<W, H> {
  type Error = FrameSizeError;

  fn try_from(data: Vec<u8>) -> Result<Self, Self::Error> {
    let expected = RGB_CHANNELS * W as usize * H as usize;
    if data.len() != expected {
      return Err(FrameSizeError {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl<const W: u32, const H: u32> RgbNhwcFrame<W, H> {
  /// 双线性插值缩放到模型输入尺寸
  pub fn resize_from(image: &RgbImage) -> Self {
    let resized = imageops::resize(image, W, H, FilterType::Triangle);
    Self {
      data: resized.into_raw().into_boxed_slice(),
    }
  }

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

/// 逐通道归一化 `x' = (x - mean) / std`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalize {
  pub mean: f32,
  pub std: f32,
}

impl Default for Normalize {
  // 量化模型的取值
  fn default() -> Self {
    Self {
      mean: 0.0,
      std: 1.0,
    }
  }
}

impl Normalize {
  pub fn is_identity(&self) -> bool {
    self.mean == 0.0 && self.std == 1.0
  }

  /// 生成模型输入张量。恒等归一化时保持 u8，供量化模型直接使用
  pub fn apply<const W: u32, const H: u32>(&self, frame: &RgbNhwcFrame<W, H>) -> InputTensor {
    let shape = [1, frame.height(), frame.width(), frame.channels()];
    let data = if self.is_identity() {
      TensorData::U8(frame.as_nhwc().into())
    } else {
      TensorData::F32(
        frame
          .as_nhwc()
          .iter()
          .map(|&x| (x as f32 - self.mean) / self.std)
          .collect(),
      )
    };
    InputTensor { shape, data }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
  U8(Box<[u8]>),
  F32(Box<[f32]>),
}

/// 推理引擎的输入，形状为 [1, H, W, C]
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
  shape: [usize; 4],
  data: TensorData,
}

impl InputTensor {
  pub fn shape(&self) -> &[usize; 4] {
    &self.shape
  }

  pub fn data(&self) -> &TensorData {
    &self.data
  }
}
