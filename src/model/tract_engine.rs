// 该文件是 Tanjing （探镜） 项目的一部分。
// src/model/tract_engine.rs - 基于 tract 的 TFLite 推理引擎
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

use anyhow::{Context, Result, bail};
use tracing::{debug, info};
use tract_tflite::prelude::*;

use crate::{
  frame::{InputTensor, TensorData},
  model::{InferenceEngine, RawModelOutput},
};

// boxes, classes, scores, count
const SSD_NUM_OUTPUTS: usize = 4;

pub struct TractEngine {
  plan: TypedRunnableModel<TypedModel>,
}

impl TractEngine {
  /// 加载 TFLite 模型并优化为可执行计划，仅在启动时调用一次
  ///
  /// 模型文件由 tract 一次性读入内存，不做内存映射。
  pub fn load(model_path: impl AsRef<Path>) -> Result<Self> {
    let model_path = model_path.as_ref();
    info!("加载模型文件: {}", model_path.display());
    let size = std::fs::metadata(model_path)
      .with_context(|| format!("无法读取模型文件 {}", model_path.display()))?
      .len();
    debug!("模型文件大小: {:.2} MB", size as f64 / (1024.0 * 1024.0));

    let model = tract_tflite::tflite()
      .model_for_path(model_path)
      .with_context(|| format!("无法解析 TFLite 模型 {}", model_path.display()))?;

    let num_outputs = model.output_outlets()?.len();
    if num_outputs != SSD_NUM_OUTPUTS {
      bail!(
        "预期模型输出数量为 {}, 实际为 {}",
        SSD_NUM_OUTPUTS,
        num_outputs
      );
    }

    let plan = model
      .into_optimized()
      .context("模型优化失败")?
      .into_runnable()
      .context("无法创建可执行模型")?;
    info!("模型加载完成");

    Ok(Self { plan })
  }
}

impl InferenceEngine for TractEngine {
  fn name(&self) -> &'static str {
    "tract-tflite"
  }

  fn run(&self, input: &InputTensor) -> Result<RawModelOutput> {
    let tensor = match input.data() {
      TensorData::U8(data) => Tensor::from_shape::<u8>(input.shape(), data)?,
      TensorData::F32(data) => Tensor::from_shape::<f32>(input.shape(), data)?,
    };

    debug!("执行模型推理");
    let outputs = self.plan.run(tvec!(tensor.into()))?;
    if outputs.len() != SSD_NUM_OUTPUTS {
      bail!("模型输出数量为 {}", outputs.len());
    }

    let boxes = outputs[0].as_slice::<f32>().context("检测框输出不是 f32")?;
    let classes = outputs[1].as_slice::<f32>().context("类别输出不是 f32")?;
    let scores = outputs[2].as_slice::<f32>().context("分数输出不是 f32")?;
    let count = outputs[3].as_slice::<f32>().context("检测数输出不是 f32")?;

    Ok(RawModelOutput::from_flat(boxes, classes, scores, count)?)
  }
}
