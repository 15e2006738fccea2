// 该文件是 Tanjing （探镜） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use tanjing::{
  FromUrl,
  input::InputWrapper,
  model::ObjectDetectorBuilder,
  output::OutputWrapper,
  task::{ContinuousTask, OneShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("Tanjing 目标检测");
  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  // 资源加载失败直接退出
  info!("正在加载模型...");
  let model = ObjectDetectorBuilder::from_url(&args.model)?.build()?;

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  if input.is_single() {
    OneShotTask.run_task(input, model, output)?;
  } else {
    ContinuousTask::default()
      .with_frame_number(args.max_frames)
      .run_task(input, model, output)?;
  }

  Ok(())
}
