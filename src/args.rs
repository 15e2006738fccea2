// 该文件是 Tanjing （探镜） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;
use url::Url;

/// Tanjing 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址
  /// 例如: ssd:///models/ssd_mobilenet_v1.tflite?labels=/models/coco_dataset_labels.txt
  /// 可选参数: labels, threshold, top_k, mean, std
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入来源
  /// 支持格式:
  /// - 单张图片: image:///path/photo.jpg
  /// - 图库目录: gallery:///path/to/dir
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径
  /// 支持格式:
  /// - 图片: image:///path/out.png?font=/path/font.ttf&width=900
  /// - 目录记录: folder:///path/to/dir?record=name|id|json&always
  /// 未指定 font 时使用系统字体，找不到字体则只绘制检测框
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 最大处理帧数（仅对图库有效）
  #[arg(long, value_name = "COUNT")]
  pub max_frames: Option<usize>,
}
