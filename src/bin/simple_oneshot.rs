// 该文件是 YOLOv5 检测项目的一部分。
// src/bin/simple_oneshot.rs - 单张图像检测
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use tracing::info;
use yolov5::{
  ClassFilterSet, DetectorBuilder, FromUrl, PartialConfig,
  engine::TractEngine,
  input::InputWrapper,
  output::OutputWrapper,
  task::{OneShotTask, Task},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址，例如 yolov5:///data/yolov5s.onnx?names=/data/coco.names
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 置信度阈值
  #[arg(long, value_name = "CONFIDENCE")]
  pub confidence: Option<f32>,
  /// NMS 阈值
  #[arg(long, value_name = "NMS")]
  pub nms: Option<f32>,
  /// 排除的类别，逗号分隔
  #[arg(long, value_name = "CLASSES")]
  pub exclude: Option<String>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let overrides = PartialConfig {
    confidence_threshold: args.confidence,
    nms_threshold: args.nms,
    ..Default::default()
  };
  let mut builder = DetectorBuilder::from_url(&args.model)?.overrides(overrides);
  if let Some(exclude) = &args.exclude {
    builder = builder.exclude(ClassFilterSet::parse_list(exclude));
  }

  let input = InputWrapper::from_url(&args.input)?;
  let model = builder.build::<TractEngine>()?;
  let output = OutputWrapper::from_url(&args.output)?;

  OneShotTask.run_task(input, model, output)?;

  Ok(())
}
