// 该文件是 YOLOv5 检测项目的一部分。
// src/engine.rs - 推理引擎接口
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

use crate::blob::Blob;

#[cfg(feature = "backend_tract")]
mod tract;
#[cfg(feature = "backend_tract")]
pub use self::tract::{TractEngine, TractEngineError};

/// 推理后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum Backend {
  #[default]
  Default,
  Halide,
  #[value(name = "openvino")]
  OpenVino,
  #[value(name = "opencv")]
  OpenCv,
  Vulkan,
  Cuda,
}

/// 推理设备
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum Target {
  #[default]
  Cpu,
  #[value(name = "opencl")]
  OpenCl,
  #[value(name = "opencl-fp16")]
  OpenClFp16,
  Myriad,
  Vulkan,
  Fpga,
  Cuda,
  CudaFp16,
}

/// 推理引擎输出的原始张量
///
/// 最后一维是每行的长度，`data` 按行连续存放。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTensor {
  shape: Vec<usize>,
  data: Vec<f32>,
}

impl RawTensor {
  pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
    Self { shape, data }
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  /// 每行的长度，形状为空时为 0
  pub fn row_len(&self) -> usize {
    self.shape.last().copied().unwrap_or(0)
  }

  /// 按行遍历，最后不足一行的部分也作为一行返回
  pub fn rows(&self) -> std::slice::Chunks<'_, f32> {
    match self.row_len() {
      0 => self.data[..0].chunks(1),
      len => self.data.chunks(len),
    }
  }
}

/// 外部推理引擎
///
/// 网络的加载与前向计算都由实现者负责，检测器只消费输出张量。
pub trait InferenceEngine {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 从模型文件创建引擎
  fn load(model_path: &Path) -> Result<Self, Self::Error>
  where
    Self: Sized;

  fn set_preferable_backend(&mut self, backend: Backend) -> Result<(), Self::Error>;
  fn set_preferable_target(&mut self, target: Target) -> Result<(), Self::Error>;
  fn set_input(&mut self, blob: Blob);
  fn unconnected_output_layer_ids(&self) -> Vec<usize>;
  fn layer_name(&self, id: usize) -> String;
  fn forward(&mut self, layer_names: &[String]) -> Result<Vec<RawTensor>, Self::Error>;

  fn close(&mut self) -> Result<(), Self::Error> {
    Ok(())
  }
}
