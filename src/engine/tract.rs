// 该文件是 YOLOv5 检测项目的一部分。
// src/engine/tract.rs - 基于 tract 的 ONNX 推理引擎
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

use thiserror::Error;
use tract_onnx::prelude::*;
use tracing::{debug, info};

use crate::{
  blob::Blob,
  engine::{Backend, InferenceEngine, RawTensor, Target},
};

#[derive(Error, Debug)]
pub enum TractEngineError {
  #[error("ONNX 模型错误: {0}")]
  Model(String),
  #[error("不支持的推理后端: {0:?}")]
  UnsupportedBackend(Backend),
  #[error("不支持的推理设备: {0:?}")]
  UnsupportedTarget(Target),
  #[error("未设置模型输入")]
  MissingInput,
  #[error("未知的输出层: {0}")]
  UnknownLayer(String),
}

impl From<TractError> for TractEngineError {
  fn from(err: TractError) -> Self {
    TractEngineError::Model(format!("{:#}", err))
  }
}

/// 在 CPU 上执行 ONNX 模型的推理引擎
pub struct TractEngine {
  model: TypedRunnableModel<TypedModel>,
  output_names: Vec<String>,
  input: Option<Blob>,
}

impl TractEngine {
  fn output_index(&self, name: &str) -> Result<usize, TractEngineError> {
    self
      .output_names
      .iter()
      .position(|n| n == name)
      .ok_or_else(|| TractEngineError::UnknownLayer(name.to_string()))
  }
}

impl InferenceEngine for TractEngine {
  type Error = TractEngineError;

  fn load(model_path: &Path) -> Result<Self, Self::Error> {
    info!("使用 tract 加载 ONNX 模型: {}", model_path.display());
    let model = tract_onnx::onnx()
      .model_for_path(model_path)?
      .into_optimized()?
      .into_runnable()?;

    let graph = model.model();
    let output_names = graph
      .output_outlets()?
      .iter()
      .map(|outlet| graph.node(outlet.node).name.clone())
      .collect::<Vec<_>>();
    debug!("模型输出: {:?}", output_names);

    Ok(TractEngine {
      model,
      output_names,
      input: None,
    })
  }

  fn set_preferable_backend(&mut self, backend: Backend) -> Result<(), Self::Error> {
    match backend {
      Backend::Default | Backend::OpenCv => Ok(()),
      other => Err(TractEngineError::UnsupportedBackend(other)),
    }
  }

  fn set_preferable_target(&mut self, target: Target) -> Result<(), Self::Error> {
    match target {
      Target::Cpu => Ok(()),
      other => Err(TractEngineError::UnsupportedTarget(other)),
    }
  }

  fn set_input(&mut self, blob: Blob) {
    self.input = Some(blob);
  }

  fn unconnected_output_layer_ids(&self) -> Vec<usize> {
    (0..self.output_names.len()).collect()
  }

  fn layer_name(&self, id: usize) -> String {
    self.output_names.get(id).cloned().unwrap_or_default()
  }

  fn forward(&mut self, layer_names: &[String]) -> Result<Vec<RawTensor>, Self::Error> {
    let blob = self.input.take().ok_or(TractEngineError::MissingInput)?;
    let shape = blob.shape();
    let input = Tensor::from_shape(&shape, blob.data())?;

    let outputs = self.model.run(tvec!(input.into()))?;

    layer_names
      .iter()
      .map(|name| -> Result<RawTensor, TractEngineError> {
        let value = outputs
          .get(self.output_index(name)?)
          .ok_or_else(|| TractEngineError::UnknownLayer(name.clone()))?;
        let view = value.to_array_view::<f32>()?;
        Ok(RawTensor::new(
          view.shape().to_vec(),
          view.iter().copied().collect(),
        ))
      })
      .collect()
  }

  fn close(&mut self) -> Result<(), Self::Error> {
    self.input = None;
    Ok(())
  }
}
