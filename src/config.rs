// 该文件是 YOLOv5 检测项目的一部分。
// src/config.rs - 检测器配置
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

use crate::engine::{Backend, Target};

pub const DEFAULT_INPUT_WIDTH: u32 = 640;
pub const DEFAULT_INPUT_HEIGHT: u32 = 640;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.4;

/// 非极大值抑制的作用范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum NmsScope {
  /// 仅在同一类别的候选框之间抑制
  #[default]
  PerClass,
  /// 所有类别的候选框一起抑制
  Global,
}

/// 置信度的计算方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ConfidenceMode {
  /// 最高类别分数
  #[default]
  ClassScore,
  /// 目标性分数乘以最高类别分数
  ObjectnessWeighted,
}

/// 输出行中几何量的单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum GeometryUnits {
  /// 以网络输入尺寸为基准的像素坐标
  #[default]
  InputPixels,
  /// [0, 1] 归一化坐标
  Normalized,
}

/// 检测器配置，构造后在检测器生命周期内保持不变
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
  /// 网络输入宽度
  pub input_width: u32,
  /// 网络输入高度
  pub input_height: u32,
  /// 置信度阈值
  pub confidence_threshold: f32,
  /// NMS IoU 阈值
  pub nms_threshold: f32,
  /// 推理后端
  pub backend: Backend,
  /// 推理设备
  pub target: Target,
  pub nms_scope: NmsScope,
  pub confidence_mode: ConfidenceMode,
  pub geometry: GeometryUnits,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      input_width: DEFAULT_INPUT_WIDTH,
      input_height: DEFAULT_INPUT_HEIGHT,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      nms_threshold: DEFAULT_NMS_THRESHOLD,
      backend: Backend::default(),
      target: Target::default(),
      nms_scope: NmsScope::default(),
      confidence_mode: ConfidenceMode::default(),
      geometry: GeometryUnits::default(),
    }
  }
}

impl Config {
  pub fn with_input_size(mut self, width: u32, height: u32) -> Self {
    self.input_width = width;
    self.input_height = height;
    self
  }

  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_nms_threshold(mut self, threshold: f32) -> Self {
    self.nms_threshold = threshold;
    self
  }

  pub fn with_backend(mut self, backend: Backend) -> Self {
    self.backend = backend;
    self
  }

  pub fn with_target(mut self, target: Target) -> Self {
    self.target = target;
    self
  }

  pub fn with_nms_scope(mut self, scope: NmsScope) -> Self {
    self.nms_scope = scope;
    self
  }

  pub fn with_confidence_mode(mut self, mode: ConfidenceMode) -> Self {
    self.confidence_mode = mode;
    self
  }

  pub fn with_geometry(mut self, geometry: GeometryUnits) -> Self {
    self.geometry = geometry;
    self
  }
}

/// 部分配置，未给出的字段在 [`PartialConfig::resolve`] 时取默认值
///
/// 宽高为 0、阈值为 0 或负数时也视为未给出。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartialConfig {
  pub input_width: Option<u32>,
  pub input_height: Option<u32>,
  pub confidence_threshold: Option<f32>,
  pub nms_threshold: Option<f32>,
  pub backend: Option<Backend>,
  pub target: Option<Target>,
  pub nms_scope: Option<NmsScope>,
  pub confidence_mode: Option<ConfidenceMode>,
  pub geometry: Option<GeometryUnits>,
}

impl PartialConfig {
  /// 补全默认值，得到完整配置
  pub fn resolve(self) -> Config {
    let defaults = Config::default();
    let positive_u32 = |value: Option<u32>| value.filter(|v| *v > 0);
    let positive_f32 = |value: Option<f32>| value.filter(|v| *v > 0.0);

    Config {
      input_width: positive_u32(self.input_width).unwrap_or(defaults.input_width),
      input_height: positive_u32(self.input_height).unwrap_or(defaults.input_height),
      confidence_threshold: positive_f32(self.confidence_threshold)
        .unwrap_or(defaults.confidence_threshold),
      nms_threshold: positive_f32(self.nms_threshold).unwrap_or(defaults.nms_threshold),
      backend: self.backend.unwrap_or(defaults.backend),
      target: self.target.unwrap_or(defaults.target),
      nms_scope: self.nms_scope.unwrap_or(defaults.nms_scope),
      confidence_mode: self.confidence_mode.unwrap_or(defaults.confidence_mode),
      geometry: self.geometry.unwrap_or(defaults.geometry),
    }
  }

  /// 用 `other` 中给出的字段覆盖当前字段
  pub fn merge(self, other: PartialConfig) -> Self {
    Self {
      input_width: other.input_width.or(self.input_width),
      input_height: other.input_height.or(self.input_height),
      confidence_threshold: other.confidence_threshold.or(self.confidence_threshold),
      nms_threshold: other.nms_threshold.or(self.nms_threshold),
      backend: other.backend.or(self.backend),
      target: other.target.or(self.target),
      nms_scope: other.nms_scope.or(self.nms_scope),
      confidence_mode: other.confidence_mode.or(self.confidence_mode),
      geometry: other.geometry.or(self.geometry),
    }
  }
}

impl From<Config> for PartialConfig {
  fn from(config: Config) -> Self {
    Self {
      input_width: Some(config.input_width),
      input_height: Some(config.input_height),
      confidence_threshold: Some(config.confidence_threshold),
      nms_threshold: Some(config.nms_threshold),
      backend: Some(config.backend),
      target: Some(config.target),
      nms_scope: Some(config.nms_scope),
      confidence_mode: Some(config.confidence_mode),
      geometry: Some(config.geometry),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_partial_resolves_to_defaults() {
    assert_eq!(PartialConfig::default().resolve(), Config::default());
  }

  #[test]
  fn zero_values_fall_back_to_defaults() {
    let config = PartialConfig {
      input_width: Some(0),
      input_height: Some(320),
      confidence_threshold: Some(0.0),
      nms_threshold: Some(-1.0),
      ..Default::default()
    }
    .resolve();

    assert_eq!(config.input_width, DEFAULT_INPUT_WIDTH);
    assert_eq!(config.input_height, 320);
    assert_eq!(config.confidence_threshold, DEFAULT_CONFIDENCE_THRESHOLD);
    assert_eq!(config.nms_threshold, DEFAULT_NMS_THRESHOLD);
  }

  #[test]
  fn merge_prefers_the_override() {
    let base = PartialConfig::from(Config::default().with_confidence_threshold(0.3));
    let merged = base
      .merge(PartialConfig {
        nms_threshold: Some(0.6),
        backend: Some(Backend::Cuda),
        ..Default::default()
      })
      .resolve();

    assert_eq!(merged.confidence_threshold, 0.3);
    assert_eq!(merged.nms_threshold, 0.6);
    assert_eq!(merged.backend, Backend::Cuda);
    assert_eq!(merged.target, Target::Cpu);
  }
}
