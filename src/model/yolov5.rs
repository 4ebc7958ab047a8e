// 该文件是 YOLOv5 检测项目的一部分。
// src/model/yolov5.rs - YOLOv5 检测器
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

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::ValueEnum;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  blob::Blob,
  config::{Config, PartialConfig},
  engine::InferenceEngine,
  frame::Frame,
  model::{ClassFilterSet, ClassNameTable, ClassNamesError, Model, ObjectDetection, PostProcessor},
};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("模型文件不存在: {0}")]
  ModelNotFound(PathBuf),
  #[error("类别名称错误: {0}")]
  ClassList(#[from] ClassNamesError),
  #[error("推理后端配置错误: {0}")]
  BackendConfig(#[source] BoxError),
  #[error("推理引擎错误: {0}")]
  Engine(#[source] BoxError),
  #[error("模型路径错误: {0}")]
  ModelPath(String),
}

impl DetectorError {
  fn backend<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    DetectorError::BackendConfig(Box::new(err))
  }

  fn engine<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    DetectorError::Engine(Box::new(err))
  }
}

/// YOLOv5 检测器
///
/// 持有推理引擎与不可变的后处理配置。每次检测都是同步完成的，
/// 输入 blob 与输出张量在调用结束时释放。
pub struct Detector<E: InferenceEngine> {
  engine: E,
  postprocessor: PostProcessor,
  excluded: ClassFilterSet,
}

impl<E: InferenceEngine> std::fmt::Debug for Detector<E> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Detector")
      .field("postprocessor", &self.postprocessor)
      .field("excluded", &self.excluded)
      .finish_non_exhaustive()
  }
}

impl<E: InferenceEngine> Detector<E> {
  /// 使用默认配置创建检测器
  pub fn new(
    model_path: impl AsRef<Path>,
    class_names_path: impl AsRef<Path>,
  ) -> Result<Self, DetectorError> {
    DetectorBuilder::new(model_path, class_names_path).build()
  }

  pub fn with_config(
    model_path: impl AsRef<Path>,
    class_names_path: impl AsRef<Path>,
    config: Config,
  ) -> Result<Self, DetectorError> {
    DetectorBuilder::new(model_path, class_names_path)
      .config(config)
      .build()
  }

  pub fn config(&self) -> &Config {
    self.postprocessor.config()
  }

  pub fn class_names(&self) -> &ClassNameTable {
    self.postprocessor.class_names()
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }

  pub fn get_detections(&mut self, frame: &Frame) -> Result<Vec<ObjectDetection>, DetectorError> {
    self.get_detections_with_filter(frame, &ClassFilterSet::new())
  }

  /// 检测并排除 `excluded` 中的类别
  pub fn get_detections_with_filter(
    &mut self,
    frame: &Frame,
    excluded: &ClassFilterSet,
  ) -> Result<Vec<ObjectDetection>, DetectorError> {
    let layer_names: Vec<String> = self
      .engine
      .unconnected_output_layer_ids()
      .into_iter()
      .map(|id| self.engine.layer_name(id))
      .collect();
    debug!("输出层: {:?}", layer_names);

    let config = self.postprocessor.config();
    let blob = Blob::from_frame(frame, config.input_width, config.input_height);
    self.engine.set_input(blob);

    debug!("执行模型推理");
    let outputs = self.engine.forward(&layer_names).map_err(|e| {
      error!("前向计算失败: {}", e);
      DetectorError::engine(e)
    })?;

    let detections = self
      .postprocessor
      .process(frame.width(), frame.height(), &outputs, excluded);
    debug!("检测到 {} 个物体", detections.len());
    Ok(detections)
  }

  /// 关闭推理引擎
  pub fn close(mut self) -> Result<(), DetectorError> {
    info!("关闭推理引擎");
    self.engine.close().map_err(DetectorError::engine)
  }
}

impl<E: InferenceEngine> Model for Detector<E> {
  type Input = Frame;
  type Output = Vec<ObjectDetection>;
  type Error = DetectorError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let excluded = std::mem::take(&mut self.excluded);
    let result = self.get_detections_with_filter(input, &excluded);
    self.excluded = excluded;
    result
  }
}

#[derive(Debug, Clone)]
pub struct DetectorBuilder {
  model_path: PathBuf,
  class_names_path: PathBuf,
  config: PartialConfig,
  excluded: ClassFilterSet,
}

impl FromUrlWithScheme for DetectorBuilder {
  const SCHEME: &'static str = "yolov5";
}

impl FromUrl for DetectorBuilder {
  type Error = DetectorError;

  /// `yolov5:///path/model.onnx?names=/path/coco.names&confidence=0.5&nms=0.4`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DetectorError::ModelPath(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut class_names_path = None;
    let mut config = PartialConfig::default();
    let mut excluded = ClassFilterSet::new();

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "names" => class_names_path = Some(PathBuf::from(value.as_ref())),
        "width" => config.input_width = Some(parse_value(&key, &value)?),
        "height" => config.input_height = Some(parse_value(&key, &value)?),
        "confidence" => config.confidence_threshold = Some(parse_value(&key, &value)?),
        "nms" => config.nms_threshold = Some(parse_value(&key, &value)?),
        "backend" => config.backend = Some(parse_enum(&key, &value)?),
        "target" => config.target = Some(parse_enum(&key, &value)?),
        "nms_scope" => config.nms_scope = Some(parse_enum(&key, &value)?),
        "confidence_mode" => config.confidence_mode = Some(parse_enum(&key, &value)?),
        "geometry" => config.geometry = Some(parse_enum(&key, &value)?),
        "exclude" => excluded.extend(ClassFilterSet::parse_list(&value).iter().map(str::to_string)),
        other => debug!("忽略未知参数: {}", other),
      }
    }

    let class_names_path = class_names_path
      .ok_or_else(|| DetectorError::ModelPath("缺少类别名称文件参数 names".to_string()))?;

    Ok(DetectorBuilder {
      model_path: PathBuf::from(url.path()),
      class_names_path,
      config,
      excluded,
    })
  }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, DetectorError> {
  value
    .parse()
    .map_err(|_| DetectorError::ModelPath(format!("参数 {} 的值无效: {}", key, value)))
}

fn parse_enum<T: ValueEnum>(key: &str, value: &str) -> Result<T, DetectorError> {
  T::from_str(value, true)
    .map_err(|_| DetectorError::ModelPath(format!("参数 {} 的值无效: {}", key, value)))
}

impl DetectorBuilder {
  pub fn new(model_path: impl AsRef<Path>, class_names_path: impl AsRef<Path>) -> Self {
    Self {
      model_path: model_path.as_ref().to_path_buf(),
      class_names_path: class_names_path.as_ref().to_path_buf(),
      config: PartialConfig::default(),
      excluded: ClassFilterSet::new(),
    }
  }

  /// 整体替换配置
  pub fn config(mut self, config: Config) -> Self {
    self.config = config.into();
    self
  }

  /// 覆盖已给出的字段
  pub fn overrides(mut self, overrides: PartialConfig) -> Self {
    self.config = self.config.merge(overrides);
    self
  }

  /// `Model::infer` 默认排除的类别
  pub fn exclude(mut self, excluded: ClassFilterSet) -> Self {
    self.excluded = excluded;
    self
  }

  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn class_names_path(&self) -> &Path {
    &self.class_names_path
  }

  pub fn resolved_config(&self) -> Config {
    self.config.resolve()
  }

  /// 使用引擎自带的 [`InferenceEngine::load`] 构建
  pub fn build<E: InferenceEngine>(self) -> Result<Detector<E>, DetectorError> {
    self.build_with(|path| E::load(path))
  }

  /// 使用自定义的引擎构造函数构建，可用于注入测试替身
  pub fn build_with<E, F>(self, load: F) -> Result<Detector<E>, DetectorError>
  where
    E: InferenceEngine,
    F: FnOnce(&Path) -> Result<E, E::Error>,
  {
    let config = self.config.resolve();

    if !self.model_path.exists() {
      error!("模型文件不存在: {}", self.model_path.display());
      return Err(DetectorError::ModelNotFound(self.model_path));
    }

    let class_names = ClassNameTable::from_file(&self.class_names_path)?;

    info!("加载模型文件: {}", self.model_path.display());
    let mut engine = load(&self.model_path).map_err(DetectorError::engine)?;

    info!("设置推理后端: {:?}, 设备: {:?}", config.backend, config.target);
    engine
      .set_preferable_backend(config.backend)
      .map_err(DetectorError::backend)?;
    engine
      .set_preferable_target(config.target)
      .map_err(DetectorError::backend)?;
    info!("模型加载完成");

    Ok(Detector {
      engine,
      postprocessor: PostProcessor::new(config, Arc::new(class_names)),
      excluded: self.excluded,
    })
  }
}
