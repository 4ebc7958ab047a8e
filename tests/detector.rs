// 该文件是 YOLOv5 检测项目的一部分。
// tests/detector.rs - 检测器集成测试
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
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use thiserror::Error;
use url::Url;

use yolov5::{
  Backend, ClassFilterSet, Config, DetectorBuilder, DetectorError, Frame, FromUrl,
  InferenceEngine, NmsScope, RawTensor, Rect, Target, blob::Blob, model::Model,
};

#[derive(Error, Debug)]
enum MockError {
  #[error("不支持的后端 {0:?}")]
  Backend(Backend),
  #[error("不支持的设备 {0:?}")]
  Target(Target),
  #[error("前向计算失败")]
  Forward,
}

#[derive(Default, Debug)]
struct Calls {
  backend: Option<Backend>,
  target: Option<Target>,
  input_shape: Option<[usize; 4]>,
  forwarded: Vec<Vec<String>>,
  closed: bool,
}

struct MockEngine {
  outputs: Vec<RawTensor>,
  calls: Arc<Mutex<Calls>>,
  reject_backend: bool,
  reject_target: bool,
  fail_forward: bool,
}

impl MockEngine {
  fn new(outputs: Vec<RawTensor>) -> (Self, Arc<Mutex<Calls>>) {
    let calls = Arc::new(Mutex::new(Calls::default()));
    let engine = MockEngine {
      outputs,
      calls: calls.clone(),
      reject_backend: false,
      reject_target: false,
      fail_forward: false,
    };
    (engine, calls)
  }
}

impl InferenceEngine for MockEngine {
  type Error = MockError;

  fn load(_model_path: &Path) -> Result<Self, Self::Error> {
    Ok(MockEngine::new(Vec::new()).0)
  }

  fn set_preferable_backend(&mut self, backend: Backend) -> Result<(), Self::Error> {
    if self.reject_backend {
      return Err(MockError::Backend(backend));
    }
    self.calls.lock().unwrap().backend = Some(backend);
    Ok(())
  }

  fn set_preferable_target(&mut self, target: Target) -> Result<(), Self::Error> {
    if self.reject_target {
      return Err(MockError::Target(target));
    }
    self.calls.lock().unwrap().target = Some(target);
    Ok(())
  }

  fn set_input(&mut self, blob: Blob) {
    self.calls.lock().unwrap().input_shape = Some(blob.shape());
  }

  fn unconnected_output_layer_ids(&self) -> Vec<usize> {
    vec![0]
  }

  fn layer_name(&self, id: usize) -> String {
    format!("output{}", id)
  }

  fn forward(&mut self, layer_names: &[String]) -> Result<Vec<RawTensor>, Self::Error> {
    self.calls.lock().unwrap().forwarded.push(layer_names.to_vec());
    if self.fail_forward {
      return Err(MockError::Forward);
    }
    Ok(self.outputs.clone())
  }

  fn close(&mut self) -> Result<(), Self::Error> {
    self.calls.lock().unwrap().closed = true;
    Ok(())
  }
}

struct Fixture {
  _dir: TempDir,
  model: PathBuf,
  names: PathBuf,
}

fn fixture(names: &str) -> Fixture {
  let dir = tempfile::tempdir().unwrap();
  let model = dir.path().join("model.onnx");
  std::fs::write(&model, b"onnx").unwrap();
  let names_path = dir.path().join("coco.names");
  std::fs::write(&names_path, names).unwrap();
  Fixture {
    _dir: dir,
    model,
    names: names_path,
  }
}

fn row(cx: f32, cy: f32, w: f32, h: f32, scores: [f32; 3]) -> Vec<f32> {
  let mut row = vec![cx, cy, w, h, 0.9];
  row.extend(scores);
  row
}

fn tensor(rows: &[Vec<f32>]) -> RawTensor {
  RawTensor::new(vec![1, rows.len(), 8], rows.concat())
}

fn scene() -> RawTensor {
  tensor(&[
    row(320.0, 320.0, 100.0, 100.0, [0.8, 0.1, 0.0]),
    // 与第一行高度重叠，同一类别
    row(322.0, 322.0, 100.0, 100.0, [0.7, 0.1, 0.0]),
    row(100.0, 100.0, 50.0, 50.0, [0.0, 0.1, 0.6]),
    row(500.0, 500.0, 40.0, 40.0, [0.2, 0.3, 0.1]),
  ])
}

#[test]
fn detects_maps_and_suppresses() {
  let fx = fixture("person\nbicycle\ncar\n");
  let (engine, calls) = MockEngine::new(vec![scene()]);
  let mut detector = DetectorBuilder::new(&fx.model, &fx.names)
    .build_with(move |_| Ok(engine))
    .unwrap();

  let detections = detector.get_detections(&Frame::with_shape(1280, 1280)).unwrap();

  assert_eq!(detections.len(), 2);
  assert_eq!(detections[0].class_name, "person");
  assert_eq!(detections[0].confidence, 0.8);
  assert_eq!(detections[0].bounding_box, Rect::new(540, 540, 740, 740));
  assert_eq!(detections[1].class_name, "car");
  assert_eq!(detections[1].bounding_box, Rect::new(150, 150, 250, 250));

  let calls = calls.lock().unwrap();
  assert_eq!(calls.backend, Some(Backend::Default));
  assert_eq!(calls.target, Some(Target::Cpu));
  assert_eq!(calls.input_shape, Some([1, 3, 640, 640]));
  assert_eq!(calls.forwarded, vec![vec!["output0".to_string()]]);
}

#[test]
fn excluded_classes_are_dropped() {
  let fx = fixture("person\nbicycle\ncar\n");
  let (engine, _) = MockEngine::new(vec![scene()]);
  let mut detector = DetectorBuilder::new(&fx.model, &fx.names)
    .build_with(move |_| Ok(engine))
    .unwrap();

  let excluded = ClassFilterSet::parse_list("person");
  let detections = detector
    .get_detections_with_filter(&Frame::with_shape(1280, 1280), &excluded)
    .unwrap();

  assert_eq!(detections.len(), 1);
  assert_eq!(detections[0].class_name, "car");
}

#[test]
fn model_infer_uses_builder_exclusions() {
  let fx = fixture("person\nbicycle\ncar\n");
  let (engine, _) = MockEngine::new(vec![scene()]);
  let mut detector = DetectorBuilder::new(&fx.model, &fx.names)
    .exclude(ClassFilterSet::parse_list("car"))
    .build_with(move |_| Ok(engine))
    .unwrap();

  let frame = Frame::with_shape(1280, 1280);
  for _ in 0..2 {
    let detections = detector.infer(&frame).unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].class_name, "person");
  }
}

#[test]
fn lower_threshold_and_global_nms_from_config() {
  let fx = fixture("person\nbicycle\ncar\n");
  let (engine, _) = MockEngine::new(vec![scene()]);
  let config = Config::default()
    .with_confidence_threshold(0.25)
    .with_nms_scope(NmsScope::Global);
  let mut detector = DetectorBuilder::new(&fx.model, &fx.names)
    .config(config)
    .build_with(move |_| Ok(engine))
    .unwrap();

  let detections = detector.get_detections(&Frame::with_shape(1280, 1280)).unwrap();
  let names: Vec<&str> = detections.iter().map(|d| d.class_name.as_str()).collect();
  assert_eq!(names, vec!["person", "car", "bicycle"]);
}

#[test]
fn empty_output_gives_no_detections() {
  let fx = fixture("person\n");
  let (engine, _) = MockEngine::new(vec![RawTensor::new(vec![1, 0, 6], Vec::new())]);
  let mut detector = DetectorBuilder::new(&fx.model, &fx.names)
    .build_with(move |_| Ok(engine))
    .unwrap();

  let detections = detector.get_detections(&Frame::with_shape(32, 32)).unwrap();
  assert!(detections.is_empty());
}

#[test]
fn missing_model_is_reported_before_loading() {
  let fx = fixture("person\n");
  let missing = fx.model.with_file_name("missing.onnx");
  let result = DetectorBuilder::new(&missing, &fx.names)
    .build_with(|_| -> Result<MockEngine, MockError> { panic!("引擎不应被加载") });
  assert!(matches!(result, Err(DetectorError::ModelNotFound(path)) if path == missing));
}

#[test]
fn missing_or_empty_class_list_is_rejected() {
  let fx = fixture("");
  let result = DetectorBuilder::new(&fx.model, &fx.names).build::<MockEngine>();
  assert!(matches!(result, Err(DetectorError::ClassList(_))));

  let missing = fx.names.with_file_name("missing.names");
  let result = DetectorBuilder::new(&fx.model, &missing).build::<MockEngine>();
  assert!(matches!(result, Err(DetectorError::ClassList(_))));
}

#[test]
fn backend_and_target_errors_are_reported() {
  let fx = fixture("person\n");

  let (mut engine, _) = MockEngine::new(Vec::new());
  engine.reject_backend = true;
  let result = DetectorBuilder::new(&fx.model, &fx.names).build_with(move |_| Ok(engine));
  assert!(matches!(result, Err(DetectorError::BackendConfig(_))));

  let (mut engine, _) = MockEngine::new(Vec::new());
  engine.reject_target = true;
  let result = DetectorBuilder::new(&fx.model, &fx.names).build_with(move |_| Ok(engine));
  assert!(matches!(result, Err(DetectorError::BackendConfig(_))));
}

#[test]
fn forward_failure_is_an_engine_error() {
  let fx = fixture("person\n");
  let (mut engine, _) = MockEngine::new(Vec::new());
  engine.fail_forward = true;
  let mut detector = DetectorBuilder::new(&fx.model, &fx.names)
    .build_with(move |_| Ok(engine))
    .unwrap();

  let result = detector.get_detections(&Frame::with_shape(8, 8));
  assert!(matches!(result, Err(DetectorError::Engine(_))));
}

#[test]
fn close_releases_the_engine() {
  let fx = fixture("person\n");
  let (engine, calls) = MockEngine::new(Vec::new());
  let detector = DetectorBuilder::new(&fx.model, &fx.names)
    .build_with(move |_| Ok(engine))
    .unwrap();

  detector.close().unwrap();
  assert!(calls.lock().unwrap().closed);
}

#[test]
fn builder_from_url_reads_query() {
  let fx = fixture("person\n");
  let url = Url::parse(&format!(
    "yolov5://{}?names={}&width=320&height=0&confidence=0.3&backend=cuda&target=cuda-fp16&exclude=car,bus",
    fx.model.display(),
    fx.names.display()
  ))
  .unwrap();

  let builder = DetectorBuilder::from_url(&url).unwrap();
  assert_eq!(builder.model_path(), fx.model.as_path());
  assert_eq!(builder.class_names_path(), fx.names.as_path());

  let config = builder.resolved_config();
  assert_eq!(config.input_width, 320);
  assert_eq!(config.input_height, 640);
  assert_eq!(config.confidence_threshold, 0.3);
  assert_eq!(config.nms_threshold, 0.4);
  assert_eq!(config.backend, Backend::Cuda);
  assert_eq!(config.target, Target::CudaFp16);
}

#[test]
fn builder_from_url_requires_names_and_scheme() {
  let url = Url::parse("yolov5:///data/model.onnx").unwrap();
  assert!(matches!(
    DetectorBuilder::from_url(&url),
    Err(DetectorError::ModelPath(_))
  ));

  let url = Url::parse("onnx:///data/model.onnx?names=/data/coco.names").unwrap();
  assert!(matches!(
    DetectorBuilder::from_url(&url),
    Err(DetectorError::ModelPath(_))
  ));

  let url = Url::parse("yolov5:///data/model.onnx?names=/a&nms=abc").unwrap();
  assert!(matches!(
    DetectorBuilder::from_url(&url),
    Err(DetectorError::ModelPath(_))
  ));
}
