// 该文件是 YOLOv5 检测项目的一部分。
// src/model.rs - 模型
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

use serde_json::{Value, json};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// NMS 之前的候选检测
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  pub class_id: usize,
  pub confidence: f32,
  pub bounding_box: Rect,
}

/// 最终检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDetection {
  pub class_id: usize,
  pub class_name: String,
  /// 原图像素坐标 [left, top, right, bottom)
  pub bounding_box: Rect,
  pub confidence: f32,
}

impl ObjectDetection {
  pub fn to_json(&self) -> Value {
    json!({
      "class_id": self.class_id,
      "class_name": self.class_name,
      "confidence": self.confidence,
      "bbox": [
        self.bounding_box.left,
        self.bounding_box.top,
        self.bounding_box.right,
        self.bounding_box.bottom,
      ],
    })
  }
}

mod decode;
mod geometry;
mod labels;
mod nms;
mod postprocess;
mod yolov5;

pub use self::decode::{BoxGeometry, DecodedRow, best_class, decode_row};
pub use self::geometry::{BoundingBoxMapper, Rect};
pub use self::labels::{ClassFilterSet, ClassNameTable, ClassNamesError};
pub use self::nms::Suppressor;
pub use self::postprocess::PostProcessor;
pub use self::yolov5::{Detector, DetectorBuilder, DetectorError};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detection_serializes_to_json() {
    let detection = ObjectDetection {
      class_id: 1,
      class_name: "coffee".to_string(),
      bounding_box: Rect::new(1, 2, 3, 4),
      confidence: 0.75,
    };

    let value = detection.to_json();
    assert_eq!(value["class_id"], 1);
    assert_eq!(value["class_name"], "coffee");
    assert_eq!(value["confidence"], 0.75);
    assert_eq!(value["bbox"], json!([1, 2, 3, 4]));
  }
}
