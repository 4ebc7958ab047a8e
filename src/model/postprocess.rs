// 该文件是 YOLOv5 检测项目的一部分。
// src/model/postprocess.rs - 检测后处理流水线
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

use std::sync::Arc;

use tracing::debug;

use crate::{
  config::Config,
  engine::RawTensor,
  model::{
    BoundingBoxMapper, ClassFilterSet, ClassNameTable, Detection, ObjectDetection, Suppressor,
    decode_row,
  },
};

/// 把一次前向计算的输出张量转换为最终检测结果
///
/// 只持有不可变的配置与类别表，可以在多个检测器之间共享。
#[derive(Debug, Clone)]
pub struct PostProcessor {
  config: Config,
  class_names: Arc<ClassNameTable>,
}

impl PostProcessor {
  pub fn new(config: Config, class_names: Arc<ClassNameTable>) -> Self {
    Self {
      config,
      class_names,
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn class_names(&self) -> &ClassNameTable {
    &self.class_names
  }

  /// 解码、阈值过滤、类别过滤、NMS，结果按置信度降序排列
  pub fn process(
    &self,
    frame_width: u32,
    frame_height: u32,
    outputs: &[RawTensor],
    filter: &ClassFilterSet,
  ) -> Vec<ObjectDetection> {
    let candidates = self.collect_candidates(frame_width, frame_height, outputs, filter);
    if candidates.is_empty() {
      return Vec::new();
    }

    let keep = Suppressor::new(self.config.nms_threshold, self.config.nms_scope)
      .suppress(&candidates);
    debug!("NMS 前 {} 个候选，保留 {} 个", candidates.len(), keep.len());

    keep
      .into_iter()
      .filter_map(|idx| {
        let candidate = &candidates[idx];
        let class_name = self.class_names.name(candidate.class_id)?;
        Some(ObjectDetection {
          class_id: candidate.class_id,
          class_name: class_name.to_string(),
          bounding_box: candidate.bounding_box,
          confidence: candidate.confidence,
        })
      })
      .collect()
  }

  /// 解码所有行并保留通过阈值与类别过滤的候选
  pub fn collect_candidates(
    &self,
    frame_width: u32,
    frame_height: u32,
    outputs: &[RawTensor],
    filter: &ClassFilterSet,
  ) -> Vec<Detection> {
    let mapper = BoundingBoxMapper::new(
      frame_width,
      frame_height,
      self.config.input_width,
      self.config.input_height,
      self.config.geometry,
    );

    let mut candidates = Vec::new();
    let mut rows = 0usize;
    let mut unknown = 0usize;
    let mut filtered = 0usize;

    for tensor in outputs {
      for row in tensor.rows() {
        rows += 1;
        let decoded = decode_row(row);
        let confidence = decoded.confidence(self.config.confidence_mode);
        // NaN 也在这里被丢弃
        if !(confidence >= self.config.confidence_threshold) {
          continue;
        }
        if decoded.class_id >= self.class_names.len() {
          unknown += 1;
          continue;
        }
        if self.class_names.is_filtered(decoded.class_id, filter) {
          filtered += 1;
          continue;
        }

        candidates.push(Detection {
          class_id: decoded.class_id,
          confidence,
          bounding_box: decoded
            .geometry
            .map(|geometry| mapper.map(&geometry))
            .unwrap_or_default(),
        });
      }
    }

    debug!(
      "解码 {} 行，候选 {} 个，未知类别 {} 个，被过滤 {} 个",
      rows,
      candidates.len(),
      unknown,
      filtered
    );
    candidates
  }
}
