// 该文件是 YOLOv5 检测项目的一部分。
// src/model/decode.rs - 输出行解码
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

use crate::config::ConfidenceMode;

// 行布局: [cx, cy, w, h, objectness, class_0 .. class_n]
const OBJECTNESS_OFFSET: usize = 4;
const CLASS_SCORES_OFFSET: usize = 5;

/// 中心点 + 宽高形式的框
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxGeometry {
  pub center_x: f32,
  pub center_y: f32,
  pub width: f32,
  pub height: f32,
}

impl BoxGeometry {
  /// 行长度不足 4 时返回 `None`
  pub fn from_row(row: &[f32]) -> Option<Self> {
    match row {
      [center_x, center_y, width, height, ..] => Some(Self {
        center_x: *center_x,
        center_y: *center_y,
        width: *width,
        height: *height,
      }),
      _ => None,
    }
  }
}

/// 解码后的一行
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedRow {
  pub geometry: Option<BoxGeometry>,
  pub objectness: f32,
  pub class_id: usize,
  pub class_score: f32,
}

impl DecodedRow {
  pub fn confidence(&self, mode: ConfidenceMode) -> f32 {
    match mode {
      ConfidenceMode::ClassScore => self.class_score,
      ConfidenceMode::ObjectnessWeighted => self.objectness * self.class_score,
    }
  }
}

/// 找到最高分数的类别
///
/// 只有严格大于当前最大值才替换，因此并列时取最先出现的下标。
/// 起始值为 `(0, 0.0)`，空输入或全部非正分数都返回该值。
pub fn best_class(scores: &[f32]) -> (usize, f32) {
  let mut best = (0usize, 0f32);
  for (idx, &score) in scores.iter().enumerate() {
    if score > best.1 {
      best = (idx, score);
    }
  }
  best
}

/// 解码一行输出，行过短时对应字段取零值
pub fn decode_row(row: &[f32]) -> DecodedRow {
  let objectness = row.get(OBJECTNESS_OFFSET).copied().unwrap_or(0.0);
  let scores = row.get(CLASS_SCORES_OFFSET..).unwrap_or(&[]);
  let (class_id, class_score) = best_class(scores);

  DecodedRow {
    geometry: BoxGeometry::from_row(row),
    objectness,
    class_id,
    class_score,
  }
}
