// 该文件是 YOLOv5 检测项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use crate::config::NmsScope;
use crate::model::Detection;

/// 贪心 NMS
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Suppressor {
  threshold: f32,
  scope: NmsScope,
}

impl Suppressor {
  pub fn new(threshold: f32, scope: NmsScope) -> Self {
    Self { threshold, scope }
  }

  /// 返回保留下来的候选下标，按置信度降序排列
  ///
  /// 置信度相同的候选保持输入顺序。与已保留框的 IoU 严格大于阈值的候选被抑制。
  pub fn suppress(&self, candidates: &[Detection]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    // 稳定排序
    order.sort_by(|&a, &b| {
      candidates[b]
        .confidence
        .total_cmp(&candidates[a].confidence)
    });

    let mut suppressed = vec![false; candidates.len()];
    let mut keep = Vec::new();

    for (pos, &i) in order.iter().enumerate() {
      if suppressed[i] {
        continue;
      }
      keep.push(i);

      let kept = &candidates[i];
      for &j in &order[pos + 1..] {
        if suppressed[j] {
          continue;
        }
        let other = &candidates[j];
        if self.scope == NmsScope::PerClass && other.class_id != kept.class_id {
          continue;
        }
        if kept.bounding_box.iou(&other.bounding_box) > self.threshold {
          suppressed[j] = true;
        }
      }
    }

    keep
  }
}
