// 该文件是 YOLOv5 检测项目的一部分。
// src/model/geometry.rs - 边界框与坐标映射
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

use crate::config::GeometryUnits;
use crate::model::decode::BoxGeometry;

/// 整数像素矩形 [left, top, right, bottom)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
  pub left: i32,
  pub top: i32,
  pub right: i32,
  pub bottom: i32,
}

impl Rect {
  pub const ZERO: Rect = Rect {
    left: 0,
    top: 0,
    right: 0,
    bottom: 0,
  };

  /// 创建矩形，坐标会被规整为 left <= right、top <= bottom
  pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
    Self {
      left: left.min(right),
      top: top.min(bottom),
      right: left.max(right),
      bottom: top.max(bottom),
    }
  }

  // 坐标可以取满 i32 范围，宽高用 i64 计算
  pub fn width(&self) -> i64 {
    self.right as i64 - self.left as i64
  }

  pub fn height(&self) -> i64 {
    self.bottom as i64 - self.top as i64
  }

  /// 面积，未规整的矩形按 0 计
  pub fn area(&self) -> u64 {
    self.width().max(0) as u64 * self.height().max(0) as u64
  }

  pub fn is_empty(&self) -> bool {
    self.left >= self.right || self.top >= self.bottom
  }

  /// 两个矩形的交集，不相交时返回 `Rect::ZERO`
  pub fn intersect(&self, other: &Rect) -> Rect {
    let r = Rect {
      left: self.left.max(other.left),
      top: self.top.max(other.top),
      right: self.right.min(other.right),
      bottom: self.bottom.min(other.bottom),
    };
    if r.is_empty() { Rect::ZERO } else { r }
  }

  /// 交并比，并集面积为 0 时返回 0
  pub fn iou(&self, other: &Rect) -> f32 {
    let intersection = self.intersect(other).area() as f64;
    let union = self.area() as f64 + other.area() as f64 - intersection;
    if union > 0.0 {
      (intersection / union) as f32
    } else {
      0.0
    }
  }
}

/// 将网络输出的几何量映射到原图像素坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBoxMapper {
  x_factor: f32,
  y_factor: f32,
}

impl BoundingBoxMapper {
  pub fn new(
    frame_width: u32,
    frame_height: u32,
    input_width: u32,
    input_height: u32,
    units: GeometryUnits,
  ) -> Self {
    let (x_factor, y_factor) = match units {
      GeometryUnits::InputPixels => (
        frame_width as f32 / input_width.max(1) as f32,
        frame_height as f32 / input_height.max(1) as f32,
      ),
      GeometryUnits::Normalized => (frame_width as f32, frame_height as f32),
    };
    Self { x_factor, y_factor }
  }

  /// 映射一行输出的前四个值，不足四个时返回零矩形
  pub fn map_row(&self, row: &[f32]) -> Rect {
    BoxGeometry::from_row(row)
      .map(|geometry| self.map(&geometry))
      .unwrap_or(Rect::ZERO)
  }

  pub fn map(&self, geometry: &BoxGeometry) -> Rect {
    let left = ((geometry.center_x - 0.5 * geometry.width) * self.x_factor) as i32;
    let top = ((geometry.center_y - 0.5 * geometry.height) * self.y_factor) as i32;
    let width = (geometry.width * self.x_factor) as i32;
    let height = (geometry.height * self.y_factor) as i32;
    Rect::new(
      left,
      top,
      left.saturating_add(width),
      top.saturating_add(height),
    )
  }
}
