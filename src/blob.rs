// 该文件是 YOLOv5 检测项目的一部分。
// src/blob.rs - 网络输入张量预处理
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

use image::imageops::{self, FilterType};

use crate::frame::{Frame, RGB_CHANNELS};

const PIXEL_SCALE: f32 = 1.0 / 255.0;

/// NCHW 排列的 f32 输入张量，形状为 `[1, 3, H, W]`
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
  shape: [usize; 4],
  data: Vec<f32>,
}

impl Blob {
  /// 将帧双线性缩放到 `width`x`height`，转为 NCHW 并归一化到 [0, 1]
  pub fn from_frame(frame: &Frame, width: u32, height: u32) -> Self {
    let (dst_w, dst_h) = (width as usize, height as usize);
    let plane = dst_w * dst_h;
    let mut data = vec![0f32; RGB_CHANNELS * plane];

    // 空帧无法采样，保持全零
    if !frame.is_empty() && plane > 0 {
      let resized = imageops::resize(&frame.to_rgb_image(), width, height, FilterType::Triangle);
      for (idx, pixel) in resized.pixels().enumerate() {
        for (c, value) in pixel.0.iter().enumerate() {
          data[c * plane + idx] = *value as f32 * PIXEL_SCALE;
        }
      }
    }

    Self {
      shape: [1, RGB_CHANNELS, dst_h, dst_w],
      data,
    }
  }

  pub fn shape(&self) -> [usize; 4] {
    self.shape
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  pub fn into_data(self) -> Vec<f32> {
    self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blob_is_nchw_and_normalized() {
    let mut data = Vec::new();
    for _ in 0..4 {
      data.extend_from_slice(&[255, 0, 51]);
    }
    let frame = Frame::from_raw(2, 2, data).unwrap();

    let blob = Blob::from_frame(&frame, 4, 4);
    assert_eq!(blob.shape(), [1, 3, 4, 4]);
    assert_eq!(blob.data().len(), 48);
    assert!(blob.data()[..16].iter().all(|v| (*v - 1.0).abs() < 1e-6));
    assert!(blob.data()[16..32].iter().all(|v| v.abs() < 1e-6));
    assert!(blob.data()[32..].iter().all(|v| (*v - 0.2).abs() < 1e-6));
  }

  #[test]
  fn downscale_averages_neighbours() {
    // 左半白右半黑，缩到 1x1 后取中间值
    let mut data = Vec::new();
    for _ in 0..2 {
      data.extend_from_slice(&[255, 255, 255, 0, 0, 0]);
    }
    let frame = Frame::from_raw(2, 2, data).unwrap();

    let blob = Blob::from_frame(&frame, 1, 1);
    assert_eq!(blob.shape(), [1, 3, 1, 1]);
    assert!(blob.data().iter().all(|v| (*v - 0.5).abs() < 0.01));
  }

  #[test]
  fn empty_frame_gives_zero_blob() {
    let blob = Blob::from_frame(&Frame::with_shape(0, 0), 2, 2);
    assert_eq!(blob.shape(), [1, 3, 2, 2]);
    assert!(blob.data().iter().all(|v| *v == 0.0));
  }
}
