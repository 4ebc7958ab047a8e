// 该文件是 YOLOv5 检测项目的一部分。
// src/frame.rs - RGB 图像帧定义
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

pub const RGB_CHANNELS: usize = 3;

/// HWC 排列的 RGB 帧，像素类型为 u8
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl Frame {
  /// 创建指定尺寸的全黑帧
  pub fn with_shape(width: u32, height: u32) -> Self {
    let size = RGB_CHANNELS * width as usize * height as usize;
    Self {
      width,
      height,
      data: vec![0u8; size].into_boxed_slice(),
    }
  }

  /// 由原始像素数据创建，长度不匹配时返回 `None`
  pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
    if data.len() != RGB_CHANNELS * width as usize * height as usize {
      return None;
    }

    Some(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_hwc(&self) -> &[u8] {
    &self.data
  }

  /// 读取像素，越界坐标会被截断到边缘；空帧返回黑色
  pub fn pixel_clamped(&self, x: i64, y: i64) -> [u8; 3] {
    if self.is_empty() {
      return [0, 0, 0];
    }
    let x = x.clamp(0, self.width as i64 - 1) as usize;
    let y = y.clamp(0, self.height as i64 - 1) as usize;
    let idx = (y * self.width as usize + x) * RGB_CHANNELS;
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }
}

impl AsMut<[u8]> for Frame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl From<image::RgbImage> for Frame {
  fn from(image: image::RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

impl Frame {
  pub fn to_rgb_image(&self) -> image::RgbImage {
    image::ImageBuffer::from_fn(self.width, self.height, |x, y| {
      image::Rgb(self.pixel_clamped(x as i64, y as i64))
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_raw_checks_length() {
    assert!(Frame::from_raw(2, 2, vec![0; 12]).is_some());
    assert!(Frame::from_raw(2, 2, vec![0; 11]).is_none());
  }

  #[test]
  fn pixel_lookup_clamps_to_edges() {
    let mut data = vec![0u8; 2 * 1 * RGB_CHANNELS];
    data[3..6].copy_from_slice(&[10, 20, 30]);
    let frame = Frame::from_raw(2, 1, data).unwrap();

    assert_eq!(frame.pixel_clamped(1, 0), [10, 20, 30]);
    assert_eq!(frame.pixel_clamped(5, 7), [10, 20, 30]);
    assert_eq!(frame.pixel_clamped(-3, 0), [0, 0, 0]);
  }
}
