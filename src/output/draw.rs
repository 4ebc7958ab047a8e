// 该文件是 YOLOv5 检测项目的一部分。
// src/output/draw.rs - 目标检测结果可视化与记录
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect as PixelRect;
use thiserror::Error;

use crate::{frame::Frame, model::ObjectDetection};

const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const LABEL_TEXT_COLOR: [u8; 3] = [255, 255, 255];
// 按类别循环使用的框颜色
const BOX_COLORS: [[u8; 3]; 10] = [
  [255, 56, 56],
  [255, 157, 151],
  [255, 112, 31],
  [255, 178, 29],
  [207, 210, 49],
  [72, 249, 10],
  [26, 147, 52],
  [0, 212, 187],
  [52, 69, 147],
  [203, 56, 255],
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件: {0}")]
  FontIo(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 在图像上绘制检测框；给出字体时同时绘制标签
pub struct Draw {
  font: Option<FontArc>,
  font_scale: PxScale,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
    }
  }
}

impl Draw {
  pub fn with_font_file(mut self, path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let data = std::fs::read(path)?;
    self.font = Some(FontArc::try_from_vec(data)?);
    Ok(self)
  }

  pub fn color_of(&self, class_id: usize) -> Rgb<u8> {
    Rgb(BOX_COLORS[class_id % BOX_COLORS.len()])
  }

  pub fn render(&self, frame: &Frame, detections: &[ObjectDetection]) -> RgbImage {
    let mut image = frame.to_rgb_image();
    self.draw_detections(&mut image, detections);
    image
  }

  pub fn draw_detections(&self, image: &mut RgbImage, detections: &[ObjectDetection]) {
    for detection in detections {
      self.draw_detection(image, detection);
    }
  }

  fn draw_detection(&self, image: &mut RgbImage, detection: &ObjectDetection) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let bbox = detection.bounding_box;
    let left = bbox.left.clamp(0, w - 1);
    let top = bbox.top.clamp(0, h - 1);
    let right = bbox.right.clamp(0, w - 1);
    let bottom = bbox.bottom.clamp(0, h - 1);
    if left >= right || top >= bottom {
      return;
    }

    let color = self.color_of(detection.class_id);
    for t in 0..BOX_THICKNESS {
      let width = right - left - 2 * t;
      let height = bottom - top - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = PixelRect::at(left + t, top + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    let Some(font) = &self.font else {
      return;
    };

    let label = format!("{} {:.2}", detection.class_name, detection.confidence);
    let (text_w, text_h) = text_size(self.font_scale, font, &label);
    let label_h = text_h as i32 + 2 * LABEL_TEXT_VERTICAL_PADDING;
    let label_x = left;
    let label_y = (top - label_h).max(0);
    let label_w = (text_w as i32).min(w - label_x);

    if label_w > 0 && label_h > 0 {
      let rect = PixelRect::at(label_x, label_y).of_size(label_w as u32, label_h as u32);
      draw_filled_rect_mut(image, rect, color);
      draw_text_mut(
        image,
        Rgb(LABEL_TEXT_COLOR),
        label_x,
        label_y + LABEL_TEXT_VERTICAL_PADDING,
        self.font_scale,
        font,
        &label,
      );
    }
  }
}

/// 检测结果的文本记录格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
  /// `name, score, left, top, right, bottom`
  Name,
  /// `id, score, left, top, right, bottom`
  Id,
  /// 每行一个 JSON 对象
  Json,
}

pub struct Record {
  pub format: RecordFormat,
}

impl Record {
  pub fn format_lines(&self, detections: &[ObjectDetection]) -> String {
    detections
      .iter()
      .map(|item| {
        let b = item.bounding_box;
        match self.format {
          RecordFormat::Name => format!(
            "{}, {:.4}, {}, {}, {}, {}",
            item.class_name, item.confidence, b.left, b.top, b.right, b.bottom
          ),
          RecordFormat::Id => format!(
            "{}, {:.4}, {}, {}, {}, {}",
            item.class_id, item.confidence, b.left, b.top, b.right, b.bottom
          ),
          RecordFormat::Json => item.to_json().to_string(),
        }
      })
      .collect::<Vec<_>>()
      .join("\n")
  }

  /// 写到与 `path` 同名、扩展名为 txt 或 jsonl 的文件
  pub fn record(&self, detections: &[ObjectDetection], path: &Path) -> Result<(), std::io::Error> {
    let extension = match self.format {
      RecordFormat::Json => "jsonl",
      _ => "txt",
    };
    std::fs::write(path.with_extension(extension), self.format_lines(detections))
  }
}
