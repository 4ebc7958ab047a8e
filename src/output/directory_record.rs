// 该文件是 YOLOv5 检测项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{DateTime, Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::ObjectDetection,
  output::{
    Render,
    draw::{Draw, DrawError, Record, RecordFormat},
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("绘制错误: {0}")]
  DrawError(#[from] DrawError),
}

pub enum DrawWrapper {
  /// 保存绘制了检测框的图像
  Draw(Box<Draw>),
  /// 保存原图并另存检测记录
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result(
    &self,
    path: &Path,
    frame: &Frame,
    result: &[ObjectDetection],
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        draw.render(frame, result).save(path)?;
      }
      DrawWrapper::Record(record) => {
        frame.to_rgb_image().save(path)?;
        record.record(result, path)?;
      }
    };

    Ok(())
  }
}

/// 按日期分目录保存每一帧的结果
///
/// `folder:///path?record=json|name|id&always&font=/path/font.ttf`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let mut draw = DrawWrapper::Draw(Box::default());
    let mut font = None;
    for (k, v) in uri.query_pairs() {
      match k.as_ref() {
        "record" => {
          let format = match v.as_ref() {
            "id" => RecordFormat::Id,
            "json" => RecordFormat::Json,
            _ => RecordFormat::Name,
          };
          draw = DrawWrapper::Record(Record { format });
        }
        "font" => font = Some(PathBuf::from(v.as_ref())),
        _ => {}
      }
    }

    if let (DrawWrapper::Draw(inner), Some(font)) = (&mut draw, font) {
      let with_font = std::mem::take(inner.as_mut()).with_font_file(font)?;
      **inner = with_font;
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput::new(uri.path(), draw, always))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl AsRef<Path>, draw: DrawWrapper, always: bool) -> Self {
    Self {
      directory: directory.as_ref().to_path_buf(),
      draw,
      frame_counter: AtomicU16::new(0),
      always,
    }
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self, now: DateTime<Utc>) -> Result<PathBuf, std::io::Error> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<Frame, Vec<ObjectDetection>> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, result: &Vec<ObjectDetection>) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("没有检测结果，跳过保存");
      return Ok(());
    }

    let path = self.frame_path(Utc::now())?;
    self.draw.save_result(&path, frame, result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Rect;

  fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(path) = stack.pop() {
      for entry in std::fs::read_dir(path).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else {
          files.push(path);
        }
      }
    }
    files.sort();
    files
  }

  #[test]
  fn empty_results_are_skipped_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let output = DirectoryRecordOutput::new(dir.path(), DrawWrapper::Draw(Box::default()), false);
    output
      .render_result(&Frame::with_shape(4, 4), &Vec::new())
      .unwrap();
    assert!(files_under(dir.path()).is_empty());

    let output = DirectoryRecordOutput::new(dir.path(), DrawWrapper::Draw(Box::default()), true);
    output
      .render_result(&Frame::with_shape(4, 4), &Vec::new())
      .unwrap();
    assert_eq!(files_under(dir.path()).len(), 1);
  }

  #[test]
  fn record_mode_writes_image_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let output = DirectoryRecordOutput::new(
      dir.path(),
      DrawWrapper::Record(Record {
        format: RecordFormat::Json,
      }),
      false,
    );

    let detections = vec![ObjectDetection {
      class_id: 0,
      class_name: "person".to_string(),
      bounding_box: Rect::new(0, 0, 2, 2),
      confidence: 0.9,
    }];
    output
      .render_result(&Frame::with_shape(4, 4), &detections)
      .unwrap();

    let files = files_under(dir.path());
    assert_eq!(files.len(), 2);
    let record = files
      .iter()
      .find(|p| p.extension().is_some_and(|e| e == "jsonl"))
      .unwrap();
    let text = std::fs::read_to_string(record).unwrap();
    assert!(text.contains("\"person\""));
  }
}
