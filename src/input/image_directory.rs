// 该文件是 YOLOv5 检测项目的一部分。
// src/input/image_directory.rs - 图像目录输入
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

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, input::read_image_file::read_frame};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

#[derive(Error, Debug)]
pub enum ImageDirectoryInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按文件名顺序逐帧读取目录中的图像
///
/// 无法解码的文件会被跳过。`?loop` 参数使读取在结束后从头开始。
pub struct ImageDirectoryInput {
  files: Vec<PathBuf>,
  cursor: usize,
  repeat: bool,
}

impl FromUrlWithScheme for ImageDirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageDirectoryInput {
  type Error = ImageDirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageDirectoryInputError::SchemaMismatch);
    }

    let repeat = url.query_pairs().any(|(k, _)| k == "loop");
    Ok(Self::open(url.path())?.repeat(repeat))
  }
}

impl ImageDirectoryInput {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, std::io::Error> {
    let directory = directory.as_ref();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
      let path = entry?.path();
      if path.is_file() && is_image(&path) {
        files.push(path);
      }
    }
    files.sort();
    info!("目录 {} 中共有 {} 张图像", directory.display(), files.len());

    Ok(Self {
      files,
      cursor: 0,
      repeat: false,
    })
  }

  pub fn repeat(mut self, repeat: bool) -> Self {
    self.repeat = repeat;
    self
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }
}

fn is_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

impl Iterator for ImageDirectoryInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    // 最多尝试一整轮，避免全部文件都无法解码时死循环
    for _ in 0..self.files.len() {
      if self.cursor >= self.files.len() {
        if !self.repeat {
          return None;
        }
        self.cursor = 0;
      }

      let path = &self.files[self.cursor];
      self.cursor += 1;
      match read_frame(path) {
        Ok(frame) => return Some(frame),
        Err(e) => warn!("跳过无法读取的图像 {}: {}", path.display(), e),
      }
    }
    None
  }
}
