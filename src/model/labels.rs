// 该文件是 YOLOv5 检测项目的一部分。
// src/model/labels.rs - 类别名称表与类别过滤
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

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ClassNamesError {
  #[error("无法读取类别名称文件 {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("类别名称文件为空: {0}")]
  Empty(PathBuf),
}

/// 类别名称表，下标即类别 ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNameTable {
  names: Box<[String]>,
}

impl ClassNameTable {
  /// 读取每行一个名称的文本文件
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClassNamesError> {
    let path = path.as_ref();
    info!("加载类别名称文件: {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|source| ClassNamesError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    let table = Self::parse(&text);
    if table.is_empty() {
      return Err(ClassNamesError::Empty(path.to_path_buf()));
    }
    debug!("类别数量: {}", table.len());
    Ok(table)
  }

  /// 按行解析，保留中间的空行以保证下标稳定
  pub fn parse(text: &str) -> Self {
    let mut names: Vec<String> = text.lines().map(|line| line.trim().to_string()).collect();
    while names.last().is_some_and(|name| name.is_empty()) {
      names.pop();
    }
    Self {
      names: names.into_boxed_slice(),
    }
  }

  pub fn name(&self, class_id: usize) -> Option<&str> {
    self.names.get(class_id).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }

  /// 类别名称在排除集合中时返回 `true`；空集合或未知 ID 返回 `false`
  pub fn is_filtered(&self, class_id: usize, filter: &ClassFilterSet) -> bool {
    if filter.is_empty() {
      return false;
    }
    self
      .name(class_id)
      .is_some_and(|name| filter.contains(name))
  }
}

impl<S: Into<String>> FromIterator<S> for ClassNameTable {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    Self {
      names: iter.into_iter().map(Into::into).collect(),
    }
  }
}

/// 需要排除的类别名称集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassFilterSet {
  names: HashSet<String>,
}

impl ClassFilterSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, name: impl Into<String>) -> bool {
    self.names.insert(name.into())
  }

  pub fn contains(&self, name: &str) -> bool {
    self.names.contains(name)
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }

  /// 解析逗号分隔的名称列表，忽略空项
  pub fn parse_list(list: &str) -> Self {
    list
      .split(',')
      .map(str::trim)
      .filter(|name| !name.is_empty())
      .collect()
  }
}

impl<S: Into<String>> FromIterator<S> for ClassFilterSet {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    Self {
      names: iter.into_iter().map(Into::into).collect(),
    }
  }
}

impl<S: Into<String>> Extend<S> for ClassFilterSet {
  fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
    self.names.extend(iter.into_iter().map(Into::into));
  }
}
