// 该文件是 Huahua （画画） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::SketchFrame};

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "gif", "webp"];

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ImageFolderInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("{0} 不是目录")]
  NotADirectory(PathBuf),
}

fn origin_of(path: &Path) -> String {
  path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_else(|| path.display().to_string())
}

fn read_frame(path: &Path) -> Result<SketchFrame, std::io::Error> {
  let frame = SketchFrame::from(std::fs::read(path)?).with_origin(origin_of(path));
  debug!("读取图像文件 {} ({} 字节)", path.display(), frame.len());
  Ok(frame)
}

/// 单个图像文件，产生一帧原始图像字节
pub struct ImageFileInput {
  frame: Option<SketchFrame>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let frame = read_frame(Path::new(url.path()))?;
    Ok(ImageFileInput { frame: Some(frame) })
  }
}

impl Iterator for ImageFileInput {
  type Item = SketchFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}

/// 目录中的所有图像文件，按文件名排序依次产生
pub struct ImageFolderInput {
  paths: std::vec::IntoIter<PathBuf>,
}

impl FromUrlWithScheme for ImageFolderInput {
  const SCHEME: &'static str = "folder";
}

fn is_image_file(path: &Path) -> bool {
  path.is_file()
    && path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
      .unwrap_or(false)
}

impl FromUrl for ImageFolderInput {
  type Error = ImageFolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageFolderInputError::SchemaMismatch);
    }

    let directory = PathBuf::from(url.path());
    if !directory.is_dir() {
      return Err(ImageFolderInputError::NotADirectory(directory));
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(&directory)? {
      let path = entry?.path();
      if is_image_file(&path) {
        paths.push(path);
      }
    }
    paths.sort();
    info!("目录 {} 中共有 {} 个图像文件", directory.display(), paths.len());

    Ok(ImageFolderInput {
      paths: paths.into_iter(),
    })
  }
}

impl Iterator for ImageFolderInput {
  type Item = SketchFrame;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.paths.by_ref() {
      match read_frame(&path) {
        Ok(frame) => return Some(frame),
        Err(e) => error!("读取图像文件 {} 失败，跳过: {}", path.display(), e),
      }
    }
    None
  }
}
