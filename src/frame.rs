// 该文件是 Huahua （画画） 项目的一部分。
// src/frame.rs - 编码图像帧定义
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

use std::io::Cursor;

use image::{ImageFormat, RgbaImage};

use crate::normalize::NormalizeError;

/// 流经处理管线的一帧编码图像（PNG/JPEG 等原始字节）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SketchFrame {
  data: Box<[u8]>,
  origin: Option<String>,
}

impl From<Vec<u8>> for SketchFrame {
  fn from(data: Vec<u8>) -> Self {
    Self {
      data: data.into_boxed_slice(),
      origin: None,
    }
  }
}

impl From<&[u8]> for SketchFrame {
  fn from(data: &[u8]) -> Self {
    Self::from(data.to_vec())
  }
}

impl AsRef<[u8]> for SketchFrame {
  fn as_ref(&self) -> &[u8] {
    &self.data
  }
}

impl SketchFrame {
  /// 标记帧的来源（通常是文件名），用于日志与输出命名
  pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
    self.origin = Some(origin.into());
    self
  }

  pub fn origin(&self) -> Option<&str> {
    self.origin.as_deref()
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  /// 替换帧数据，保留来源信息
  pub fn replace_data(self, data: Vec<u8>) -> Self {
    Self {
      data: data.into_boxed_slice(),
      origin: self.origin,
    }
  }

  pub fn decode(&self) -> Result<RgbaImage, NormalizeError> {
    decode_rgba(&self.data)
  }
}

/// 将任意受支持格式的字节解码为 RGBA8 图像
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, NormalizeError> {
  let image = image::load_from_memory(bytes).map_err(NormalizeError::Decode)?;
  let rgba = image.into_rgba8();
  if rgba.width() == 0 || rgba.height() == 0 {
    return Err(NormalizeError::EmptyImage);
  }
  Ok(rgba)
}

/// 将 RGBA8 图像编码为 PNG（无损）字节
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, NormalizeError> {
  let mut buffer = Cursor::new(Vec::new());
  image
    .write_to(&mut buffer, ImageFormat::Png)
    .map_err(NormalizeError::Encode)?;
  Ok(buffer.into_inner())
}
