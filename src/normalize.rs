// 该文件是 Huahua （画画） 项目的一部分。
// src/normalize.rs - 简笔画图像预处理管线
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

use std::{fmt, str::FromStr, time::Instant};

use image::RgbaImage;
use thiserror::Error;
use tracing::{debug, warn};

use crate::frame::{SketchFrame, decode_rgba, encode_png};

pub mod transform;

/// 简笔画识别使用的标准尺寸
pub const SKETCH_SIZE: u32 = 300;
/// 去噪阈值的默认值
pub const DEFAULT_SIMPLIFY_THRESHOLD: u8 = 200;

#[derive(Error, Debug)]
pub enum NormalizeError {
  #[error("图像解码错误: {0}")]
  Decode(image::ImageError),
  #[error("图像尺寸为空")]
  EmptyImage,
  #[error("图像变换错误 ({stage}): {reason}")]
  Transform { stage: &'static str, reason: String },
  #[error("图像编码错误: {0}")]
  Encode(image::ImageError),
  #[error("未知的预处理模式: {0}")]
  UnknownMode(String),
}

impl NormalizeError {
  pub fn transform(stage: &'static str, reason: impl Into<String>) -> Self {
    NormalizeError::Transform {
      stage,
      reason: reason.into(),
    }
  }
}

/// 预处理模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizeMode {
  /// 缩放 + 对比度增强
  #[default]
  Plain,
  /// 缩放 + 对比度增强 + 黑白化 + 去噪
  FullSketch,
}

impl FromStr for NormalizeMode {
  type Err = NormalizeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "plain" => Ok(NormalizeMode::Plain),
      "full" | "full-sketch" | "sketch" => Ok(NormalizeMode::FullSketch),
      other => Err(NormalizeError::UnknownMode(other.to_string())),
    }
  }
}

impl fmt::Display for NormalizeMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      NormalizeMode::Plain => write!(f, "plain"),
      NormalizeMode::FullSketch => write!(f, "full-sketch"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
  width: u32,
  height: u32,
  mode: NormalizeMode,
  threshold: u8,
}

impl Default for Normalizer {
  fn default() -> Self {
    Self::sketch()
  }
}

impl Normalizer {
  pub fn new(width: u32, height: u32, mode: NormalizeMode) -> Self {
    Self {
      width,
      height,
      mode,
      threshold: DEFAULT_SIMPLIFY_THRESHOLD,
    }
  }

  /// 简笔画识别的完整预处理：300x300，黑白化并去噪
  pub fn sketch() -> Self {
    Self::new(SKETCH_SIZE, SKETCH_SIZE, NormalizeMode::FullSketch)
  }

  pub fn with_threshold(mut self, threshold: u8) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn mode(&self) -> NormalizeMode {
    self.mode
  }

  pub fn threshold(&self) -> u8 {
    self.threshold
  }

  /// 依次执行各个变换阶段
  ///
  /// 任一阶段失败时记录警告并沿用上一阶段的结果，不会中断整个管线。
  pub fn process(&self, image: RgbaImage) -> RgbaImage {
    let mut current = run_stage("resize", image, |img| {
      transform::resize(img, self.width, self.height)
    });
    current = run_stage("enhance_contrast", current, |img| {
      Ok(transform::enhance_contrast(img))
    });

    if self.mode == NormalizeMode::FullSketch {
      current = run_stage("black_and_white", current, |img| {
        Ok(transform::convert_to_black_and_white(img))
      });
      current = run_stage("simplify", current, |img| {
        Ok(transform::simplify(img, self.threshold))
      });
    }

    current
  }

  /// 解码、处理并重新编码为 PNG，解码或编码失败时返回错误
  pub fn try_normalize(&self, bytes: &[u8]) -> Result<Vec<u8>, NormalizeError> {
    let now = Instant::now();
    let image = decode_rgba(bytes)?;
    debug!(
      "输入图像 {}x{}，预处理为 {}x{} ({})",
      image.width(),
      image.height(),
      self.width,
      self.height,
      self.mode
    );
    let processed = self.process(image);
    let encoded = encode_png(&processed)?;
    debug!("图像预处理完成，耗时: {:.2?}", now.elapsed());
    Ok(encoded)
  }

  /// 预处理图像字节；任何失败都回退为原始字节
  pub fn normalize(&self, bytes: &[u8]) -> Vec<u8> {
    match self.try_normalize(bytes) {
      Ok(encoded) => encoded,
      Err(e) => {
        warn!("图像预处理失败，将使用原始图像: {}", e);
        bytes.to_vec()
      }
    }
  }

  pub fn normalize_frame(&self, frame: SketchFrame) -> SketchFrame {
    let data = self.normalize(frame.as_ref());
    frame.replace_data(data)
  }

  pub fn normalize_iter<I>(&self, input: I) -> NormalizedFrames<I>
  where
    I: Iterator<Item = SketchFrame>,
  {
    NormalizedFrames {
      inner: input,
      normalizer: *self,
    }
  }
}

fn run_stage<F>(stage: &'static str, current: RgbaImage, f: F) -> RgbaImage
where
  F: FnOnce(&RgbaImage) -> Result<RgbaImage, NormalizeError>,
{
  match f(&current) {
    Ok(next) => next,
    Err(e) => {
      warn!("预处理阶段 {} 失败，跳过该阶段: {}", stage, e);
      current
    }
  }
}

/// 对输入帧逐一预处理的迭代器适配器
pub struct NormalizedFrames<I> {
  inner: I,
  normalizer: Normalizer,
}

impl<I: Iterator<Item = SketchFrame>> Iterator for NormalizedFrames<I> {
  type Item = SketchFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self
      .inner
      .next()
      .map(|frame| self.normalizer.normalize_frame(frame))
  }
}

/// 将图像字节预处理为 `width × height` 的 PNG 字节，失败时返回原始字节
pub fn normalize(bytes: &[u8], width: u32, height: u32, mode: NormalizeMode) -> Vec<u8> {
  Normalizer::new(width, height, mode).normalize(bytes)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgba;

  fn png(image: &RgbaImage) -> Vec<u8> {
    encode_png(image).unwrap()
  }

  #[test]
  fn scenario_black_square_stays_black() {
    let image = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
    let output = normalize(&png(&image), 300, 300, NormalizeMode::Plain);
    let decoded = decode_rgba(&output).unwrap();
    assert_eq!(decoded.dimensions(), (300, 300));
    assert!(decoded.pixels().all(|p| p == &Rgba([0, 0, 0, 255])));
  }

  #[test]
  fn garbage_input_is_returned_unchanged() {
    let bytes = b"\x89PNG but not really".to_vec();
    let output = normalize(&bytes, 300, 300, NormalizeMode::FullSketch);
    assert_eq!(output, bytes);
  }

  #[test]
  fn try_normalize_reports_decode_failure() {
    let err = Normalizer::sketch().try_normalize(&[]).unwrap_err();
    assert!(matches!(err, NormalizeError::Decode(_)));
  }

  #[test]
  fn zero_size_target_skips_resize_only() {
    let image = RgbaImage::from_pixel(7, 3, Rgba([100, 100, 100, 255]));
    let output = Normalizer::new(0, 0, NormalizeMode::Plain).normalize(&png(&image));
    let decoded = decode_rgba(&output).unwrap();
    // 缩放失败被跳过，对比度增强仍然生效
    assert_eq!(decoded.dimensions(), (7, 3));
    assert!(decoded.pixels().all(|p| p == &Rgba([94, 94, 94, 255])));
  }

  #[test]
  fn oversized_target_skips_resize() {
    let image = RgbaImage::from_pixel(4, 4, Rgba([100, 100, 100, 255]));
    let output = normalize(&png(&image), u32::MAX, u32::MAX, NormalizeMode::Plain);
    let decoded = decode_rgba(&output).unwrap();
    assert_eq!(decoded.dimensions(), (4, 4));
    assert!(decoded.pixels().all(|p| p == &Rgba([94, 94, 94, 255])));
  }

  #[test]
  fn full_sketch_yields_ink_mask() {
    // 透明背景上画一条黑线
    let image = RgbaImage::from_fn(40, 40, |x, y| {
      if x == y {
        Rgba([0, 0, 0, 255])
      } else {
        Rgba([0, 0, 0, 0])
      }
    });
    let output = Normalizer::sketch().normalize(&png(&image));
    let decoded = decode_rgba(&output).unwrap();
    assert_eq!(decoded.dimensions(), (SKETCH_SIZE, SKETCH_SIZE));
    assert!(
      decoded
        .pixels()
        .all(|p| p == &Rgba([0, 0, 0, 255]) || p == &Rgba([0, 0, 0, 0]))
    );
    assert!(decoded.pixels().any(|p| p[3] == 255));
    assert!(decoded.pixels().any(|p| p[3] == 0));
  }

  #[test]
  fn normalizing_twice_is_stable_for_full_sketch() {
    let image = RgbaImage::from_fn(30, 30, |x, y| Rgba([(x * 8) as u8, (y * 8) as u8, 60, 255]));
    let normalizer = Normalizer::sketch();
    let once = normalizer.normalize(&png(&image));
    let twice = normalizer.normalize(&once);
    assert_eq!(decode_rgba(&once).unwrap(), decode_rgba(&twice).unwrap());
  }

  #[test]
  fn mode_parses_from_str() {
    assert_eq!("plain".parse::<NormalizeMode>().unwrap(), NormalizeMode::Plain);
    assert_eq!(
      "full-sketch".parse::<NormalizeMode>().unwrap(),
      NormalizeMode::FullSketch
    );
    assert!("sepia".parse::<NormalizeMode>().is_err());
  }

  #[test]
  fn iterator_adapter_keeps_origin() {
    let image = RgbaImage::from_pixel(5, 5, Rgba([255, 255, 255, 255]));
    let frames = vec![SketchFrame::from(png(&image)).with_origin("blank.png")];
    let normalized: Vec<_> = Normalizer::new(8, 6, NormalizeMode::Plain)
      .normalize_iter(frames.into_iter())
      .collect();
    assert_eq!(normalized.len(), 1);
    assert_eq!(normalized[0].origin(), Some("blank.png"));
    assert_eq!(normalized[0].decode().unwrap().dimensions(), (8, 6));
  }
}
