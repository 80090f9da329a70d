// 该文件是 Huahua （画画） 项目的一部分。
// src/normalize/transform.rs - 像素变换
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

use image::{
  GrayImage, ImageBuffer, Luma, Pixel, Rgb, Rgba, RgbaImage,
  imageops::{self, FilterType},
};
use imageproc::contrast::{ThresholdType, threshold};

use super::NormalizeError;

// 对比度增强因子 (1.2 表示增强 20%)
const CONTRAST_FACTOR: f32 = 1.2;
const CONTRAST_PIVOT: f32 = 128.0;

// 亮度高于该值的像素二值化为白色
const BINARY_LUMA_THRESHOLD: u8 = 127;

/// 缩放目标的像素总数上限 (4096 × 4096)
pub const MAX_TARGET_PIXELS: u64 = 4096 * 4096;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// 双线性插值缩放到 `width × height`，不保持宽高比，不裁剪
pub fn resize(image: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage, NormalizeError> {
  if width == 0 || height == 0 {
    return Err(NormalizeError::transform(
      "resize",
      format!("目标尺寸无效: {}x{}", width, height),
    ));
  }
  if width as u64 * height as u64 > MAX_TARGET_PIXELS {
    return Err(NormalizeError::transform(
      "resize",
      format!("目标尺寸过大: {}x{}", width, height),
    ));
  }
  if image.width() == 0 || image.height() == 0 {
    return Err(NormalizeError::transform("resize", "源图像为空"));
  }

  Ok(imageops::resize(image, width, height, FilterType::Triangle))
}

fn contrast_table() -> [u8; 256] {
  std::array::from_fn(|value| {
    let stretched = (value as f32 - CONTRAST_PIVOT) * CONTRAST_FACTOR + CONTRAST_PIVOT;
    // 四舍五入（半数向上）后截断到 [0, 255]
    (stretched + 0.5).floor().clamp(0.0, 255.0) as u8
  })
}

/// 以 128 为中心将 RGB 通道拉伸 1.2 倍，alpha 通道保持不变
pub fn enhance_contrast(image: &RgbaImage) -> RgbaImage {
  let table = contrast_table();
  let mut enhanced = image.clone();
  for pixel in enhanced.pixels_mut() {
    let Rgba([r, g, b, a]) = *pixel;
    *pixel = Rgba([
      table[r as usize],
      table[g as usize],
      table[b as usize],
      a,
    ]);
  }
  enhanced
}

// 将通道值按 alpha 混合到白色背景上
fn over_white(channel: u8, alpha: u8) -> u8 {
  let (c, a) = (channel as u32, alpha as u32);
  ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

/// 转换为纯黑白两级图像
///
/// 像素先叠加到不透明白色背景上，再按亮度二值化；输出完全不透明。
pub fn convert_to_black_and_white(image: &RgbaImage) -> RgbaImage {
  let gray: GrayImage = ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
    let Rgba([r, g, b, a]) = *image.get_pixel(x, y);
    Rgb([over_white(r, a), over_white(g, a), over_white(b, a)]).to_luma()
  });

  let binary = threshold(&gray, BINARY_LUMA_THRESHOLD, ThresholdType::Binary);

  ImageBuffer::from_fn(binary.width(), binary.height(), |x, y| {
    let Luma([level]) = *binary.get_pixel(x, y);
    Rgba([level, level, level, 255])
  })
}

/// 按亮度阈值简化图像，去除噪点
///
/// 透明像素原样保留；亮度高于 `threshold` 的像素变为全透明，
/// 其余像素变为不透明纯黑。对同一阈值重复应用结果不变。
pub fn simplify(image: &RgbaImage, threshold: u8) -> RgbaImage {
  let mut simplified = image.clone();
  for pixel in simplified.pixels_mut() {
    let Rgba([r, g, b, a]) = *pixel;
    if a == 0 {
      continue;
    }

    let brightness = (r as u16 + g as u16 + b as u16) / 3;
    *pixel = if brightness > threshold as u16 {
      TRANSPARENT
    } else {
      INK
    };
  }
  simplified
}
