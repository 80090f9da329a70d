// 该文件是 Huahua （画画） 项目的一部分。
// src/recognizer/fallback.rs - 带兜底的识别服务
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

use tracing::warn;

use crate::recognizer::{RecognitionResult, Recognizer};

/// 主识别服务失败时改用备用识别服务
pub struct FallbackRecognizer<P, F> {
  primary: P,
  fallback: F,
}

impl<P: Recognizer, F: Recognizer> FallbackRecognizer<P, F> {
  pub fn new(primary: P, fallback: F) -> Self {
    Self { primary, fallback }
  }
}

impl<P: Recognizer, F: Recognizer> Recognizer for FallbackRecognizer<P, F> {
  fn recognize(&self, image: &[u8]) -> RecognitionResult {
    let result = self.primary.recognize(image);
    if result.is_success() {
      return result;
    }

    warn!(
      "主识别服务失败: {}，改用备用识别服务",
      result.message().unwrap_or("未知错误")
    );
    self.fallback.recognize(image)
  }
}
