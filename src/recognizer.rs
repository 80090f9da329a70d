// 该文件是 Huahua （画画） 项目的一部分。
// src/recognizer.rs - 识别服务接口与识别结果
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

use std::{
  str::FromStr,
  sync::{Arc, Mutex, PoisonError},
  thread,
  time::Duration,
};

use rand::{Rng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, query_value,
  taxonomy::{Taxonomy, TaxonomyError},
};

mod fallback;
mod mock;
mod sketch;
pub use self::fallback::FallbackRecognizer;
pub use self::mock::MockRecognizer;
pub use self::sketch::SketchRecognizer;

/// 识别服务接口
///
/// 实现方接收编码后的图像字节，总是返回一个识别结果；
/// 不可恢复的失败以 `success = false` 的结果表示。
pub trait Recognizer {
  fn recognize(&self, image: &[u8]) -> RecognitionResult;
}

impl<T: Recognizer + ?Sized> Recognizer for &T {
  fn recognize(&self, image: &[u8]) -> RecognitionResult {
    (**self).recognize(image)
  }
}

impl<T: Recognizer + ?Sized> Recognizer for Box<T> {
  fn recognize(&self, image: &[u8]) -> RecognitionResult {
    (**self).recognize(image)
  }
}

impl<T: Recognizer + ?Sized> Recognizer for Arc<T> {
  fn recognize(&self, image: &[u8]) -> RecognitionResult {
    (**self).recognize(image)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
  pub name: String,
  pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
  success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  prediction: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  confidence: Option<u8>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  category: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  alternatives: Vec<Alternative>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  message: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  error: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  mock: bool,
  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  sketch_recognition: bool,
}

impl RecognitionResult {
  /// 成功的识别结果，置信度取值 0-100
  pub fn success(prediction: impl Into<String>, confidence: u8) -> Self {
    Self {
      success: true,
      prediction: Some(prediction.into()),
      confidence: Some(confidence.min(100)),
      category: None,
      alternatives: Vec::new(),
      message: None,
      error: None,
      mock: false,
      sketch_recognition: false,
    }
  }

  pub fn failure(message: impl Into<String>) -> Self {
    Self {
      success: false,
      prediction: None,
      confidence: None,
      category: None,
      alternatives: Vec::new(),
      message: Some(message.into()),
      error: None,
      mock: false,
      sketch_recognition: false,
    }
  }

  pub fn with_category(mut self, category: impl Into<String>) -> Self {
    self.category = Some(category.into());
    self
  }

  pub fn with_alternatives(mut self, alternatives: Vec<Alternative>) -> Self {
    self.alternatives = alternatives;
    self
  }

  /// 附加诊断信息
  pub fn with_error(mut self, error: serde_json::Value) -> Self {
    self.error = Some(error);
    self
  }

  pub fn mark_mock(mut self) -> Self {
    self.mock = true;
    self
  }

  pub fn mark_sketch_recognition(mut self) -> Self {
    self.sketch_recognition = true;
    self
  }

  pub fn is_success(&self) -> bool {
    self.success
  }

  pub fn prediction(&self) -> Option<&str> {
    self.prediction.as_deref()
  }

  pub fn confidence(&self) -> Option<u8> {
    self.confidence
  }

  pub fn category(&self) -> Option<&str> {
    self.category.as_deref()
  }

  pub fn alternatives(&self) -> &[Alternative] {
    &self.alternatives
  }

  pub fn message(&self) -> Option<&str> {
    self.message.as_deref()
  }

  pub fn error(&self) -> Option<&serde_json::Value> {
    self.error.as_ref()
  }

  pub fn is_mock(&self) -> bool {
    self.mock
  }

  pub fn is_sketch_recognition(&self) -> bool {
    self.sketch_recognition
  }
}

#[derive(Error, Debug)]
pub enum RecognizerError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("参数 {key} 的值无效: {value}")]
  InvalidParameter { key: &'static str, value: String },
  #[error("分类表错误: {0}")]
  TaxonomyError(#[from] TaxonomyError),
}

// 替代结果的置信度下限（百分比）
const MIN_ALTERNATIVE_CONFIDENCE: i32 = 20;
// 替代结果相对基础置信度的固定降幅与随机降幅上限
const ALTERNATIVE_DROP: i32 = 5;
const ALTERNATIVE_JITTER: i32 = 15;

fn alternative_score<R: Rng + ?Sized>(rng: &mut R, base_confidence: i32) -> f32 {
  let confidence = (base_confidence - ALTERNATIVE_DROP - rng.gen_range(0..ALTERNATIVE_JITTER))
    .max(MIN_ALTERNATIVE_CONFIDENCE);
  confidence as f32 / 100.0
}

/// 从候选对象中无放回地随机挑选至多 `count` 个替代结果
pub(crate) fn pick_alternatives<R: Rng + ?Sized>(
  rng: &mut R,
  candidates: &[&str],
  base_confidence: i32,
  count: usize,
) -> Vec<Alternative> {
  let mut shuffled = candidates.to_vec();
  shuffled.shuffle(rng);
  shuffled
    .into_iter()
    .take(count)
    .map(|name| Alternative {
      name: name.to_string(),
      score: alternative_score(rng, base_confidence),
    })
    .collect()
}

/// 模拟识别耗时
pub(crate) fn simulate_delay(delay: Duration) {
  if !delay.is_zero() {
    thread::sleep(delay);
  }
}

pub(crate) fn lock_rng<R>(rng: &Mutex<R>) -> std::sync::MutexGuard<'_, R> {
  rng.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 两种识别服务共用的 URL 参数
pub(crate) struct CommonOptions {
  pub seed: Option<u64>,
  pub delay: Duration,
  pub taxonomy: Arc<Taxonomy>,
}

pub(crate) fn parse_param<T: FromStr>(url: &Url, key: &'static str) -> Result<Option<T>, RecognizerError> {
  match query_value(url, key) {
    Some(value) => value
      .parse()
      .map(Some)
      .map_err(|_| RecognizerError::InvalidParameter { key, value }),
    None => Ok(None),
  }
}

impl CommonOptions {
  pub fn from_url(url: &Url) -> Result<Self, RecognizerError> {
    let seed = parse_param(url, "seed")?;
    let delay = parse_param::<u64>(url, "delay_ms")?
      .map(Duration::from_millis)
      .unwrap_or_default();
    let taxonomy = match query_value(url, "labels") {
      Some(path) => Arc::new(Taxonomy::from_path(path)?),
      None => Taxonomy::builtin(),
    };
    Ok(Self {
      seed,
      delay,
      taxonomy,
    })
  }
}

/// 按 URL 方案选择的识别服务
pub enum RecognizerWrapper {
  Sketch(SketchRecognizer),
  Mock(MockRecognizer),
}

impl FromUrl for RecognizerWrapper {
  type Error = RecognizerError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      SketchRecognizer::<StdRng>::SCHEME => {
        Ok(RecognizerWrapper::Sketch(SketchRecognizer::from_url(url)?))
      }
      MockRecognizer::<StdRng>::SCHEME => Ok(RecognizerWrapper::Mock(MockRecognizer::from_url(url)?)),
      other => Err(RecognizerError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Recognizer for RecognizerWrapper {
  fn recognize(&self, image: &[u8]) -> RecognitionResult {
    match self {
      RecognizerWrapper::Sketch(recognizer) => recognizer.recognize(image),
      RecognizerWrapper::Mock(recognizer) => recognizer.recognize(image),
    }
  }
}
