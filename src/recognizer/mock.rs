// 该文件是 Huahua （画画） 项目的一部分。
// src/recognizer/mock.rs - 模拟识别服务
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
  ops::RangeInclusive,
  sync::{Arc, Mutex},
  time::Duration,
};

use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  recognizer::{
    CommonOptions, RecognitionResult, Recognizer, RecognizerError, lock_rng, pick_alternatives,
    simulate_delay,
  },
  taxonomy::Taxonomy,
};

const MOCK_CONFIDENCE: RangeInclusive<u8> = 50..=89;
const MAX_SIMILAR_ALTERNATIVES: usize = 2;

/// 不区分类别的模拟识别服务，用于开发测试或作为最简单的兜底
pub struct MockRecognizer<R = StdRng> {
  labels: Vec<String>,
  taxonomy: Arc<Taxonomy>,
  rng: Mutex<R>,
  delay: Duration,
}

impl MockRecognizer<StdRng> {
  pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
    Self::with_rng(taxonomy, StdRng::from_entropy())
  }

  pub fn with_seed(taxonomy: Arc<Taxonomy>, seed: u64) -> Self {
    Self::with_rng(taxonomy, StdRng::seed_from_u64(seed))
  }
}

impl<R: Rng> MockRecognizer<R> {
  pub fn with_rng(taxonomy: Arc<Taxonomy>, rng: R) -> Self {
    let labels = taxonomy.labels().map(str::to_string).collect();
    Self {
      labels,
      taxonomy,
      rng: Mutex::new(rng),
      delay: Duration::ZERO,
    }
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn labels(&self) -> &[String] {
    &self.labels
  }

  fn synthesize(&self) -> RecognitionResult {
    let mut rng = lock_rng(&self.rng);
    let rng = &mut *rng;

    let Some(prediction) = self.labels.choose(rng).map(String::as_str) else {
      return RecognitionResult::failure("没有可用的识别对象");
    };
    let confidence = rng.gen_range(MOCK_CONFIDENCE);

    let alternatives = match self.taxonomy.similar().get(prediction) {
      Some(similars) => {
        let candidates: Vec<&str> = similars
          .iter()
          .map(String::as_str)
          .filter(|name| *name != prediction)
          .collect();
        let count = rng.gen_range(1..=candidates.len().clamp(1, MAX_SIMILAR_ALTERNATIVES));
        pick_alternatives(rng, &candidates, confidence as i32, count)
      }
      None => Vec::new(),
    };

    debug!("模拟简笔画识别结果: {} (置信度: {}%)", prediction, confidence);

    RecognitionResult::success(prediction, confidence)
      .with_alternatives(alternatives)
      .mark_mock()
      .mark_sketch_recognition()
  }
}

impl<R: Rng> Recognizer for MockRecognizer<R> {
  fn recognize(&self, _image: &[u8]) -> RecognitionResult {
    info!("使用模拟简笔画识别服务");
    simulate_delay(self.delay);
    self.synthesize()
  }
}

impl FromUrlWithScheme for MockRecognizer<StdRng> {
  const SCHEME: &'static str = "mock";
}

impl FromUrl for MockRecognizer<StdRng> {
  type Error = RecognizerError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RecognizerError::SchemeMismatch(url.scheme().to_string()));
    }

    let CommonOptions {
      seed,
      delay,
      taxonomy,
    } = CommonOptions::from_url(url)?;

    let recognizer = match seed {
      Some(seed) => MockRecognizer::with_seed(taxonomy, seed),
      None => MockRecognizer::new(taxonomy),
    };
    Ok(recognizer.with_delay(delay))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  #[test]
  fn flat_labels_cover_every_category() {
    let taxonomy = Taxonomy::builtin();
    let recognizer = MockRecognizer::with_seed(taxonomy.clone(), 0);
    assert_eq!(recognizer.labels().len(), taxonomy.labels().count());
    assert_eq!(recognizer.labels()[0], "cat");
  }

  #[test]
  fn results_are_flagged_and_bounded() {
    let taxonomy = Taxonomy::builtin();
    let recognizer = MockRecognizer::with_seed(taxonomy.clone(), 4);
    for _ in 0..5_000 {
      let result = recognizer.recognize(&[]);
      assert!(result.is_success());
      assert!(result.is_mock());
      assert!(result.is_sketch_recognition());
      assert_eq!(result.category(), None);

      let confidence = result.confidence().unwrap();
      assert!((50..=89).contains(&confidence));

      let prediction = result.prediction().unwrap();
      assert!(recognizer.labels().iter().any(|l| l == prediction));

      let alternatives = result.alternatives();
      match taxonomy.similar().get(prediction) {
        Some(similars) => {
          assert!((1..=2).contains(&alternatives.len()));
          assert!(alternatives.iter().all(|alt| similars.contains(&alt.name)));
          let names: HashSet<_> = alternatives.iter().map(|a| &a.name).collect();
          assert_eq!(names.len(), alternatives.len());
        }
        None => assert!(alternatives.is_empty()),
      }
      for alt in alternatives {
        assert!(alt.score >= 0.2 - f32::EPSILON);
        assert!(alt.score * 100.0 <= confidence as f32);
      }
    }
  }

  #[test]
  fn from_url_builds_seeded_recognizer() {
    let url = Url::parse("mock://?seed=21").unwrap();
    let a = MockRecognizer::from_url(&url).unwrap();
    let b = MockRecognizer::from_url(&url).unwrap();
    assert_eq!(a.recognize(&[]), b.recognize(&[]));
  }
}
