// 该文件是 Huahua （画画） 项目的一部分。
// src/recognizer/sketch.rs - 简笔画识别服务
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
  borrow::Cow,
  ops::RangeInclusive,
  sync::{Arc, Mutex},
  time::Duration,
};

use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, query_value,
  normalize::{NormalizeMode, Normalizer, SKETCH_SIZE, transform::MAX_TARGET_PIXELS},
  recognizer::{
    CommonOptions, RecognitionResult, Recognizer, RecognizerError, lock_rng, parse_param,
    pick_alternatives, simulate_delay,
  },
  taxonomy::Taxonomy,
};

// 简笔画本身含义模糊，置信度刻意封顶在 90 以下
const SKETCH_CONFIDENCE: RangeInclusive<u8> = 45..=84;
// 相似对象最多取两个，同类别对象最多取一个
const SIMILAR_ALTERNATIVES: usize = 2;
const SIBLING_ALTERNATIVES: usize = 1;
// 同类别替代结果的基础置信度降幅
const SIBLING_CONFIDENCE_DROP: i32 = 15;

/// 按类别工作的简笔画识别服务
///
/// 先按 [`Normalizer::sketch`] 预处理输入图像，再从分类表中随机给出预测。
/// 预测不依赖图像内容，这里只保留“接收图像、返回结果”的契约。
pub struct SketchRecognizer<R = StdRng> {
  taxonomy: Arc<Taxonomy>,
  rng: Mutex<R>,
  delay: Duration,
  preprocess: Option<Normalizer>,
}

impl SketchRecognizer<StdRng> {
  pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
    Self::with_rng(taxonomy, StdRng::from_entropy())
  }

  /// 使用固定种子，结果序列可复现
  pub fn with_seed(taxonomy: Arc<Taxonomy>, seed: u64) -> Self {
    Self::with_rng(taxonomy, StdRng::seed_from_u64(seed))
  }
}

impl<R: Rng> SketchRecognizer<R> {
  pub fn with_rng(taxonomy: Arc<Taxonomy>, rng: R) -> Self {
    Self {
      taxonomy,
      rng: Mutex::new(rng),
      delay: Duration::ZERO,
      preprocess: Some(Normalizer::sketch()),
    }
  }

  /// 模拟的“思考时间”
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  /// 识别前的预处理，`None` 表示直接使用原始图像
  pub fn with_preprocess(mut self, preprocess: Option<Normalizer>) -> Self {
    self.preprocess = preprocess;
    self
  }

  pub fn taxonomy(&self) -> &Taxonomy {
    &self.taxonomy
  }

  /// 根据分类表生成识别结果，不检查图像内容
  pub fn analyze(&self, _image: &[u8]) -> RecognitionResult {
    let mut rng = lock_rng(&self.rng);
    let rng = &mut *rng;

    let Some(category) = self.taxonomy.categories().choose(rng) else {
      return RecognitionResult::failure("分类表为空");
    };
    let Some(prediction) = category.labels().choose(rng).map(String::as_str) else {
      return RecognitionResult::failure(format!("类别 {} 中没有任何对象", category.name()));
    };
    let confidence = rng.gen_range(SKETCH_CONFIDENCE);

    let mut alternatives = Vec::new();

    // 首先添加相似对象
    if let Some(similars) = self.taxonomy.similar().get(prediction) {
      let candidates: Vec<&str> = similars
        .iter()
        .map(String::as_str)
        .filter(|name| *name != prediction)
        .collect();
      alternatives.extend(pick_alternatives(
        rng,
        &candidates,
        confidence as i32,
        SIMILAR_ALTERNATIVES,
      ));
    }

    // 然后从同一类别中添加其他对象
    let siblings: Vec<&str> = category
      .labels()
      .iter()
      .map(String::as_str)
      .filter(|name| *name != prediction && alternatives.iter().all(|alt| alt.name != *name))
      .collect();
    alternatives.extend(pick_alternatives(
      rng,
      &siblings,
      confidence as i32 - SIBLING_CONFIDENCE_DROP,
      SIBLING_ALTERNATIVES,
    ));

    debug!(
      "简笔画识别结果: {} (类别: {}, 置信度: {}%)",
      prediction,
      category.name(),
      confidence
    );

    RecognitionResult::success(prediction, confidence)
      .with_category(category.name())
      .with_alternatives(alternatives)
      .mark_sketch_recognition()
  }
}

impl<R: Rng> Recognizer for SketchRecognizer<R> {
  fn recognize(&self, image: &[u8]) -> RecognitionResult {
    info!("使用简笔画专用识别服务");

    let processed = match &self.preprocess {
      Some(normalizer) => Cow::Owned(normalizer.normalize(image)),
      None => Cow::Borrowed(image),
    };

    simulate_delay(self.delay);
    self.analyze(&processed)
  }
}

impl FromUrlWithScheme for SketchRecognizer<StdRng> {
  const SCHEME: &'static str = "sketch";
}

impl FromUrl for SketchRecognizer<StdRng> {
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

    let size: u32 = parse_param(url, "size")?.unwrap_or(SKETCH_SIZE);
    if size == 0 || size as u64 * size as u64 > MAX_TARGET_PIXELS {
      return Err(RecognizerError::InvalidParameter {
        key: "size",
        value: size.to_string(),
      });
    }
    let preprocess = match query_value(url, "preprocess").as_deref() {
      None => Some(NormalizeMode::FullSketch),
      Some("none") => None,
      Some(mode) => Some(mode.parse::<NormalizeMode>().map_err(|_| {
        RecognizerError::InvalidParameter {
          key: "preprocess",
          value: mode.to_string(),
        }
      })?),
    };
    let preprocess = match preprocess {
      Some(mode) => {
        let mut normalizer = Normalizer::new(size, size, mode);
        if let Some(threshold) = parse_param(url, "threshold")? {
          normalizer = normalizer.with_threshold(threshold);
        }
        Some(normalizer)
      }
      None => None,
    };

    let recognizer = match seed {
      Some(seed) => SketchRecognizer::with_seed(taxonomy, seed),
      None => SketchRecognizer::new(taxonomy),
    };
    Ok(recognizer.with_delay(delay).with_preprocess(preprocess))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  fn seeded(seed: u64) -> SketchRecognizer {
    SketchRecognizer::with_seed(Taxonomy::builtin(), seed).with_preprocess(None)
  }

  #[test]
  fn confidence_stays_in_sketch_range() {
    let recognizer = seeded(1);
    for _ in 0..10_000 {
      let result = recognizer.recognize(&[]);
      let confidence = result.confidence().unwrap();
      assert!((45..=84).contains(&confidence), "置信度越界: {}", confidence);
      for alt in result.alternatives() {
        assert!((alt.score * 100.0).round() >= 20.0, "替代置信度过低: {:?}", alt);
      }
    }
  }

  #[test]
  fn prediction_belongs_to_category() {
    let recognizer = seeded(2);
    let taxonomy = Taxonomy::builtin();
    for _ in 0..2_000 {
      let result = recognizer.recognize(b"ignored");
      assert!(result.is_success());
      assert!(result.is_sketch_recognition());
      assert!(!result.is_mock());
      let category = taxonomy.category(result.category().unwrap()).unwrap();
      assert!(category.contains(result.prediction().unwrap()));
    }
  }

  #[test]
  fn alternatives_follow_similarity_and_category() {
    let recognizer = seeded(3);
    let taxonomy = Taxonomy::builtin();
    for _ in 0..2_000 {
      let result = recognizer.recognize(&[]);
      let prediction = result.prediction().unwrap();
      let category = taxonomy.category(result.category().unwrap()).unwrap();
      let similars = taxonomy.similar().get(prediction).unwrap_or(&[]);
      let alternatives = result.alternatives();

      let names: HashSet<_> = alternatives.iter().map(|a| a.name.as_str()).collect();
      assert_eq!(names.len(), alternatives.len(), "替代结果重复: {:?}", alternatives);
      assert!(!names.contains(prediction));

      let expected_similar = similars.len().min(SIMILAR_ALTERNATIVES);
      assert_eq!(alternatives.len(), expected_similar + SIBLING_ALTERNATIVES);
      for (i, alt) in alternatives.iter().enumerate() {
        if i < expected_similar {
          assert!(similars.contains(&alt.name));
        } else {
          assert!(category.contains(&alt.name));
        }
      }
    }
  }

  #[test]
  fn seeded_recognizers_are_deterministic() {
    let a = seeded(42);
    let b = seeded(42);
    for _ in 0..50 {
      assert_eq!(a.recognize(&[]), b.recognize(&[]));
    }
  }

  #[test]
  fn shared_across_threads() {
    let recognizer = Arc::new(seeded(13));
    let workers: Vec<_> = (0..8)
      .map(|_| {
        let recognizer = Arc::clone(&recognizer);
        std::thread::spawn(move || {
          (0..500)
            .map(|_| recognizer.recognize(&[]))
            .collect::<Vec<_>>()
        })
      })
      .collect();

    let taxonomy = Taxonomy::builtin();
    for worker in workers {
      let results = worker.join().unwrap();
      assert_eq!(results.len(), 500);
      for result in results {
        let confidence = result.confidence().unwrap();
        assert!((45..=84).contains(&confidence));
        let category = taxonomy.category(result.category().unwrap()).unwrap();
        assert!(category.contains(result.prediction().unwrap()));
      }
    }
  }

  #[test]
  fn predictions_are_randomized() {
    let recognizer = seeded(7);
    let predictions: HashSet<_> = (0..500)
      .map(|_| recognizer.recognize(&[]).prediction().unwrap().to_string())
      .collect();
    assert!(predictions.len() > 1);
  }

  #[test]
  fn image_content_does_not_change_outcome() {
    let a = SketchRecognizer::with_seed(Taxonomy::builtin(), 9);
    let b = SketchRecognizer::with_seed(Taxonomy::builtin(), 9);
    assert_eq!(a.recognize(b"not an image"), b.recognize(&[0u8; 64]));
  }

  #[test]
  fn from_url_reads_parameters() {
    let url = Url::parse("sketch://?seed=5&delay_ms=0&preprocess=plain&size=64&threshold=180").unwrap();
    let recognizer = SketchRecognizer::from_url(&url).unwrap();
    let normalizer = recognizer.preprocess.unwrap();
    assert_eq!(normalizer.width(), 64);
    assert_eq!(normalizer.mode(), NormalizeMode::Plain);
    assert_eq!(normalizer.threshold(), 180);

    let url = Url::parse("sketch://?preprocess=none").unwrap();
    assert!(SketchRecognizer::from_url(&url).unwrap().preprocess.is_none());

    let url = Url::parse("sketch://?preprocess=oil-paint").unwrap();
    assert!(matches!(
      SketchRecognizer::from_url(&url),
      Err(RecognizerError::InvalidParameter { key: "preprocess", .. })
    ));

    for size in ["0", "4097", "4294967295"] {
      let url = Url::parse(&format!("sketch://?size={}", size)).unwrap();
      assert!(matches!(
        SketchRecognizer::from_url(&url),
        Err(RecognizerError::InvalidParameter { key: "size", .. })
      ));
    }

    let url = Url::parse("mock://").unwrap();
    assert!(matches!(
      SketchRecognizer::from_url(&url),
      Err(RecognizerError::SchemeMismatch(_))
    ));
  }
}
