// 该文件是 Huahua （画画） 项目的一部分。
// src/taxonomy.rs - 简笔画对象分类表与易混淆对象表
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

//! 分类表在进程启动后只读，可在线程间共享而无需加锁。
//!
//! 内置表来自 `labels/sketch.toml`，也可以在启动时从同格式的文件加载。

use std::{
  collections::{BTreeMap, HashMap, HashSet},
  path::Path,
  sync::{Arc, LazyLock},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const BUILTIN_TAXONOMY: &str = include_str!("../labels/sketch.toml");

static BUILTIN: LazyLock<Arc<Taxonomy>> = LazyLock::new(|| {
  let taxonomy = Taxonomy::from_toml_str(BUILTIN_TAXONOMY).expect("内置简笔画分类表无效");
  Arc::new(taxonomy)
});

#[derive(Error, Debug)]
pub enum TaxonomyError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("分类表解析错误: {0}")]
  ParseError(#[from] toml::de::Error),
  #[error("分类表中没有任何类别")]
  NoCategory,
  #[error("类别 {0} 中没有任何对象")]
  EmptyCategory(String),
  #[error("类别 {0} 重复定义")]
  DuplicateCategory(String),
  #[error("对象 {0} 的易混淆列表为空")]
  EmptySimilarity(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
  name: String,
  labels: Vec<String>,
}

impl Category {
  pub fn new<S: Into<String>>(name: impl Into<String>, labels: impl IntoIterator<Item = S>) -> Self {
    Self {
      name: name.into(),
      labels: labels.into_iter().map(Into::into).collect(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn labels(&self) -> &[String] {
    &self.labels
  }

  pub fn contains(&self, label: &str) -> bool {
    self.labels.iter().any(|l| l == label)
  }
}

/// 对象 → 简笔画中容易与之混淆的对象
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimilarityTable {
  entries: HashMap<String, Vec<String>>,
}

impl SimilarityTable {
  pub fn get(&self, label: &str) -> Option<&[String]> {
    self.entries.get(label).map(Vec::as_slice)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl<K, V, S> FromIterator<(K, V)> for SimilarityTable
where
  K: Into<String>,
  V: IntoIterator<Item = S>,
  S: Into<String>,
{
  fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
    let entries = iter
      .into_iter()
      .map(|(k, v)| (k.into(), v.into_iter().map(Into::into).collect()))
      .collect();
    Self { entries }
  }
}

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
  #[serde(default)]
  category: Vec<Category>,
  #[serde(default)]
  similar: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
  categories: Vec<Category>,
  similar: SimilarityTable,
}

impl Taxonomy {
  /// 校验并构建分类表
  pub fn new(categories: Vec<Category>, similar: SimilarityTable) -> Result<Self, TaxonomyError> {
    if categories.is_empty() {
      return Err(TaxonomyError::NoCategory);
    }

    let mut seen = HashSet::new();
    for category in &categories {
      if category.labels.is_empty() {
        return Err(TaxonomyError::EmptyCategory(category.name.clone()));
      }
      if !seen.insert(category.name.as_str()) {
        return Err(TaxonomyError::DuplicateCategory(category.name.clone()));
      }
    }

    if let Some((label, _)) = similar.entries.iter().find(|(_, v)| v.is_empty()) {
      return Err(TaxonomyError::EmptySimilarity(label.clone()));
    }

    Ok(Self {
      categories,
      similar,
    })
  }

  /// 进程内共享的内置分类表
  pub fn builtin() -> Arc<Taxonomy> {
    Arc::clone(&BUILTIN)
  }

  pub fn from_toml_str(content: &str) -> Result<Self, TaxonomyError> {
    let file: TaxonomyFile = toml::from_str(content)?;
    let taxonomy = Self::new(file.category, file.similar.into_iter().collect())?;
    debug!(
      "分类表加载完成: {} 个类别, {} 个对象, {} 条易混淆记录",
      taxonomy.categories.len(),
      taxonomy.labels().count(),
      taxonomy.similar.len()
    );
    Ok(taxonomy)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TaxonomyError> {
    let content = std::fs::read_to_string(path)?;
    Self::from_toml_str(&content)
  }

  pub fn categories(&self) -> &[Category] {
    &self.categories
  }

  pub fn category(&self, name: &str) -> Option<&Category> {
    self.categories.iter().find(|c| c.name == name)
  }

  /// 所有类别中的对象，按类别顺序展开
  pub fn labels(&self) -> impl Iterator<Item = &str> {
    self
      .categories
      .iter()
      .flat_map(|c| c.labels.iter().map(String::as_str))
  }

  pub fn similar(&self) -> &SimilarityTable {
    &self.similar
  }
}
