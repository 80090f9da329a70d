// 该文件是 Huahua （画画） 项目的一部分。
// src/output/directory_record.rs - 按日期归档的目录记录输出
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

use chrono::{DateTime, Datelike, Utc};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::SketchFrame,
  output::{FrameRecord, Render},
  recognizer::RecognitionResult,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 记录到 `目录/YYYY/MM/DD/HH-MM-SS-XXXX.png`，同名 `.json` 保存识别结果
///
/// 默认只记录识别成功的帧，`?always` 时失败的帧也记录。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  frame_counters: Arc<Mutex<u16>>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      frame_counters: Arc::new(Mutex::new(0)),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    let mut counter = self
      .frame_counters
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    let id = counter.wrapping_add(1);
    *counter = id;
    id
  }

  fn frame_path(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<SketchFrame, RecognitionResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(
    &self,
    frame: &SketchFrame,
    result: &RecognitionResult,
  ) -> Result<(), Self::Error> {
    if !self.always && !result.is_success() {
      debug!("识别失败，不记录该帧");
      return Ok(());
    }

    let path = self.frame_path(Utc::now())?;
    std::fs::write(&path, frame)?;
    let record = serde_json::to_vec_pretty(&FrameRecord::new(frame, result))?;
    std::fs::write(path.with_extension("json"), record)?;
    debug!("记录帧到 {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use std::path::Path;

  fn output(dir: &Path, query: &str) -> DirectoryRecordOutput {
    let url = url::Url::parse(&format!("folder://{}{}", dir.display(), query)).unwrap();
    DirectoryRecordOutput::from_url(&url).unwrap()
  }

  fn recorded_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
      for entry in std::fs::read_dir(current).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else {
          files.push(path);
        }
      }
    }
    files.sort();
    files
  }

  #[test]
  fn frame_path_is_dated_and_numbered() {
    let dir = tempfile::tempdir().unwrap();
    let output = output(dir.path(), "");
    let now = Utc.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();

    let first = output.frame_path(now).unwrap();
    let second = output.frame_path(now).unwrap();
    let day = dir.path().join("2026").join("03").join("07");
    assert_eq!(first, day.join("09-05-01-0001.png"));
    assert_eq!(second, day.join("09-05-01-0002.png"));
    assert!(day.is_dir());
  }

  #[test]
  fn failures_are_skipped_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let frame = SketchFrame::from(vec![7u8; 8]);
    let failed = RecognitionResult::failure("服务不可用");

    output(dir.path(), "").render_result(&frame, &failed).unwrap();
    assert!(recorded_files(dir.path()).is_empty());

    output(dir.path(), "?always").render_result(&frame, &failed).unwrap();
    assert_eq!(recorded_files(dir.path()).len(), 2);
  }

  #[test]
  fn success_writes_png_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let frame = SketchFrame::from(vec![1u8, 2, 3]);
    let result = RecognitionResult::success("tree", 60);
    output(dir.path(), "").render_result(&frame, &result).unwrap();

    let files = recorded_files(dir.path());
    assert_eq!(files.len(), 2);
    let json = files.iter().find(|p| p.extension().unwrap() == "json").unwrap();
    let png = files.iter().find(|p| p.extension().unwrap() == "png").unwrap();
    assert_eq!(std::fs::read(png).unwrap(), vec![1u8, 2, 3]);
    let value: serde_json::Value = serde_json::from_slice(&std::fs::read(json).unwrap()).unwrap();
    assert_eq!(value["prediction"], "tree");
  }
}
