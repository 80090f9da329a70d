// 该文件是 Huahua （画画） 项目的一部分。
// src/output/stdout_output.rs - 标准输出
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

use std::io::Write;

use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::SketchFrame,
  output::{FrameRecord, Render},
  query_value,
  recognizer::RecognitionResult,
};

#[derive(Error, Debug)]
pub enum StdoutOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("未知的输出格式: {0}")]
  UnknownFormat(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StdoutFormat {
  #[default]
  Text,
  Json,
}

/// 每个识别结果打印一行
pub struct StdoutOutput {
  format: StdoutFormat,
}

impl StdoutOutput {
  pub fn new(format: StdoutFormat) -> Self {
    Self { format }
  }

  pub fn format(&self) -> StdoutFormat {
    self.format
  }

  pub fn format_line(
    &self,
    frame: &SketchFrame,
    result: &RecognitionResult,
  ) -> Result<String, StdoutOutputError> {
    match self.format {
      StdoutFormat::Json => Ok(serde_json::to_string(&FrameRecord::new(frame, result))?),
      StdoutFormat::Text => Ok(text_line(frame, result)),
    }
  }
}

fn text_line(frame: &SketchFrame, result: &RecognitionResult) -> String {
  let origin = frame.origin().unwrap_or("-");
  let (Some(prediction), Some(confidence)) = (result.prediction(), result.confidence()) else {
    return format!(
      "{}: 识别失败: {}",
      origin,
      result.message().unwrap_or("未知错误")
    );
  };

  let mut line = format!("{}: {} ({}%)", origin, prediction, confidence);
  if let Some(category) = result.category() {
    line.push_str(&format!(" [{}]", category));
  }
  if !result.alternatives().is_empty() {
    let alternatives: Vec<String> = result
      .alternatives()
      .iter()
      .map(|alt| format!("{} {:.2}", alt.name, alt.score))
      .collect();
    line.push_str(&format!(" 备选: {}", alternatives.join(", ")));
  }
  if result.is_mock() {
    line.push_str(" (模拟)");
  }
  line
}

impl FromUrlWithScheme for StdoutOutput {
  const SCHEME: &'static str = "stdout";
}

impl FromUrl for StdoutOutput {
  type Error = StdoutOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(StdoutOutputError::SchemeMismatch(url.scheme().to_string()));
    }

    let format = match query_value(url, "format").as_deref() {
      None | Some("text") => StdoutFormat::Text,
      Some("json") => StdoutFormat::Json,
      Some(other) => return Err(StdoutOutputError::UnknownFormat(other.to_string())),
    };
    Ok(StdoutOutput::new(format))
  }
}

impl Render<SketchFrame, RecognitionResult> for StdoutOutput {
  type Error = StdoutOutputError;

  fn render_result(
    &self,
    frame: &SketchFrame,
    result: &RecognitionResult,
  ) -> Result<(), Self::Error> {
    let line = self.format_line(frame, result)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", line)?;
    Ok(())
  }
}
