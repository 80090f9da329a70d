// 该文件是 Huahua （画画） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use huahua::{
  FromUrl, Normalizer, Recognizer,
  input::InputWrapper,
  output::OutputWrapper,
  recognizer::{FallbackRecognizer, RecognizerWrapper},
  task::{ContinuousTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("输入来源: {}", args.input);
  info!("识别服务: {}", args.recognizer);
  if let Some(fallback) = &args.fallback {
    info!("备用识别服务: {}", fallback);
  }
  info!("输出路径: {}", args.output);
  info!("预处理: {}x{} ({})", args.width, args.height, args.mode);

  let mut normalizer = Normalizer::new(args.width, args.height, args.mode);
  if let Some(threshold) = args.threshold {
    normalizer = normalizer.with_threshold(threshold);
  }

  let input = InputWrapper::from_url(&args.input)?;
  let primary = RecognizerWrapper::from_url(&args.recognizer)?;
  let recognizer: Box<dyn Recognizer> = match &args.fallback {
    Some(url) => Box::new(FallbackRecognizer::new(
      primary,
      RecognizerWrapper::from_url(url)?,
    )),
    None => Box::new(primary),
  };
  let output = OutputWrapper::from_url(&args.output)?;

  ContinuousTask::default()
    .with_frame_number(args.max_frames)
    .with_interrupt(true)
    .run_task(normalizer.normalize_iter(input), recognizer, output)?;

  Ok(())
}
