// 该文件是 Huahua （画画） 项目的一部分。
// src/bin/repeatshot.rs - 重复识别同一张图像，统计结果分布
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use url::Url;

use huahua::{
  FromUrl,
  input::InputWrapper,
  output::OutputWrapper,
  recognizer::RecognizerWrapper,
  task::{RepeatShotTask, Task},
};
use tracing::info;

/// Huahua 重复识别参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 识别服务
  #[arg(long, value_name = "RECOGNIZER", default_value = "sketch://")]
  pub recognizer: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT", default_value = "stdout:")]
  pub output: Url,
  /// 重复次数
  #[arg(long, default_value_t = 1000, value_name = "COUNT")]
  pub times: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("识别服务: {}", args.recognizer);
  info!("输出路径: {}", args.output);
  info!("重复次数: {}", args.times);

  let input = InputWrapper::from_url(&args.input)?;
  let recognizer = RecognizerWrapper::from_url(&args.recognizer)?;
  let output = OutputWrapper::from_url(&args.output)?;

  RepeatShotTask::default()
    .with_times(args.times)
    .run_task(input, recognizer, output)?;

  Ok(())
}
