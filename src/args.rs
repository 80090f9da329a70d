// 该文件是 Huahua （画画） 项目的一部分。
// src/args.rs - 命令行参数
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use clap::Parser;
use huahua::{NormalizeMode, normalize::SKETCH_SIZE};
use url::Url;

/// Huahua 简笔画识别参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源
  /// 支持格式:
  /// - 单个图片: image:///path/to/sketch.png
  /// - 图片目录: folder:///path/to/sketches
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 识别服务
  /// 支持格式:
  /// - 简笔画识别: sketch://?seed=42&delay_ms=800&preprocess=full&labels=/path/to/labels.toml
  /// - 模拟识别: mock://?seed=42&delay_ms=500
  #[arg(long, value_name = "RECOGNIZER", default_value = "sketch://")]
  pub recognizer: Url,

  /// 主识别服务失败时使用的备用识别服务
  #[arg(long, value_name = "RECOGNIZER")]
  pub fallback: Option<Url>,

  /// 输出路径
  /// 支持格式:
  /// - 标准输出: stdout: 或 stdout:?format=json
  /// - 图片文件: image:///path/to/out.png
  /// - 目录记录: folder:///path/to/records?always
  #[arg(long, value_name = "OUTPUT", default_value = "stdout:")]
  pub output: Url,

  /// 预处理目标宽度
  #[arg(long, default_value_t = SKETCH_SIZE, value_name = "PIXELS")]
  pub width: u32,

  /// 预处理目标高度
  #[arg(long, default_value_t = SKETCH_SIZE, value_name = "PIXELS")]
  pub height: u32,

  /// 预处理模式 (plain, full-sketch)
  #[arg(long, default_value = "plain", value_name = "MODE")]
  pub mode: NormalizeMode,

  /// 去噪亮度阈值，仅 full-sketch 模式有效
  #[arg(long, value_name = "THRESHOLD")]
  pub threshold: Option<u8>,

  /// 最大处理帧数，不指定表示无限制
  #[arg(long, value_name = "COUNT")]
  pub max_frames: Option<usize>,
}
