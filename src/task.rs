// 该文件是 Huahua （画画） 项目的一部分。
// src/task.rs - 识别任务
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
  collections::{BTreeMap, BTreeSet},
  thread,
  time::{Duration, Instant},
};
use tracing::{info, warn};

use crate::{
  frame::SketchFrame,
  output::Render,
  recognizer::{RecognitionResult, Recognizer},
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<RE, I, M, O> Task<I, M, O> for OneShotTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = SketchFrame>,
  M: Recognizer,
  O: Render<SketchFrame, RecognitionResult, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始识别...");
    let now = Instant::now();
    let result = model.recognize(frame.as_ref());
    let elapsed = now.elapsed();
    info!("识别完成，耗时: {:.2?}", elapsed);
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 多次识别的统计
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RepeatShotSummary {
  pub total: usize,
  pub failures: usize,
  pub predictions: BTreeSet<String>,
  pub categories: BTreeMap<String, usize>,
  pub mean_confidence: Option<f32>,
}

impl RepeatShotSummary {
  pub fn from_results<'a>(results: impl IntoIterator<Item = &'a RecognitionResult>) -> Self {
    let mut summary = RepeatShotSummary::default();
    let mut confidence_sum = 0u64;
    let mut confidence_count = 0u64;

    for result in results {
      summary.total += 1;
      if !result.is_success() {
        summary.failures += 1;
        continue;
      }
      if let Some(prediction) = result.prediction() {
        summary.predictions.insert(prediction.to_string());
      }
      if let Some(category) = result.category() {
        *summary.categories.entry(category.to_string()).or_default() += 1;
      }
      if let Some(confidence) = result.confidence() {
        confidence_sum += confidence as u64;
        confidence_count += 1;
      }
    }

    if confidence_count > 0 {
      summary.mean_confidence = Some(confidence_sum as f32 / confidence_count as f32);
    }
    summary
  }
}

/// 对同一帧重复识别，统计结果分布与耗时
pub struct RepeatShotTask {
  times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { times: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_times(mut self, times: usize) -> Self {
    self.times = times;
    self
  }

  pub fn run<I, M, O, RE>(
    self,
    mut input: I,
    model: M,
    output: O,
  ) -> Result<RepeatShotSummary, anyhow::Error>
  where
    RE: std::error::Error + Sync + Send + 'static,
    I: Iterator<Item = SketchFrame>,
    M: Recognizer,
    O: Render<SketchFrame, RecognitionResult, Error = RE>,
  {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始识别...");
    let mut times = Vec::with_capacity(self.times);
    let mut results = Vec::with_capacity(self.times);
    for i in 0..self.times {
      let now = Instant::now();
      let result = model.recognize(frame.as_ref());
      let elapsed = now.elapsed();
      info!("({})识别完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      times.push(elapsed);
      results.push(result);
    }

    let summary = RepeatShotSummary::from_results(&results);
    if !times.is_empty() {
      warn!(
        "平均识别时间: {:.2?}",
        times.iter().sum::<Duration>() / times.len() as u32
      );
    }
    warn!(
      "共识别 {} 次，失败 {} 次，不同预测 {} 个",
      summary.total,
      summary.failures,
      summary.predictions.len()
    );
    for (category, count) in &summary.categories {
      warn!("类别 {}: {} 次", category, count);
    }
    if let Some(mean) = summary.mean_confidence {
      warn!("平均置信度: {:.1}%", mean);
    }

    Ok(summary)
  }
}

impl<RE, I, M, O> Task<I, M, O> for RepeatShotTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = SketchFrame>,
  M: Recognizer,
  O: Render<SketchFrame, RecognitionResult, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    self.run(input, model, output).map(|_| ())
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 安装 Ctrl-C 处理，收到信号后在两帧之间退出
  pub fn with_interrupt(mut self, handle_interrupt: bool) -> Self {
    self.handle_interrupt = handle_interrupt;
    self
  }
}

impl<RE, I, M, O> Task<I, M, O> for ContinuousTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = SketchFrame>,
  M: Recognizer,
  O: Render<SketchFrame, RecognitionResult, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    if self.handle_interrupt {
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        let _ = tx.send(());
        thread::spawn(|| {
          thread::sleep(Duration::from_secs(30));
          warn!("强制退出程序");
          std::process::exit(1);
        });
      })?;
    }

    let mut frame_index = 0usize;
    let mut now = Instant::now();
    for frame in input {
      frame_index = frame_index.wrapping_add(1);
      info!(
        "处理第 {} 帧图像 ({})",
        frame_index,
        frame.origin().unwrap_or("-")
      );
      let result = model.recognize(frame.as_ref());
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      now = Instant::now();
      info!("识别完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共处理 {} 帧", frame_index);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{recognizer::SketchRecognizer, taxonomy::Taxonomy};
  use std::{cell::RefCell, convert::Infallible};

  #[derive(Default)]
  struct Collect {
    seen: RefCell<Vec<(Option<String>, RecognitionResult)>>,
  }

  impl Render<SketchFrame, RecognitionResult> for &Collect {
    type Error = Infallible;

    fn render_result(
      &self,
      frame: &SketchFrame,
      result: &RecognitionResult,
    ) -> Result<(), Self::Error> {
      self
        .seen
        .borrow_mut()
        .push((frame.origin().map(str::to_string), result.clone()));
      Ok(())
    }
  }

  fn frames(n: usize) -> impl Iterator<Item = SketchFrame> {
    (0..n).map(|i| SketchFrame::from(vec![i as u8]).with_origin(format!("{}.png", i)))
  }

  fn recognizer() -> SketchRecognizer {
    SketchRecognizer::with_seed(Taxonomy::builtin(), 11).with_preprocess(None)
  }

  #[test]
  fn one_shot_renders_first_frame() {
    let sink = Collect::default();
    OneShotTask.run_task(frames(3), recognizer(), &sink).unwrap();
    let seen = sink.seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.as_deref(), Some("0.png"));
    assert!(seen[0].1.is_success());
  }

  #[test]
  fn one_shot_without_input_fails() {
    let sink = Collect::default();
    assert!(OneShotTask.run_task(frames(0), recognizer(), &sink).is_err());
  }

  #[test]
  fn continuous_respects_frame_limit() {
    let sink = Collect::default();
    ContinuousTask::default()
      .with_frame_number(Some(2))
      .run_task(frames(5), recognizer(), &sink)
      .unwrap();
    assert_eq!(sink.seen.borrow().len(), 2);

    let sink = Collect::default();
    ContinuousTask::default()
      .run_task(frames(5), recognizer(), &sink)
      .unwrap();
    let origins: Vec<_> = sink.seen.borrow().iter().map(|(o, _)| o.clone()).collect();
    assert_eq!(origins.len(), 5);
    assert_eq!(origins[4].as_deref(), Some("4.png"));
  }

  #[test]
  fn repeat_shot_summarizes_results() {
    let sink = Collect::default();
    let summary = RepeatShotTask::default()
      .with_times(200)
      .run(frames(1), recognizer(), &sink)
      .unwrap();
    assert_eq!(summary.total, 200);
    assert_eq!(summary.failures, 0);
    assert!(summary.predictions.len() > 1);
    assert_eq!(summary.categories.values().sum::<usize>(), 200);
    let mean = summary.mean_confidence.unwrap();
    assert!((45.0..=84.0).contains(&mean));
    assert_eq!(sink.seen.borrow().len(), 200);
  }

  #[test]
  fn summary_counts_failures() {
    let results = vec![
      RecognitionResult::success("cat", 60).with_category("animals"),
      RecognitionResult::failure("超时"),
      RecognitionResult::success("dog", 80).with_category("animals"),
    ];
    let summary = RepeatShotSummary::from_results(&results);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.categories.get("animals"), Some(&2));
    assert_eq!(summary.mean_confidence, Some(70.0));
  }
}
