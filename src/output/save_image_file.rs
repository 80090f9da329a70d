// 该文件是 Huahua （画画） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件输出
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

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::SketchFrame,
  output::{FrameRecord, Render},
  recognizer::RecognitionResult,
};

/// 将预处理后的图像写入固定路径，并在旁边写一份同名 `.json` 识别结果
pub struct SaveImageFileOutput {
  path: PathBuf,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: PathBuf::from(uri.path()),
    })
  }
}

impl SaveImageFileOutput {
  pub fn sidecar_path(&self) -> PathBuf {
    self.path.with_extension("json")
  }

  fn save_image(&self, frame: &SketchFrame) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(SaveImageFileError::IoError)?;
    }

    std::fs::write(&self.path, frame).map_err(SaveImageFileError::IoError)?;

    info!("保存图像到文件: {}", self.path.display());

    Ok(())
  }

  fn save_record(
    &self,
    frame: &SketchFrame,
    result: &RecognitionResult,
  ) -> Result<(), SaveImageFileError> {
    let record = serde_json::to_vec_pretty(&FrameRecord::new(frame, result))
      .map_err(SaveImageFileError::JsonError)?;
    std::fs::write(self.sidecar_path(), record).map_err(SaveImageFileError::IoError)
  }
}

impl Render<SketchFrame, RecognitionResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(
    &self,
    frame: &SketchFrame,
    result: &RecognitionResult,
  ) -> Result<(), Self::Error> {
    self.save_image(frame)?;
    self.save_record(frame, result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn writes_image_and_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("out.png");
    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();
    assert_eq!(output.sidecar_path(), dir.path().join("nested").join("out.json"));

    let frame = SketchFrame::from(b"png bytes".to_vec()).with_origin("in.png");
    let result = RecognitionResult::success("house", 66).with_category("objects");
    output.render_result(&frame, &result).unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"png bytes");
    let sidecar: serde_json::Value =
      serde_json::from_slice(&std::fs::read(output.sidecar_path()).unwrap()).unwrap();
    assert_eq!(sidecar["prediction"], "house");
    assert_eq!(sidecar["origin"], "in.png");
  }

  #[test]
  fn rejects_other_scheme() {
    let url = Url::parse("folder:///tmp/out").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }
}
