// 该文件是 Kenali （识别） 项目的一部分。
// src/pipeline.rs - 上传到结果的处理流程
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
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::{
  config::{ConfigError, PredictConfig},
  detector::{Detector, InferenceError, Progress},
  locate::{LocateError, Located, locate},
  media::{MediaKind, UploadedArtifact},
  stage::{ArtifactStager, StageError},
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("上传内容无法解码: {0}")]
  Decode(image::ImageError),
  #[error("I/O 错误: {0}")]
  Io(std::io::Error),
  #[error("推理失败: {0}")]
  Inference(#[from] InferenceError),
}

impl From<StageError> for PipelineError {
  fn from(err: StageError) -> Self {
    match err {
      StageError::Decode(e) | StageError::Encode(e) => PipelineError::Decode(e),
      StageError::Io(e) => PipelineError::Io(e),
    }
  }
}

impl From<LocateError> for PipelineError {
  fn from(err: LocateError) -> Self {
    match err {
      LocateError::Io { source, .. } => PipelineError::Io(source),
    }
  }
}

/// 一次处理的报告
#[derive(Debug, Clone)]
pub struct RunReport {
  pub kind: MediaKind,
  pub original_name: String,
  pub save_dir: PathBuf,
  /// 保留下来的暂存文件（仅在配置要求保留时存在）
  pub kept_staged: Option<PathBuf>,
  pub outcome: Located,
  pub elapsed: Duration,
}

impl RunReport {
  /// 未找到结果时给展示层的提示
  pub fn warning(&self) -> Option<String> {
    match &self.outcome {
      Located::Found(_) => None,
      Located::NotFound { save_dir } => Some(format!(
        "未在 {} 中找到{}检测结果",
        save_dir.display(),
        self.kind
      )),
    }
  }
}

/// 暂存、推理、定位三步流程
pub struct Pipeline<D> {
  stager: ArtifactStager,
  detector: D,
  predict: PredictConfig,
}

impl<D: Detector> Pipeline<D> {
  pub fn new(stager: ArtifactStager, detector: D, predict: PredictConfig) -> Self {
    Pipeline {
      stager,
      detector,
      predict,
    }
  }

  pub fn predict_config(&self) -> &PredictConfig {
    &self.predict
  }

  pub fn run(
    &self,
    upload: &UploadedArtifact,
    progress: &mut dyn FnMut(Progress),
  ) -> Result<RunReport, PipelineError> {
    self.predict.validate()?;
    self.stager.config().validate()?;

    let now = Instant::now();
    let mut staged = self.stager.stage(upload)?;

    info!("开始检测 {} ...", upload.original_name());
    let run = self
      .detector
      .predict(staged.path(), &self.predict, progress)?;
    info!("检测完成，耗时: {:.2?}", now.elapsed());

    let outcome = locate(&run, staged.path(), upload.kind())?;
    if !outcome.is_found() {
      warn!("{} 没有可展示的检测结果", upload.original_name());
    }

    let kept_staged = if self.stager.config().keep_staged {
      Some(staged.keep()?)
    } else {
      None
    };

    Ok(RunReport {
      kind: upload.kind(),
      original_name: upload.original_name().to_string(),
      save_dir: run.save_dir,
      kept_staged,
      outcome,
      elapsed: now.elapsed(),
    })
  }
}
