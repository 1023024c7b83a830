// 该文件是 Kenali （识别） 项目的一部分。
// src/detector.rs - 检测器
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

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::PredictConfig;

#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("无法启动检测器 {program}: {source}")]
  Spawn {
    program: String,
    source: std::io::Error,
  },
  #[error("检测器退出异常 ({status}): {stderr}")]
  Failed { status: String, stderr: String },
  #[error("检测器未生成保存目录: {0}")]
  MissingSaveDir(PathBuf),
  #[error("检测被中断")]
  Interrupted,
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
}

/// 一次检测运行的结果
///
/// 检测器把标注后的文件写入 `save_dir`，该目录在 `predict` 成功返回后必定存在。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionRun {
  pub save_dir: PathBuf,
  /// 检测器明确报告的输出文件名
  pub output_name: Option<String>,
}

impl DetectionRun {
  pub fn new(save_dir: impl Into<PathBuf>) -> Self {
    DetectionRun {
      save_dir: save_dir.into(),
      output_name: None,
    }
  }

  pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
    self.output_name = Some(name.into());
    self
  }
}

/// 检测引擎报告的真实进度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
  pub frame: u64,
  pub total: Option<u64>,
}

impl Progress {
  pub fn percent(&self) -> Option<u8> {
    self
      .total
      .filter(|total| *total > 0)
      .map(|total| ((self.frame.min(total) * 100) / total) as u8)
  }
}

pub trait Detector {
  fn predict(
    &self,
    input: &Path,
    config: &PredictConfig,
    progress: &mut dyn FnMut(Progress),
  ) -> Result<DetectionRun, InferenceError>;
}

impl<D: Detector + ?Sized> Detector for &D {
  fn predict(
    &self,
    input: &Path,
    config: &PredictConfig,
    progress: &mut dyn FnMut(Progress),
  ) -> Result<DetectionRun, InferenceError> {
    (**self).predict(input, config, progress)
  }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
  fn predict(
    &self,
    input: &Path,
    config: &PredictConfig,
    progress: &mut dyn FnMut(Progress),
  ) -> Result<DetectionRun, InferenceError> {
    (**self).predict(input, config, progress)
  }
}

mod ultralytics;
pub use self::ultralytics::{UltralyticsCli, UltralyticsCliError, parse_progress};
