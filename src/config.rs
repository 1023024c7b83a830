// 该文件是 Kenali （识别） 项目的一部分。
// src/config.rs - 推理与暂存配置
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
use std::str::FromStr;

use thiserror::Error;

/// 默认置信度阈值
pub const DEFAULT_CONFIDENCE: f32 = 0.5;
/// 默认推理尺寸（像素）
pub const DEFAULT_IMAGE_SIZE: u32 = 640;
/// 暂存图片的默认 JPEG 质量
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

const IMAGE_SIZE_STRIDE: u32 = 32;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("置信度阈值必须在 0.0 - 1.0 之间: {0}")]
  InvalidConfidence(f32),
  #[error("推理尺寸必须为 32 的正整数倍: {0}")]
  InvalidImageSize(u32),
  #[error("JPEG 质量必须在 1 - 100 之间: {0}")]
  InvalidJpegQuality(u8),
  #[error("未知的视频扩展名策略: {0}")]
  UnknownVideoExtensionPolicy(String),
}

/// 检测器调用参数
///
/// 对应检测引擎 `predict(path, save, imgsz, conf)` 的三个参数。
#[derive(Debug, Clone, PartialEq)]
pub struct PredictConfig {
  /// 是否让检测器把标注结果写入保存目录
  pub save: bool,
  /// 推理尺寸
  pub imgsz: u32,
  /// 置信度阈值
  pub conf: f32,
}

impl Default for PredictConfig {
  fn default() -> Self {
    PredictConfig {
      save: true,
      imgsz: DEFAULT_IMAGE_SIZE,
      conf: DEFAULT_CONFIDENCE,
    }
  }
}

impl PredictConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&self.conf) {
      return Err(ConfigError::InvalidConfidence(self.conf));
    }
    if self.imgsz == 0 || self.imgsz % IMAGE_SIZE_STRIDE != 0 {
      return Err(ConfigError::InvalidImageSize(self.imgsz));
    }
    Ok(())
  }
}

/// 暂存视频时扩展名的处理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VideoExtensionPolicy {
  /// 不论原始容器格式，一律使用 `.mp4`
  #[default]
  Normalize,
  /// 保留上传文件的扩展名（需为允许的视频扩展名，否则回落到 `.mp4`）
  Preserve,
}

impl FromStr for VideoExtensionPolicy {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "normalize" => Ok(VideoExtensionPolicy::Normalize),
      "preserve" => Ok(VideoExtensionPolicy::Preserve),
      other => Err(ConfigError::UnknownVideoExtensionPolicy(other.to_string())),
    }
  }
}

/// 暂存配置
#[derive(Debug, Clone, PartialEq)]
pub struct StageConfig {
  /// 暂存目录，`None` 表示系统临时目录
  pub scratch_dir: Option<PathBuf>,
  pub video_extension: VideoExtensionPolicy,
  pub jpeg_quality: u8,
  /// 推理结束后保留暂存文件
  pub keep_staged: bool,
}

impl Default for StageConfig {
  fn default() -> Self {
    StageConfig {
      scratch_dir: None,
      video_extension: VideoExtensionPolicy::default(),
      jpeg_quality: DEFAULT_JPEG_QUALITY,
      keep_staged: false,
    }
  }
}

impl StageConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(1..=100).contains(&self.jpeg_quality) {
      return Err(ConfigError::InvalidJpegQuality(self.jpeg_quality));
    }
    Ok(())
  }
}
