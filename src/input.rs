// 该文件是 Kenali （识别） 项目的一部分。
// src/input.rs - 上传文件输入
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

//! 上传输入
//!
//! # URL 格式
//!
//! - `image:///path/to/photo.png` - 声明为图片
//! - `video:///path/to/clip.avi` - 声明为视频
//! - `file:///path/to/anything.mkv` - 按扩展名推断类型

use std::path::PathBuf;

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, decoded_path,
  media::{MediaError, MediaKind, UploadedArtifact},
};

const IMAGE_INPUT_SCHEME: &str = "image";
const VIDEO_INPUT_SCHEME: &str = "video";
const FILE_INPUT_SCHEME: &str = "file";

#[derive(Error, Debug)]
pub enum InputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无法从扩展名推断媒体类型: {0}")]
  UnknownKind(String),
  #[error("缺少文件名: {0}")]
  MissingFileName(String),
  #[error("媒体错误: {0}")]
  MediaError(#[from] MediaError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 本地文件形式的上传
pub struct UploadFileInput {
  path: PathBuf,
  kind: MediaKind,
}

impl FromUrl for UploadFileInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let path = decoded_path(url);
    let kind = match url.scheme() {
      IMAGE_INPUT_SCHEME => MediaKind::Image,
      VIDEO_INPUT_SCHEME => MediaKind::Video,
      FILE_INPUT_SCHEME => MediaKind::from_path(&path)
        .ok_or_else(|| InputError::UnknownKind(path.display().to_string()))?,
      other => {
        error!("URI 方案不匹配: 期望 image/video/file, 实际 '{}'", other);
        return Err(InputError::SchemeMismatch(other.to_string()));
      }
    };

    Ok(UploadFileInput { path, kind })
  }
}

impl UploadFileInput {
  pub fn kind(&self) -> MediaKind {
    self.kind
  }

  pub fn path(&self) -> &std::path::Path {
    &self.path
  }

  /// 读入整个文件，得到一次上传
  pub fn read(&self) -> Result<UploadedArtifact, InputError> {
    let name = self
      .path
      .file_name()
      .and_then(|name| name.to_str())
      .ok_or_else(|| InputError::MissingFileName(self.path.display().to_string()))?
      .to_string();
    let bytes = std::fs::read(&self.path)?;
    info!(
      "读取上传{}: {} ({} 字节)",
      self.kind,
      self.path.display(),
      bytes.len()
    );
    Ok(UploadedArtifact::new(bytes, self.kind, name)?)
  }
}
