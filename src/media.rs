// 该文件是 Kenali （识别） 项目的一部分。
// src/media.rs - 媒体类型与上传内容
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

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// 图片上传允许的扩展名
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
/// 视频上传允许的扩展名
pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mov", "avi", "mkv"];

/// 暂存图片统一使用的扩展名
pub const STAGED_IMAGE_EXTENSION: &str = "jpg";
/// 暂存视频在规范化策略下使用的扩展名
pub const STAGED_VIDEO_EXTENSION: &str = "mp4";

#[derive(Error, Debug)]
pub enum MediaError {
  #[error("不支持的{kind}扩展名: {name}")]
  UnsupportedExtension { kind: MediaKind, name: String },
}

/// 上传媒体的声明类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
  Image,
  Video,
}

impl MediaKind {
  pub fn extensions(&self) -> &'static [&'static str] {
    match self {
      MediaKind::Image => &IMAGE_EXTENSIONS,
      MediaKind::Video => &VIDEO_EXTENSIONS,
    }
  }

  /// 扩展名是否属于该类型允许的上传格式（忽略大小写，可带前导点）
  pub fn accepts(&self, extension: &str) -> bool {
    let extension = extension.trim_start_matches('.').to_ascii_lowercase();
    self.extensions().contains(&extension.as_str())
  }

  pub fn from_extension(extension: &str) -> Option<MediaKind> {
    [MediaKind::Image, MediaKind::Video]
      .into_iter()
      .find(|kind| kind.accepts(extension))
  }

  pub fn from_path(path: &Path) -> Option<MediaKind> {
    path
      .extension()
      .and_then(|ext| ext.to_str())
      .and_then(MediaKind::from_extension)
  }
}

impl fmt::Display for MediaKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MediaKind::Image => write!(f, "图片"),
      MediaKind::Video => write!(f, "视频"),
    }
  }
}

/// 一次上传的原始内容
///
/// 原始文件名只用于推导扩展名和基础名，内容在暂存之后即可丢弃。
#[derive(Debug, Clone)]
pub struct UploadedArtifact {
  bytes: Vec<u8>,
  kind: MediaKind,
  original_name: String,
}

impl UploadedArtifact {
  pub fn new(
    bytes: Vec<u8>,
    kind: MediaKind,
    original_name: impl Into<String>,
  ) -> Result<Self, MediaError> {
    let original_name = original_name.into();
    let accepted = Path::new(&original_name)
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| kind.accepts(ext));
    if !accepted {
      return Err(MediaError::UnsupportedExtension {
        kind,
        name: original_name,
      });
    }

    Ok(UploadedArtifact {
      bytes,
      kind,
      original_name,
    })
  }

  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }

  pub fn kind(&self) -> MediaKind {
    self.kind
  }

  pub fn original_name(&self) -> &str {
    &self.original_name
  }

  /// 原始文件名的扩展名（小写）
  pub fn extension(&self) -> Option<String> {
    Path::new(&self.original_name)
      .extension()
      .and_then(|ext| ext.to_str())
      .map(str::to_ascii_lowercase)
  }
}
