// 该文件是 Kenali （识别） 项目的一部分。
// src/stage.rs - 上传内容暂存
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

//! 暂存模块
//!
//! 把上传内容写入唯一命名的临时文件，交给检测器读取。图片会被解码后重新编码为
//! JPEG，视频按字节原样写入。
//!
//! 暂存文件由 [`StagedFile`] 持有，被销毁时自动删除，除非显式调用
//! [`StagedFile::keep`]。

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::{DynamicImage, codecs::jpeg::JpegEncoder};
use tempfile::{Builder, NamedTempFile, TempPath};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  config::{StageConfig, VideoExtensionPolicy},
  media::{MediaKind, STAGED_IMAGE_EXTENSION, STAGED_VIDEO_EXTENSION, UploadedArtifact},
};

const STAGED_FILE_PREFIX: &str = "kenali-";

#[derive(Error, Debug)]
pub enum StageError {
  #[error("图像解码错误: {0}")]
  Decode(image::ImageError),
  #[error("图像编码错误: {0}")]
  Encode(image::ImageError),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
}

enum StagedPath {
  Temporary(TempPath),
  Kept(PathBuf),
}

/// 暂存后的文件
pub struct StagedFile {
  path: StagedPath,
  kind: MediaKind,
}

impl StagedFile {
  pub fn path(&self) -> &Path {
    match &self.path {
      StagedPath::Temporary(path) => &**path,
      StagedPath::Kept(path) => &**path,
    }
  }

  pub fn kind(&self) -> MediaKind {
    self.kind
  }

  pub fn file_name(&self) -> &str {
    self
      .path()
      .file_name()
      .and_then(|name| name.to_str())
      .unwrap_or_default()
  }

  pub fn stem(&self) -> &str {
    self
      .path()
      .file_stem()
      .and_then(|name| name.to_str())
      .unwrap_or_default()
  }

  /// 取消自动删除，返回持久化后的路径
  pub fn keep(&mut self) -> Result<PathBuf, StageError> {
    if let StagedPath::Temporary(_) = &self.path {
      let placeholder = StagedPath::Kept(PathBuf::new());
      if let StagedPath::Temporary(temp) = std::mem::replace(&mut self.path, placeholder) {
        let kept = temp.keep().map_err(|e| StageError::Io(e.error))?;
        info!("保留暂存文件: {}", kept.display());
        self.path = StagedPath::Kept(kept);
      }
    }
    Ok(self.path().to_path_buf())
  }
}

impl std::fmt::Debug for StagedFile {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StagedFile")
      .field("path", &self.path())
      .field("kind", &self.kind)
      .finish()
  }
}

impl Drop for StagedFile {
  fn drop(&mut self) {
    if let StagedPath::Temporary(path) = &self.path {
      debug!("删除暂存文件: {}", path.display());
    }
  }
}

/// 暂存器
#[derive(Debug, Clone, Default)]
pub struct ArtifactStager {
  config: StageConfig,
}

impl ArtifactStager {
  pub fn new(config: StageConfig) -> Self {
    ArtifactStager { config }
  }

  pub fn config(&self) -> &StageConfig {
    &self.config
  }

  pub fn stage(&self, upload: &UploadedArtifact) -> Result<StagedFile, StageError> {
    let staged = match upload.kind() {
      MediaKind::Image => self.stage_image(upload.bytes())?,
      MediaKind::Video => {
        let extension = self.video_extension(upload);
        self.stage_video(upload.bytes(), &extension)?
      }
    };
    info!(
      "{} {} 已暂存到 {}",
      upload.kind(),
      upload.original_name(),
      staged.path().display()
    );
    Ok(staged)
  }

  fn video_extension(&self, upload: &UploadedArtifact) -> String {
    match self.config.video_extension {
      VideoExtensionPolicy::Normalize => STAGED_VIDEO_EXTENSION.to_string(),
      VideoExtensionPolicy::Preserve => upload
        .extension()
        .filter(|ext| MediaKind::Video.accepts(ext))
        .unwrap_or_else(|| STAGED_VIDEO_EXTENSION.to_string()),
    }
  }

  fn allocate(&self, extension: &str) -> Result<NamedTempFile, StageError> {
    let suffix = format!(".{}", extension);
    let mut builder = Builder::new();
    builder.prefix(STAGED_FILE_PREFIX).suffix(&suffix);
    let file = match &self.config.scratch_dir {
      Some(dir) => {
        std::fs::create_dir_all(dir)?;
        builder.tempfile_in(dir)?
      }
      None => builder.tempfile()?,
    };
    Ok(file)
  }

  fn stage_image(&self, bytes: &[u8]) -> Result<StagedFile, StageError> {
    let image = image::load_from_memory(bytes).map_err(StageError::Decode)?;
    // JPEG 不支持透明通道
    let image = DynamicImage::ImageRgb8(image.to_rgb8());

    let mut file = self.allocate(STAGED_IMAGE_EXTENSION)?;
    {
      let mut writer = BufWriter::new(file.as_file_mut());
      let encoder = JpegEncoder::new_with_quality(&mut writer, self.config.jpeg_quality);
      image.write_with_encoder(encoder).map_err(|e| match e {
        image::ImageError::IoError(io) => StageError::Io(io),
        other => StageError::Encode(other),
      })?;
      writer.flush()?;
    }

    Ok(StagedFile {
      path: StagedPath::Temporary(file.into_temp_path()),
      kind: MediaKind::Image,
    })
  }

  fn stage_video(&self, bytes: &[u8], extension: &str) -> Result<StagedFile, StageError> {
    let mut file = self.allocate(extension)?;
    file.write_all(bytes)?;
    file.flush()?;

    Ok(StagedFile {
      path: StagedPath::Temporary(file.into_temp_path()),
      kind: MediaKind::Video,
    })
  }
}
