// 该文件是 Kenali （识别） 项目的一部分。
// src/surface/copy_file.rs - 复制结果文件
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
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, decoded_path, locate::Located, pipeline::RunReport,
  surface::Present,
};

#[derive(Error, Debug)]
pub enum CopyFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 把定位到的结果复制到指定路径
pub struct CopyFileSurface {
  path: PathBuf,
}

impl FromUrlWithScheme for CopyFileSurface {
  const SCHEME: &'static str = "file";
}

impl FromUrl for CopyFileSurface {
  type Error = CopyFileError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(CopyFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    Ok(CopyFileSurface {
      path: decoded_path(url),
    })
  }
}

impl CopyFileSurface {
  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Present for CopyFileSurface {
  type Error = CopyFileError;

  fn present(&self, report: &RunReport) -> Result<(), Self::Error> {
    let artifact = match &report.outcome {
      Located::Found(artifact) => artifact,
      Located::NotFound { .. } => {
        warn!(
          "没有检测结果可复制到 {}: {}",
          self.path.display(),
          report.warning().unwrap_or_default()
        );
        return Ok(());
      }
    };

    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(&artifact.path, &self.path)?;
    info!("保存检测结果到文件: {}", self.path.display());
    Ok(())
  }
}
