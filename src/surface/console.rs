// 该文件是 Kenali （识别） 项目的一部分。
// src/surface/console.rs - 控制台展示
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

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, locate::Located, pipeline::RunReport, surface::Present};

#[derive(Error, Debug)]
pub enum ConsoleSurfaceError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub struct ConsoleSurface;

impl FromUrlWithScheme for ConsoleSurface {
  const SCHEME: &'static str = "console";
}

impl FromUrl for ConsoleSurface {
  type Error = ConsoleSurfaceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ConsoleSurfaceError::SchemeMismatch(url.scheme().to_string()));
    }
    Ok(ConsoleSurface)
  }
}

impl Present for ConsoleSurface {
  type Error = ConsoleSurfaceError;

  fn present(&self, report: &RunReport) -> Result<(), Self::Error> {
    match &report.outcome {
      Located::Found(artifact) => {
        info!(
          "检测完成! {} {} -> {} (耗时 {:.2?})",
          report.kind,
          report.original_name,
          artifact.path.display(),
          report.elapsed
        );
      }
      Located::NotFound { .. } => {
        if let Some(warning) = report.warning() {
          warn!("{}", warning);
        }
      }
    }
    Ok(())
  }
}
