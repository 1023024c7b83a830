// 该文件是 Kenali （识别） 项目的一部分。
// src/surface/json_report.rs - JSON 报告
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, decoded_path,
  media::MediaKind,
  pipeline::RunReport,
  surface::Present,
};

#[derive(Error, Debug)]
pub enum JsonReportError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("序列化错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonReport {
  pub kind: String,
  pub original_name: String,
  pub save_dir: PathBuf,
  pub result: Option<PathBuf>,
  pub warning: Option<String>,
  pub elapsed_ms: u64,
  pub timestamp: String,
}

impl From<&RunReport> for JsonReport {
  fn from(report: &RunReport) -> Self {
    JsonReport {
      kind: match report.kind {
        MediaKind::Image => "image",
        MediaKind::Video => "video",
      }
      .to_string(),
      original_name: report.original_name.clone(),
      save_dir: report.save_dir.clone(),
      result: report.outcome.artifact().map(|a| a.path.clone()),
      warning: report.warning(),
      elapsed_ms: report.elapsed.as_millis() as u64,
      timestamp: chrono::Utc::now().to_rfc3339(),
    }
  }
}

/// 把处理报告写成 JSON 文件
pub struct JsonReportSurface {
  path: PathBuf,
}

impl FromUrlWithScheme for JsonReportSurface {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonReportSurface {
  type Error = JsonReportError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonReportError::SchemeMismatch(url.scheme().to_string()));
    }
    Ok(JsonReportSurface {
      path: decoded_path(url),
    })
  }
}

impl Present for JsonReportSurface {
  type Error = JsonReportError;

  fn present(&self, report: &RunReport) -> Result<(), Self::Error> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&JsonReport::from(report))?;
    std::fs::write(&self.path, json)?;
    info!("写入 JSON 报告: {}", self.path.display());
    Ok(())
  }
}
