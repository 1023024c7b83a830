// 该文件是 Kenali （识别） 项目的一部分。
// src/surface/directory_record.rs - 目录记录展示
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
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{DateTime, Datelike, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  FromUrl, FromUrlWithScheme, decoded_path, locate::Located, pipeline::RunReport,
  surface::Present,
};

const MISSING_RECORD_EXTENSION: &str = "missing.json";

#[derive(Error, Debug)]
pub enum DirectoryRecordError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 按日期归档检测结果
///
/// 结果被复制到 `<dir>/YYYY/MM/DD/HH-MM-SS-XXXX.<ext>`。带 `always` 参数时，
/// 未找到结果也会留下一份 `.missing.json` 标记，记录原始文件名、保存目录与警告。
pub struct DirectoryRecordSurface {
  directory: PathBuf,
  record_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordSurface {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordSurface {
  type Error = DirectoryRecordError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordSurface {
      directory: decoded_path(uri),
      record_counter: AtomicU16::new(0),
      always,
    })
  }
}

impl DirectoryRecordSurface {
  fn record_id(&self) -> u16 {
    self.record_counter.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
  }

  fn record_path(
    &self,
    now: DateTime<Utc>,
    extension: &str,
  ) -> Result<PathBuf, DirectoryRecordError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.{}",
      now.format("%H-%M-%S"),
      self.record_id(),
      extension
    )))
  }
}

impl Present for DirectoryRecordSurface {
  type Error = DirectoryRecordError;

  fn present(&self, report: &RunReport) -> Result<(), Self::Error> {
    let now = Utc::now();
    match &report.outcome {
      Located::Found(artifact) => {
        let extension = artifact
          .path
          .extension()
          .and_then(|ext| ext.to_str())
          .unwrap_or("bin");
        let path = self.record_path(now, extension)?;
        std::fs::copy(&artifact.path, &path)?;
        info!("记录检测结果: {}", path.display());
      }
      Located::NotFound { save_dir } => {
        let warning = report.warning().unwrap_or_default();
        warn!("{}", warning);
        if self.always {
          let path = self.record_path(now, MISSING_RECORD_EXTENSION)?;
          let marker = serde_json::json!({
            "original_name": report.original_name,
            "save_dir": save_dir,
            "result": null,
            "warning": warning,
          });
          std::fs::write(&path, serde_json::to_string_pretty(&marker)?)?;
          info!("记录缺失结果: {}", path.display());
        }
      }
    }
    Ok(())
  }
}
