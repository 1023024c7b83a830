// 该文件是 Kenali （识别） 项目的一部分。
// src/surface.rs - 结果展示
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
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, pipeline::RunReport};

/// 展示一次处理的结果
///
/// 未找到结果时实现者应给出提示并返回 `Ok`，而不是报错。
pub trait Present: Sized {
  type Error;
  fn present(&self, report: &RunReport) -> Result<(), Self::Error>;
}

mod console;
pub use self::console::{ConsoleSurface, ConsoleSurfaceError};

mod copy_file;
pub use self::copy_file::{CopyFileError, CopyFileSurface};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordError, DirectoryRecordSurface};

#[cfg(feature = "json_report")]
mod json_report;
#[cfg(feature = "json_report")]
pub use self::json_report::{JsonReport, JsonReportError, JsonReportSurface};

#[derive(Error, Debug)]
pub enum SurfaceError {
  #[error("控制台输出错误: {0}")]
  ConsoleSurfaceError(#[from] ConsoleSurfaceError),
  #[error("复制结果文件错误: {0}")]
  CopyFileError(#[from] CopyFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordError(#[from] DirectoryRecordError),
  #[cfg(feature = "json_report")]
  #[error("JSON 报告输出错误: {0}")]
  JsonReportError(#[from] JsonReportError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum SurfaceWrapper {
  Console(ConsoleSurface),
  CopyFile(CopyFileSurface),
  #[cfg(feature = "directory_record")]
  DirectoryRecord(DirectoryRecordSurface),
  #[cfg(feature = "json_report")]
  JsonReport(JsonReportSurface),
}

impl FromUrl for SurfaceWrapper {
  type Error = SurfaceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ConsoleSurface::SCHEME => Ok(SurfaceWrapper::Console(ConsoleSurface::from_url(url)?)),
      CopyFileSurface::SCHEME => Ok(SurfaceWrapper::CopyFile(CopyFileSurface::from_url(url)?)),
      #[cfg(feature = "directory_record")]
      DirectoryRecordSurface::SCHEME => Ok(SurfaceWrapper::DirectoryRecord(
        DirectoryRecordSurface::from_url(url)?,
      )),
      #[cfg(feature = "json_report")]
      JsonReportSurface::SCHEME => Ok(SurfaceWrapper::JsonReport(JsonReportSurface::from_url(
        url,
      )?)),
      other => Err(SurfaceError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Present for SurfaceWrapper {
  type Error = SurfaceError;

  fn present(&self, report: &RunReport) -> Result<(), Self::Error> {
    match self {
      SurfaceWrapper::Console(surface) => surface.present(report).map_err(SurfaceError::from),
      SurfaceWrapper::CopyFile(surface) => surface.present(report).map_err(SurfaceError::from),
      #[cfg(feature = "directory_record")]
      SurfaceWrapper::DirectoryRecord(surface) => {
        surface.present(report).map_err(SurfaceError::from)
      }
      #[cfg(feature = "json_report")]
      SurfaceWrapper::JsonReport(surface) => surface.present(report).map_err(SurfaceError::from),
    }
  }
}
