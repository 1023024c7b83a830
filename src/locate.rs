// 该文件是 Kenali （识别） 项目的一部分。
// src/locate.rs - 检测结果定位
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

//! 结果定位
//!
//! 在检测器的保存目录中找出代表标注结果的文件。目录列表总是先按文件名排序，
//! 选择结果与文件系统的列举顺序无关。
//!
//! - 图片：检测器报告的文件名优先，其次是与暂存文件同名的文件，再次是主干名与
//!   暂存文件公共前缀最长的图片文件，平手时取排序靠前者。
//! - 视频：扩展名为 `mp4` 的文件中，主干名与暂存文件相同者优先，否则取排序第一个。
//!   ultralytics 在 Linux 上把视频结果写成 `.avi`，这类结果会得到 `NotFound`。
//!
//! 找不到结果不是错误，返回 [`Located::NotFound`]。

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  detector::DetectionRun,
  media::{IMAGE_EXTENSIONS, MediaKind},
};

const RESULT_VIDEO_EXTENSION: &str = "mp4";

#[derive(Error, Debug)]
pub enum LocateError {
  #[error("无法读取保存目录 {path}: {source}")]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
}

/// 定位到的标注结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultArtifact {
  pub path: PathBuf,
  pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
  Found(ResultArtifact),
  NotFound { save_dir: PathBuf },
}

impl Located {
  pub fn artifact(&self) -> Option<&ResultArtifact> {
    match self {
      Located::Found(artifact) => Some(artifact),
      Located::NotFound { .. } => None,
    }
  }

  pub fn is_found(&self) -> bool {
    matches!(self, Located::Found(_))
  }
}

/// 保存目录中的普通文件，按文件名排序
fn sorted_files(dir: &Path) -> Result<Vec<(String, PathBuf)>, LocateError> {
  let io_error = |source| LocateError::Io {
    path: dir.to_path_buf(),
    source,
  };

  let mut files = Vec::new();
  for entry in std::fs::read_dir(dir).map_err(io_error)? {
    let entry = entry.map_err(io_error)?;
    if !entry.file_type().map_err(io_error)?.is_file() {
      continue;
    }
    if let Some(name) = entry.file_name().to_str() {
      files.push((name.to_string(), entry.path()));
    }
  }
  files.sort_by(|a, b| a.0.cmp(&b.0));
  Ok(files)
}

fn extension_of(name: &str) -> Option<String> {
  Path::new(name)
    .extension()
    .and_then(|ext| ext.to_str())
    .map(str::to_ascii_lowercase)
}

fn stem_of(name: &str) -> &str {
  Path::new(name)
    .file_stem()
    .and_then(|stem| stem.to_str())
    .unwrap_or(name)
}

fn common_prefix_len(a: &str, b: &str) -> usize {
  a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

fn locate_image(
  run: &DetectionRun,
  staged_name: &str,
  files: &[(String, PathBuf)],
) -> Option<PathBuf> {
  if let Some(name) = &run.output_name {
    if let Some((_, path)) = files.iter().find(|(n, _)| n == name) {
      return Some(path.clone());
    }
    warn!("检测器报告的输出文件 {} 不存在，改为按名称匹配", name);
  }

  if let Some((_, path)) = files.iter().find(|(n, _)| n == staged_name) {
    return Some(path.clone());
  }

  let staged_stem = stem_of(staged_name);
  let mut best: Option<(usize, &PathBuf)> = None;
  for (name, path) in files {
    let is_image = extension_of(name).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));
    if !is_image {
      continue;
    }
    let score = common_prefix_len(stem_of(name), staged_stem);
    // 严格大于，平手时保留排序靠前者
    if score > 0 && best.is_none_or(|(s, _)| score > s) {
      best = Some((score, path));
    }
  }
  best.map(|(_, path)| path.clone())
}

fn locate_video(staged_stem: &str, files: &[(String, PathBuf)]) -> Option<PathBuf> {
  let candidates: Vec<&(String, PathBuf)> = files
    .iter()
    .filter(|(name, _)| extension_of(name).as_deref() == Some(RESULT_VIDEO_EXTENSION))
    .collect();
  if candidates.len() > 1 {
    debug!("保存目录中有 {} 个视频文件", candidates.len());
  }

  candidates
    .iter()
    .find(|(name, _)| stem_of(name) == staged_stem)
    .or_else(|| candidates.first())
    .map(|(_, path)| path.clone())
}

/// 在检测结果目录中定位标注文件
pub fn locate(run: &DetectionRun, staged: &Path, kind: MediaKind) -> Result<Located, LocateError> {
  let files = sorted_files(&run.save_dir)?;
  let staged_name = staged
    .file_name()
    .and_then(|name| name.to_str())
    .unwrap_or_default();

  let found = match kind {
    MediaKind::Image => locate_image(run, staged_name, &files),
    MediaKind::Video => locate_video(stem_of(staged_name), &files),
  };

  Ok(match found {
    Some(path) => {
      debug!("定位到{}结果: {}", kind, path.display());
      Located::Found(ResultArtifact { path, kind })
    }
    None => {
      warn!("保存目录 {} 中未找到{}结果", run.save_dir.display(), kind);
      Located::NotFound {
        save_dir: run.save_dir.clone(),
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"x").unwrap();
    path
  }

  #[test]
  fn image_with_same_name_is_found() {
    let dir = tempfile::tempdir().unwrap();
    let expected = touch(dir.path(), "kenali-abc.jpg");
    touch(dir.path(), "labels.txt");

    let run = DetectionRun::new(dir.path());
    let located = locate(&run, Path::new("/tmp/kenali-abc.jpg"), MediaKind::Image).unwrap();
    assert_eq!(
      located,
      Located::Found(ResultArtifact {
        path: expected,
        kind: MediaKind::Image
      })
    );
  }

  #[test]
  fn reported_output_name_wins() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "kenali-abc.jpg");
    let reported = touch(dir.path(), "annotated.png");

    let run = DetectionRun::new(dir.path()).with_output_name("annotated.png");
    let located = locate(&run, Path::new("/tmp/kenali-abc.jpg"), MediaKind::Image).unwrap();
    assert_eq!(located.artifact().map(|a| a.path.clone()), Some(reported));
  }

  #[test]
  fn image_falls_back_to_longest_common_prefix() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "kenali-zzz.png");
    let expected = touch(dir.path(), "kenali-abc.png");
    touch(dir.path(), "kenali-abd.png");

    let run = DetectionRun::new(dir.path());
    let located = locate(&run, Path::new("/tmp/kenali-abc.jpg"), MediaKind::Image).unwrap();
    assert_eq!(located.artifact().map(|a| a.path.clone()), Some(expected));
  }

  #[test]
  fn image_missing_is_not_found_instead_of_blind_path() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "other.txt");

    let run = DetectionRun::new(dir.path());
    let located = locate(&run, Path::new("/tmp/kenali-abc.jpg"), MediaKind::Image).unwrap();
    assert_eq!(
      located,
      Located::NotFound {
        save_dir: dir.path().to_path_buf()
      }
    );
  }

  #[test]
  fn video_without_mp4_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "kenali-abc.avi");
    std::fs::create_dir(dir.path().join("labels.mp4")).unwrap();

    let run = DetectionRun::new(dir.path());
    let located = locate(&run, Path::new("/tmp/kenali-abc.mp4"), MediaKind::Video).unwrap();
    assert!(!located.is_found());
  }

  #[test]
  fn video_choice_is_sorted_by_name() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "c.mp4");
    let expected = touch(dir.path(), "a.MP4");
    touch(dir.path(), "b.mp4");

    let run = DetectionRun::new(dir.path());
    let located = locate(&run, Path::new("/tmp/kenali-abc.mp4"), MediaKind::Video).unwrap();
    assert_eq!(located.artifact().map(|a| a.path.clone()), Some(expected));
  }

  #[test]
  fn video_with_staged_stem_is_preferred() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "a.mp4");
    let expected = touch(dir.path(), "kenali-abc.mp4");

    let run = DetectionRun::new(dir.path());
    let located = locate(&run, Path::new("/tmp/kenali-abc.avi"), MediaKind::Video).unwrap();
    assert_eq!(located.artifact().map(|a| a.path.clone()), Some(expected));
  }

  #[test]
  fn unreadable_save_dir_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let run = DetectionRun::new(dir.path().join("missing"));
    assert!(matches!(
      locate(&run, Path::new("/tmp/a.jpg"), MediaKind::Image),
      Err(LocateError::Io { .. })
    ));
  }

  #[test]
  fn prefix_length_counts_chars() {
    assert_eq!(common_prefix_len("kenali-abc", "kenali-abd"), 9);
    assert_eq!(common_prefix_len("", "abc"), 0);
  }
}
