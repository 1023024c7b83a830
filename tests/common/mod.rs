// 该文件是 Kenali （识别） 项目的一部分。
// tests/common/mod.rs - 测试用桩检测器
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

#![allow(dead_code)]

use std::cell::RefCell;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage};

use kenali::{
  config::PredictConfig,
  detector::{DetectionRun, Detector, InferenceError, Progress},
};

/// 桩检测器写入保存目录的内容
pub enum StubOutput {
  /// 复制输入文件，文件名与输入相同
  SameName,
  /// 写入给定名称的文件
  Named(Vec<String>),
  /// 什么都不写
  Nothing,
  /// 推理失败
  Fail,
}

pub struct StubDetector {
  pub runs_root: PathBuf,
  pub output: StubOutput,
  pub frames: u64,
  pub seen_inputs: RefCell<Vec<PathBuf>>,
}

impl StubDetector {
  pub fn new(runs_root: &Path, output: StubOutput) -> Self {
    StubDetector {
      runs_root: runs_root.to_path_buf(),
      output,
      frames: 0,
      seen_inputs: RefCell::new(Vec::new()),
    }
  }

  pub fn with_frames(mut self, frames: u64) -> Self {
    self.frames = frames;
    self
  }
}

impl Detector for StubDetector {
  fn predict(
    &self,
    input: &Path,
    _config: &PredictConfig,
    progress: &mut dyn FnMut(Progress),
  ) -> Result<DetectionRun, InferenceError> {
    assert!(input.exists(), "staged input must exist during inference");
    self.seen_inputs.borrow_mut().push(input.to_path_buf());

    if let StubOutput::Fail = self.output {
      return Err(InferenceError::Failed {
        status: "exit status: 1".to_string(),
        stderr: "cannot decode media".to_string(),
      });
    }

    let runs = self.seen_inputs.borrow().len();
    let save_dir = self.runs_root.join(format!("predict{}", runs));
    std::fs::create_dir_all(&save_dir)?;

    for frame in 1..=self.frames {
      progress(Progress {
        frame,
        total: Some(self.frames),
      });
    }

    match &self.output {
      StubOutput::SameName => {
        let name = input.file_name().expect("staged file has a name");
        std::fs::copy(input, save_dir.join(name))?;
      }
      StubOutput::Named(names) => {
        for name in names {
          std::fs::write(save_dir.join(name), b"annotated")?;
        }
      }
      StubOutput::Nothing | StubOutput::Fail => {}
    }

    Ok(DetectionRun::new(save_dir))
  }
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
  let mut bytes = Vec::new();
  RgbImage::from_pixel(width, height, Rgb([0, 128, 255]))
    .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
    .expect("encode jpeg");
  bytes
}
