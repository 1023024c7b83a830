// 该文件是 Kenali （识别） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;
use url::Url;

use kenali::config::{
  DEFAULT_CONFIDENCE, DEFAULT_IMAGE_SIZE, DEFAULT_JPEG_QUALITY, PredictConfig, StageConfig,
  VideoExtensionPolicy,
};

/// Kenali 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测模型
  /// 支持格式:
  /// - yolo://yolov8n.pt
  /// - yolo:///path/to/best.pt?bin=yolo&project=runs/detect
  #[arg(long, value_name = "MODEL", default_value = "yolo://yolov8n.pt")]
  pub model: Url,

  /// 上传文件
  /// 支持格式:
  /// - 图片: image:///path/to/a.jpg (*.jpg, *.jpeg, *.png)
  /// - 视频: video:///path/to/a.mp4 (*.mp4, *.mov, *.avi, *.mkv)
  /// - 按扩展名推断: file:///path/to/a.png
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 结果展示方式，可重复指定
  /// 支持格式:
  /// - console://
  /// - file:///path/to/result.jpg
  /// - folder:///path/to/records[?always]
  /// - json:///path/to/report.json
  #[arg(long, value_name = "OUTPUT", default_value = "console://")]
  pub output: Vec<Url>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// 推理尺寸（32 的倍数）
  #[arg(long, default_value_t = DEFAULT_IMAGE_SIZE, value_name = "PIXELS")]
  pub imgsz: u32,

  /// 不让检测器保存标注结果
  #[arg(long)]
  pub no_save: bool,

  /// 暂存视频的扩展名策略: normalize（统一为 .mp4）或 preserve（保留原扩展名）
  #[arg(long, default_value = "normalize", value_name = "POLICY")]
  pub video_extension: VideoExtensionPolicy,

  /// 暂存目录，默认为系统临时目录
  #[arg(long, value_name = "DIR")]
  pub scratch_dir: Option<PathBuf>,

  /// 暂存图片的 JPEG 质量 (1 - 100)
  #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, value_name = "QUALITY")]
  pub jpeg_quality: u8,

  /// 推理结束后保留暂存文件
  #[arg(long)]
  pub keep_staged: bool,
}

impl Args {
  pub fn predict_config(&self) -> PredictConfig {
    PredictConfig {
      save: !self.no_save,
      imgsz: self.imgsz,
      conf: self.confidence,
    }
  }

  pub fn stage_config(&self) -> StageConfig {
    StageConfig {
      scratch_dir: self.scratch_dir.clone(),
      video_extension: self.video_extension,
      jpeg_quality: self.jpeg_quality,
      keep_staged: self.keep_staged,
    }
  }
}
