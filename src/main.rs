// 该文件是 Kenali （识别） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use kenali::{
  FromUrl,
  detector::{Progress, UltralyticsCli},
  input::UploadFileInput,
  pipeline::Pipeline,
  stage::ArtifactStager,
  surface::{Present, SurfaceWrapper},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("检测模型: {}", args.model);
  info!("上传文件: {}", args.input);
  for output in &args.output {
    info!("展示方式: {}", output);
  }
  info!("置信度阈值: {}", args.confidence);
  info!("推理尺寸: {}", args.imgsz);

  // 只记录中断状态：检测器据此终止子进程，流程正常返回以清理暂存文件
  let interrupted = Arc::new(AtomicBool::new(false));
  {
    let interrupted = interrupted.clone();
    ctrlc::set_handler(move || {
      warn!("收到中断信号，准备退出...");
      interrupted.store(true, Ordering::SeqCst);
    })?;
  }

  let detector = UltralyticsCli::from_url(&args.model)?.with_interrupt(interrupted);
  let surfaces = args
    .output
    .iter()
    .map(SurfaceWrapper::from_url)
    .collect::<Result<Vec<_>, _>>()?;
  let upload = UploadFileInput::from_url(&args.input)?.read()?;

  let pipeline = Pipeline::new(
    ArtifactStager::new(args.stage_config()),
    detector,
    args.predict_config(),
  );

  let mut last_percent = None;
  let mut report_progress = |progress: Progress| match progress.percent() {
    Some(percent) if last_percent.is_none_or(|last| percent >= last + 5 || percent == 100) => {
      if last_percent != Some(percent) {
        info!("进度: {}% ({} 帧)", percent, progress.frame);
        last_percent = Some(percent);
      }
    }
    Some(_) => {}
    None => info!("已处理 {} 帧", progress.frame),
  };

  let report = pipeline.run(&upload, &mut report_progress)?;
  for surface in &surfaces {
    surface.present(&report)?;
  }

  if let Some(kept) = &report.kept_staged {
    info!("暂存文件保留在: {}", kept.display());
  }
  info!("处理完成!");
  Ok(())
}
