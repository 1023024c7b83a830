// 该文件是 Kenali （识别） 项目的一部分。
// src/detector/ultralytics.rs - 基于 yolo 命令行的检测器
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

//! Ultralytics 检测器
//!
//! 通过 `yolo predict` 子进程完成推理，本模块只负责组装参数、转发进度和确认
//! 保存目录。
//!
//! # URL 格式
//!
//! - `yolo://yolov8n.pt` - 使用模型名称（由 ultralytics 自行下载）
//! - `yolo:///path/to/best.pt` - 使用本地模型文件
//! - `yolo:///path/to/best.pt?bin=/opt/venv/bin/yolo&project=/var/runs` - 指定可执行文件与输出根目录
//!
//! # 依赖
//!
//! 此模块需要系统安装 ultralytics 提供的 `yolo` 命令行工具。
//!
//! # 视频结果
//!
//! 定位器只接受 `.mp4` 视频结果。ultralytics 只在 macOS 上写出 `.mp4`，在 Linux
//! 上写出 MJPG 编码的 `.avi`（Windows 上同为 `.avi`），此时视频结果会被报告为
//! 未找到。

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::PredictConfig,
  decoded_path,
  detector::{DetectionRun, Detector, InferenceError, Progress},
};

const DEFAULT_PROGRAM: &str = "yolo";
const DEFAULT_PROJECT: &str = "runs/detect";
const RUN_NAME_PREFIX: &str = "kenali-";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum UltralyticsCliError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("缺少模型路径")]
  MissingModel,
}

pub struct UltralyticsCli {
  program: String,
  model: String,
  project: PathBuf,
  interrupted: Option<Arc<AtomicBool>>,
}

impl FromUrlWithScheme for UltralyticsCli {
  const SCHEME: &'static str = "yolo";
}

impl FromUrl for UltralyticsCli {
  type Error = UltralyticsCliError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(UltralyticsCliError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let model = match url.host_str().filter(|host| !host.is_empty()) {
      Some(host) => {
        let rest = decoded_path(url);
        let rest = rest.to_string_lossy();
        let host = urlencoding::decode(host)
          .map(|h| h.into_owned())
          .unwrap_or_else(|_| host.to_string());
        format!("{}{}", host, rest)
      }
      None => decoded_path(url).to_string_lossy().into_owned(),
    };
    if model.is_empty() || model == "/" {
      return Err(UltralyticsCliError::MissingModel);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();

    Ok(UltralyticsCli {
      program: query
        .get("bin")
        .cloned()
        .unwrap_or_else(|| DEFAULT_PROGRAM.to_string()),
      model,
      project: query
        .get("project")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PROJECT)),
      interrupted: None,
    })
  }
}

impl UltralyticsCli {
  pub fn model(&self) -> &str {
    &self.model
  }

  pub fn project(&self) -> &Path {
    &self.project
  }

  /// 绑定中断标志
  ///
  /// 标志被置位后不再启动检测器；正在运行的检测器会被终止，返回
  /// [`InferenceError::Interrupted`]。
  pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
    self.interrupted = Some(flag);
    self
  }

  fn command(&self, input: &Path, config: &PredictConfig, run_name: &str) -> Command {
    let mut command = Command::new(&self.program);
    command
      .arg("predict")
      .arg(format!("model={}", self.model))
      .arg(format!("source={}", input.display()))
      .arg(format!("save={}", if config.save { "True" } else { "False" }))
      .arg(format!("imgsz={}", config.imgsz))
      .arg(format!("conf={}", config.conf))
      .arg(format!("project={}", self.project.display()))
      .arg(format!("name={}", run_name))
      .arg("exist_ok=True")
      // 管道输出时 Python 默认整块缓冲，进度行会被延迟到结束才出现
      .env("PYTHONUNBUFFERED", "1")
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());
    command
  }

  fn is_interrupted(&self) -> bool {
    self
      .interrupted
      .as_ref()
      .is_some_and(|flag| flag.load(Ordering::SeqCst))
  }
}

impl Detector for UltralyticsCli {
  fn predict(
    &self,
    input: &Path,
    config: &PredictConfig,
    progress: &mut dyn FnMut(Progress),
  ) -> Result<DetectionRun, InferenceError> {
    if self.is_interrupted() {
      warn!("已收到中断信号，不再启动检测器");
      return Err(InferenceError::Interrupted);
    }

    let run_name = format!("{}{}", RUN_NAME_PREFIX, Uuid::new_v4().simple());
    let save_dir = self.project.join(&run_name);

    info!(
      "调用检测器: {} predict model={} source={} imgsz={} conf={}",
      self.program,
      self.model,
      input.display(),
      config.imgsz,
      config.conf
    );
    let mut child = self
      .command(input, config, &run_name)
      .spawn()
      .map_err(|source| {
        error!("无法执行 {}: {}", self.program, source);
        InferenceError::Spawn {
          program: self.program.clone(),
          source,
        }
      })?;

    let stderr = child.stderr.take();
    let stderr_reader = thread::spawn(move || {
      let mut buffer = Vec::new();
      if let Some(mut stderr) = stderr {
        let _ = stderr.read_to_end(&mut buffer);
      }
      String::from_utf8_lossy(&buffer).into_owned()
    });
    let lines = read_lines(child.stdout.take());

    loop {
      match lines.recv_timeout(POLL_INTERVAL) {
        Ok(line) => {
          if let Some(p) = parse_progress(&line) {
            progress(p);
          }
          if line.contains("Results saved to") {
            info!("{}", line.trim());
          } else {
            debug!("yolo: {}", line.trim_end());
          }
        }
        Err(RecvTimeoutError::Timeout) => {}
        Err(RecvTimeoutError::Disconnected) => break,
      }
      if self.is_interrupted() {
        return Err(stop(&mut child));
      }
    }

    let status = loop {
      match child.try_wait() {
        Ok(Some(status)) => break status,
        Ok(None) if self.is_interrupted() => return Err(stop(&mut child)),
        Ok(None) => thread::sleep(POLL_INTERVAL),
        Err(e) => {
          let _ = child.kill();
          let _ = child.wait();
          return Err(e.into());
        }
      }
    };
    let stderr = stderr_reader.join().unwrap_or_default();

    if !status.success() {
      if self.is_interrupted() {
        warn!("检测器在运行中被中断");
        return Err(InferenceError::Interrupted);
      }
      error!("检测器错误: {}", stderr.trim());
      return Err(InferenceError::Failed {
        status: status.to_string(),
        stderr: stderr.trim().to_string(),
      });
    }

    if !save_dir.is_dir() {
      if config.save {
        return Err(InferenceError::MissingSaveDir(save_dir));
      }
      // 未要求保存时检测器不会创建目录，这里补一个空目录，交给定位器报告未找到
      std::fs::create_dir_all(&save_dir)?;
    }

    info!("检测完成，保存目录: {}", save_dir.display());
    Ok(DetectionRun::new(save_dir))
  }
}

/// 在后台线程中逐行读取子进程输出，非 UTF-8 内容按有损方式转换
fn read_lines(stdout: Option<ChildStdout>) -> Receiver<String> {
  let (tx, rx) = mpsc::channel();
  if let Some(stdout) = stdout {
    thread::spawn(move || {
      let mut reader = BufReader::new(stdout);
      let mut buffer = Vec::new();
      loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer) {
          Ok(0) => break,
          Ok(_) => {
            if tx.send(String::from_utf8_lossy(&buffer).into_owned()).is_err() {
              break;
            }
          }
          Err(e) => {
            debug!("读取检测器输出失败: {}", e);
            break;
          }
        }
      }
    });
  }
  rx
}

/// 终止子进程并回收
fn stop(child: &mut Child) -> InferenceError {
  warn!("检测器在运行中被中断，终止子进程");
  if let Err(e) = child.kill() {
    debug!("终止检测器失败: {}", e);
  }
  let _ = child.wait();
  InferenceError::Interrupted
}

/// 从检测器日志行中解析视频进度，例如
/// `video 1/1 (frame 12/300) /tmp/a.mp4: 384x640 2 persons, 7.1ms`
pub fn parse_progress(line: &str) -> Option<Progress> {
  let start = line.find("(frame ")? + "(frame ".len();
  let rest = &line[start..];
  let end = rest.find(')')?;
  let (frame, total) = match rest[..end].split_once('/') {
    Some((frame, total)) => (frame, Some(total)),
    None => (&rest[..end], None),
  };

  Some(Progress {
    frame: frame.trim().parse().ok()?,
    total: match total {
      Some(total) => Some(total.trim().parse().ok()?),
      None => None,
    },
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_video_progress_line() {
    let line = "video 1/1 (frame 12/300) /tmp/kenali-x.mp4: 384x640 2 persons, 7.1ms";
    assert_eq!(
      parse_progress(line),
      Some(Progress {
        frame: 12,
        total: Some(300)
      })
    );
  }

  #[test]
  fn ignores_lines_without_frames() {
    assert_eq!(parse_progress("image 1/1 /tmp/a.jpg: 640x480 1 dog, 5.0ms"), None);
    assert_eq!(parse_progress("video 1/1 (frame x/300)"), None);
    assert_eq!(
      parse_progress("video 1/1 (frame 4)"),
      Some(Progress {
        frame: 4,
        total: None
      })
    );
  }

  #[test]
  fn url_forms() {
    let cli = UltralyticsCli::from_url(&Url::parse("yolo://yolov8n.pt").unwrap()).unwrap();
    assert_eq!(cli.model(), "yolov8n.pt");
    assert_eq!(cli.project(), Path::new(DEFAULT_PROJECT));

    let cli = UltralyticsCli::from_url(
      &Url::parse("yolo:///models/best%20v2.pt?bin=/opt/yolo&project=/var/runs").unwrap(),
    )
    .unwrap();
    assert_eq!(cli.model(), "/models/best v2.pt");
    assert_eq!(cli.project(), Path::new("/var/runs"));
    assert_eq!(cli.program, "/opt/yolo");

    assert!(matches!(
      UltralyticsCli::from_url(&Url::parse("yolo:///").unwrap()),
      Err(UltralyticsCliError::MissingModel)
    ));
    assert!(matches!(
      UltralyticsCli::from_url(&Url::parse("onnx:///m.onnx").unwrap()),
      Err(UltralyticsCliError::SchemeMismatch(_))
    ));
  }

  #[test]
  fn command_carries_predict_config() {
    let cli = UltralyticsCli::from_url(&Url::parse("yolo://yolov8n.pt").unwrap()).unwrap();
    let command = cli.command(
      Path::new("/tmp/in.jpg"),
      &PredictConfig::default(),
      "kenali-run",
    );
    let args: Vec<String> = command
      .get_args()
      .map(|a| a.to_string_lossy().into_owned())
      .collect();
    assert_eq!(args[0], "predict");
    assert!(args.contains(&"save=True".to_string()));
    assert!(args.contains(&"imgsz=640".to_string()));
    assert!(args.contains(&"conf=0.5".to_string()));
    assert!(args.contains(&"name=kenali-run".to_string()));
    assert!(args.contains(&"exist_ok=True".to_string()));
  }

  #[test]
  fn missing_program_is_spawn_error() {
    let cli = UltralyticsCli::from_url(
      &Url::parse("yolo://yolov8n.pt?bin=/nonexistent/kenali-yolo").unwrap(),
    )
    .unwrap();
    let err = cli
      .predict(Path::new("/tmp/in.jpg"), &PredictConfig::default(), &mut |_| {})
      .unwrap_err();
    assert!(matches!(err, InferenceError::Spawn { .. }));
  }

  #[cfg(unix)]
  mod scripted {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Instant;

    /// 用 shell 脚本冒充 `yolo`，脚本中 `$save_dir` 为本次运行的保存目录
    fn scripted_cli(dir: &Path, body: &str) -> UltralyticsCli {
      let script = dir.join("fake-yolo.sh");
      let runs = dir.join("runs");
      std::fs::write(
        &script,
        format!(
          "#!/bin/sh\n\
           for arg in \"$@\"; do\n\
             case \"$arg\" in\n\
               project=*) project=\"${{arg#project=}}\" ;;\n\
               name=*) name=\"${{arg#name=}}\" ;;\n\
             esac\n\
           done\n\
           save_dir=\"$project/$name\"\n\
           {}\n",
          body
        ),
      )
      .unwrap();
      std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

      let url = format!(
        "yolo://yolov8n.pt?bin={}&project={}",
        script.display(),
        runs.display()
      );
      UltralyticsCli::from_url(&Url::parse(&url).unwrap()).unwrap()
    }

    #[test]
    fn frame_lines_are_forwarded_as_progress() {
      let dir = tempfile::tempdir().unwrap();
      let cli = scripted_cli(
        dir.path(),
        "mkdir -p \"$save_dir\"\n\
         echo 'video 1/1 (frame 1/2) /tmp/in.mp4: 384x640 1 person, 7.0ms'\n\
         echo 'video 1/1 (frame 2/2) /tmp/in.mp4: 384x640 2 persons, 6.5ms'\n\
         echo \"Results saved to $save_dir\"",
      );

      let mut seen = Vec::new();
      let run = cli
        .predict(
          Path::new("/tmp/in.mp4"),
          &PredictConfig::default(),
          &mut |p: Progress| seen.push(p),
        )
        .unwrap();

      assert!(run.save_dir.is_dir());
      assert!(run.save_dir.starts_with(dir.path().join("runs")));
      assert_eq!(
        seen,
        vec![
          Progress {
            frame: 1,
            total: Some(2)
          },
          Progress {
            frame: 2,
            total: Some(2)
          },
        ]
      );
    }

    #[test]
    fn non_zero_exit_carries_stderr() {
      let dir = tempfile::tempdir().unwrap();
      let cli = scripted_cli(dir.path(), "echo 'model weights not found' >&2\nexit 3");

      let err = cli
        .predict(Path::new("/tmp/in.jpg"), &PredictConfig::default(), &mut |_| {})
        .unwrap_err();
      match err {
        InferenceError::Failed { status, stderr } => {
          assert!(status.contains('3'));
          assert_eq!(stderr, "model weights not found");
        }
        other => panic!("unexpected error: {other:?}"),
      }
    }

    #[test]
    fn success_without_save_dir_is_an_error() {
      let dir = tempfile::tempdir().unwrap();
      let cli = scripted_cli(dir.path(), "exit 0");

      let err = cli
        .predict(Path::new("/tmp/in.jpg"), &PredictConfig::default(), &mut |_| {})
        .unwrap_err();
      assert!(matches!(err, InferenceError::MissingSaveDir(_)));
    }

    #[test]
    fn unsaved_run_gets_an_empty_save_dir() {
      let dir = tempfile::tempdir().unwrap();
      let cli = scripted_cli(dir.path(), "exit 0");
      let config = PredictConfig {
        save: false,
        ..Default::default()
      };

      let run = cli
        .predict(Path::new("/tmp/in.jpg"), &config, &mut |_| {})
        .unwrap();
      assert!(run.save_dir.is_dir());
      assert_eq!(std::fs::read_dir(&run.save_dir).unwrap().count(), 0);
    }

    #[test]
    fn undecodable_output_still_waits_for_exit() {
      let dir = tempfile::tempdir().unwrap();
      let cli = scripted_cli(
        dir.path(),
        "mkdir -p \"$save_dir\"\n\
         printf '\\377\\376\\n'\n\
         sleep 1\n\
         touch \"$save_dir/finished\"",
      );

      let run = cli
        .predict(Path::new("/tmp/in.jpg"), &PredictConfig::default(), &mut |_| {})
        .unwrap();
      assert!(run.save_dir.join("finished").exists());
    }

    #[test]
    fn interrupted_flag_prevents_spawn() {
      let dir = tempfile::tempdir().unwrap();
      let marker = dir.path().join("started");
      let cli = scripted_cli(dir.path(), &format!("touch '{}'", marker.display()))
        .with_interrupt(Arc::new(AtomicBool::new(true)));

      let err = cli
        .predict(Path::new("/tmp/in.jpg"), &PredictConfig::default(), &mut |_| {})
        .unwrap_err();
      assert!(matches!(err, InferenceError::Interrupted));
      assert!(!marker.exists());
    }

    #[test]
    fn interrupt_kills_running_detector() {
      let dir = tempfile::tempdir().unwrap();
      let marker = dir.path().join("finished");
      let flag = Arc::new(AtomicBool::new(false));
      let cli = scripted_cli(
        dir.path(),
        &format!("mkdir -p \"$save_dir\"\nsleep 5\ntouch '{}'", marker.display()),
      )
      .with_interrupt(flag.clone());

      let setter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        flag.store(true, Ordering::SeqCst);
      });
      let started = Instant::now();
      let err = cli
        .predict(Path::new("/tmp/in.mp4"), &PredictConfig::default(), &mut |_| {})
        .unwrap_err();
      setter.join().unwrap();

      assert!(matches!(err, InferenceError::Interrupted));
      assert!(started.elapsed() < Duration::from_secs(4));
      assert!(!marker.exists());
    }
  }
}
