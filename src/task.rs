// 该文件是 Tanjing （探镜） 项目的一部分。
// src/task.rs - 推理任务
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

use std::{
  sync::{
    Once,
    atomic::{AtomicBool, Ordering},
    mpsc,
  },
  thread,
  time::{Duration, Instant},
};
use tracing::{info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    let elapsed = now.elapsed();
    info!("推理完成，耗时: {:.2?}", elapsed);
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

const REPEAT_TIMES: usize = 1000;
// 前几次推理包含预热开销，不计入平均值
const REPEAT_WARMUP: usize = 2;

pub struct RepeatShotTask {
  times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self {
      times: REPEAT_TIMES,
    }
  }
}

impl RepeatShotTask {
  pub fn with_times(mut self, times: usize) -> Self {
    self.times = times;
    self
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.times);
    for i in 0..self.times {
      let now = Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      info!("({})渲染完成，耗时: {:.2?}", i, now.elapsed());
      times.push(elapsed);
    }

    if let Some(mean) = mean_after_warmup(&times) {
      warn!("平均推理时间: {:.2?}", mean);
    }

    Ok(())
  }
}

fn mean_after_warmup(times: &[Duration]) -> Option<Duration> {
  let measured = times.get(REPEAT_WARMUP..).filter(|t| !t.is_empty())?;
  Some(measured.iter().sum::<Duration>() / measured.len() as u32)
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INTERRUPT_HANDLER: Once = Once::new();

fn install_interrupt_handler() {
  INTERRUPT_HANDLER.call_once(|| {
    let installed = ctrlc::set_handler(|| {
      info!("收到中断信号，准备退出...");
      INTERRUPTED.store(true, Ordering::SeqCst);
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    });
    if let Err(e) = installed {
      warn!("无法设置中断信号处理: {}", e);
    }
  });
}

/// 逐帧处理全部输入
///
/// 推理在单独的工作线程上执行，队列容量为 1，同一时刻只有一次推理在进行；
/// 渲染在调用线程上完成。
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

type Inferred<F, D, E> = (F, Result<D, E>, Duration);

impl<
  F: Send,
  D: Send,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME> + Sync,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    install_interrupt_handler();
    INTERRUPTED.store(false, Ordering::SeqCst);

    let rendered = thread::scope(|scope| -> anyhow::Result<usize> {
      let (frame_tx, frame_rx) = mpsc::sync_channel::<F>(1);
      let (result_tx, result_rx) = mpsc::channel::<Inferred<F, D, ME>>();
      let model = &model;

      scope.spawn(move || {
        for frame in frame_rx {
          let now = Instant::now();
          let result = model.infer(&frame);
          let failed = result.is_err();
          if result_tx.send((frame, result, now.elapsed())).is_err() || failed {
            break;
          }
        }
      });

      let mut rendered = 0usize;
      let mut render = |(frame, result, elapsed): Inferred<F, D, ME>| -> anyhow::Result<()> {
        let result = result?;
        output.render_result(&frame, &result)?;
        rendered += 1;
        info!("处理第 {} 帧图像，推理耗时: {:.2?}", rendered, elapsed);
        Ok(())
      };

      let mut submitted = 0usize;
      for frame in input {
        if self.frame_number.is_some_and(|n| submitted >= n) {
          info!("达到指定帧数 {}, 退出任务循环", submitted);
          break;
        }
        if INTERRUPTED.load(Ordering::SeqCst) {
          warn!("中断信号接收，退出任务循环");
          break;
        }
        // 工作线程因推理失败退出时发送失败，错误在下方取回
        if frame_tx.send(frame).is_err() {
          break;
        }
        submitted += 1;
        while let Ok(done) = result_rx.try_recv() {
          render(done)?;
        }
      }

      drop(frame_tx);
      for done in result_rx {
        render(done)?;
      }
      Ok(rendered)
    })?;

    info!("任务完成，共处理 {} 帧", rendered);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;
  use thiserror::Error;

  #[derive(Error, Debug)]
  #[error("mock failure on {0}")]
  struct MockError(u32);

  /// 输入为数字，输出为其两倍；遇到 `fail_on` 时失败
  struct Doubler {
    fail_on: Option<u32>,
  }

  impl Model for Doubler {
    type Input = u32;
    type Output = u32;
    type Error = MockError;

    fn infer(&self, input: &u32) -> Result<u32, MockError> {
      if self.fail_on == Some(*input) {
        return Err(MockError(*input));
      }
      Ok(input * 2)
    }
  }

  #[derive(Default)]
  struct Collect {
    seen: Mutex<Vec<(u32, u32)>>,
  }

  impl Render<u32, u32> for &Collect {
    type Error = MockError;

    fn render_result(&self, frame: &u32, result: &u32) -> Result<(), MockError> {
      self.seen.lock().unwrap().push((*frame, *result));
      Ok(())
    }
  }

  #[test]
  fn one_shot_uses_first_frame_only() {
    let collect = Collect::default();
    OneShotTask
      .run_task(vec![3, 4].into_iter(), Doubler { fail_on: None }, &collect)
      .unwrap();
    assert_eq!(*collect.seen.lock().unwrap(), vec![(3, 6)]);
  }

  #[test]
  fn one_shot_without_input_fails() {
    let collect = Collect::default();
    let err = OneShotTask.run_task(
      std::iter::empty::<u32>(),
      Doubler { fail_on: None },
      &collect,
    );
    assert!(err.is_err());
  }

  #[test]
  fn repeat_shot_runs_requested_times() {
    let collect = Collect::default();
    RepeatShotTask::default()
      .with_times(5)
      .run_task(vec![7].into_iter(), Doubler { fail_on: None }, &collect)
      .unwrap();
    assert_eq!(collect.seen.lock().unwrap().len(), 5);
  }

  #[test]
  fn mean_skips_warmup() {
    let times = [
      Duration::from_millis(100),
      Duration::from_millis(100),
      Duration::from_millis(10),
      Duration::from_millis(20),
    ];
    assert_eq!(mean_after_warmup(&times), Some(Duration::from_millis(15)));
    assert_eq!(mean_after_warmup(&times[..2]), None);
  }

  #[test]
  fn continuous_processes_frames_in_order() {
    let collect = Collect::default();
    ContinuousTask::default()
      .run_task(1u32..=5, Doubler { fail_on: None }, &collect)
      .unwrap();
    assert_eq!(
      *collect.seen.lock().unwrap(),
      vec![(1, 2), (2, 4), (3, 6), (4, 8), (5, 10)]
    );
  }

  #[test]
  fn continuous_respects_frame_limit() {
    let collect = Collect::default();
    ContinuousTask::default()
      .with_frame_number(Some(2))
      .run_task(1u32..=5, Doubler { fail_on: None }, &collect)
      .unwrap();
    assert_eq!(*collect.seen.lock().unwrap(), vec![(1, 2), (2, 4)]);
  }

  #[test]
  fn continuous_propagates_inference_failure() {
    let collect = Collect::default();
    let err = ContinuousTask::default()
      .run_task(1u32..=5, Doubler { fail_on: Some(3) }, &collect)
      .unwrap_err();
    assert!(err.to_string().contains("mock failure on 3"));
    assert_eq!(*collect.seen.lock().unwrap(), vec![(1, 2), (2, 4)]);
  }
}
