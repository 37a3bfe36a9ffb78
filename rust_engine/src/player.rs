//! 动作播放器
//!
//! 在独立线程上按固定帧间隔求值并输出每帧姿态。
//! 停止通过共享标志协作完成，线程在下一个节拍检查后自行退出。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::animation::{Motion, SkeletonPose};
use crate::{MocapError, Result};

/// 播放配置
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// 播放帧率，None 时使用 Motion 的采样率
    pub frames_per_second: Option<f64>,
    /// 播放速度倍率
    pub speed: f64,
    /// 是否循环播放
    pub looping: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            frames_per_second: None,
            speed: 1.0,
            looping: false,
        }
    }
}

/// 播放线程的结束状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    /// 非循环播放到达末尾
    Finished,
    /// 收到停止信号
    Stopped,
    /// 帧求值出错
    Failed,
}

/// 动作播放器
pub struct MotionPlayer {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<PlayerState>>,
}

impl MotionPlayer {
    /// 启动播放线程，`sink` 在每个节拍收到帧序号和该帧的姿态
    pub fn spawn<F>(motion: Arc<Motion>, config: PlayerConfig, sink: F) -> Result<Self>
    where
        F: FnMut(usize, &SkeletonPose) + Send + 'static,
    {
        let fps = config
            .frames_per_second
            .unwrap_or_else(|| motion.frames_per_second());
        let rate = fps * config.speed;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(MocapError::Config(format!(
                "invalid playback rate {} (fps {}, speed {})",
                rate, fps, config.speed
            )));
        }
        let interval = Duration::try_from_secs_f64(1.0 / rate).map_err(|e| {
            MocapError::Config(format!("playback rate {} out of range: {}", rate, e))
        })?;

        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = thread::Builder::new()
            .name("motion-player".to_string())
            .spawn(move || run(motion, interval, config.looping, flag, sink))?;

        log::debug!("播放线程已启动: 间隔 {:?}, 循环 {}", interval, config.looping);

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// 播放线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// 发出停止信号并等待线程退出
    pub fn stop(mut self) -> PlayerState {
        self.signal_stop();
        self.join()
    }

    /// 等待播放自然结束（循环播放时会一直阻塞直到被停止）
    pub fn wait(mut self) -> PlayerState {
        self.join()
    }

    fn signal_stop(&self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
    }

    fn join(&mut self) -> PlayerState {
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(state)) => state,
            Some(Err(_)) => {
                log::error!("播放线程异常退出");
                PlayerState::Stopped
            }
            None => PlayerState::Stopped,
        }
    }
}

impl Drop for MotionPlayer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.signal_stop();
            self.join();
        }
    }
}

fn run<F>(
    motion: Arc<Motion>,
    interval: Duration,
    looping: bool,
    stop: Arc<AtomicBool>,
    mut sink: F,
) -> PlayerState
where
    F: FnMut(usize, &SkeletonPose),
{
    let mut frame = 0;
    let mut next_tick = Instant::now();

    loop {
        if stop.load(Ordering::Acquire) {
            return PlayerState::Stopped;
        }
        if frame >= motion.frame_count() {
            if looping && !motion.is_empty() {
                frame = 0;
            } else {
                return PlayerState::Finished;
            }
        }

        match motion.evaluate_frame(frame) {
            Ok(Some(pose)) => sink(frame, &pose),
            Ok(None) => {}
            Err(e) => {
                log::error!("第 {} 帧求值失败: {}", frame, e);
                return PlayerState::Failed;
            }
        }
        frame += 1;

        // 落后时不追帧，从当前时刻重新计时
        next_tick = match next_tick.checked_add(interval) {
            Some(tick) => tick,
            // 间隔超出时钟范围，下一帧永远不会到来
            None => {
                while !stop.load(Ordering::Acquire) {
                    thread::park();
                }
                return PlayerState::Stopped;
            }
        };
        let now = Instant::now();
        if next_tick <= now {
            next_tick = now;
            continue;
        }
        while !stop.load(Ordering::Acquire) {
            let now = Instant::now();
            if now >= next_tick {
                break;
            }
            thread::park_timeout(next_tick - now);
        }
    }
}
