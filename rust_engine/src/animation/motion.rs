//! Motion：按帧排列的姿态序列
//!
//! 骨架通过 `Arc` 共享，可被多个 Motion 复用；构建后只读。

use std::sync::Arc;

use rayon::prelude::*;

use crate::skeleton::Skeleton;
use crate::{MocapError, Result};

use super::pose::{self, SkeletonPose};
use super::Posture;

/// 动画数据
#[derive(Debug, Clone)]
pub struct Motion {
    skeleton: Arc<Skeleton>,
    postures: Vec<Posture>,
    /// 采样率（帧/秒）
    frames_per_second: f64,
}

impl Motion {
    /// 由已有姿态构建，所有姿态必须与骨骼表对齐
    pub fn from_postures(
        skeleton: Arc<Skeleton>,
        postures: Vec<Posture>,
        frames_per_second: f64,
    ) -> Result<Self> {
        if let Some(bad) = postures
            .iter()
            .find(|p| p.bone_count() != skeleton.bone_count())
        {
            return Err(MocapError::PostureMismatch {
                expected: skeleton.bone_count(),
                found: bad.bone_count(),
            });
        }
        Ok(Self {
            skeleton,
            postures,
            frames_per_second,
        })
    }

    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    pub fn frame_count(&self) -> usize {
        self.postures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postures.is_empty()
    }

    pub fn postures(&self) -> &[Posture] {
        &self.postures
    }

    /// 按序号（从 0 开始，与文件中的帧号无关）取姿态
    pub fn posture(&self, index: usize) -> Option<&Posture> {
        self.postures.get(index)
    }

    /// 文件中第一帧的帧号
    pub fn first_frame(&self) -> Option<u32> {
        self.postures.first().map(Posture::frame)
    }

    pub fn frames_per_second(&self) -> f64 {
        self.frames_per_second
    }

    /// 持续时间（秒）
    pub fn duration(&self) -> f64 {
        if self.frames_per_second <= 0.0 {
            return 0.0;
        }
        self.postures.len() as f64 / self.frames_per_second
    }

    /// 时间对应的帧序号，超出末尾时取最后一帧
    pub fn frame_at_time(&self, seconds: f64) -> Option<usize> {
        if self.postures.is_empty() {
            return None;
        }
        let frame = (seconds.max(0.0) * self.frames_per_second).floor() as usize;
        Some(frame.min(self.postures.len() - 1))
    }

    /// 求值单帧，序号越界时返回 Ok(None)
    pub fn evaluate_frame(&self, index: usize) -> Result<Option<SkeletonPose>> {
        self.postures
            .get(index)
            .map(|posture| pose::evaluate(&self.skeleton, posture))
            .transpose()
    }

    /// 并行求值所有帧，任一帧失败则整体失败
    pub fn evaluate_all(&self) -> Result<Vec<SkeletonPose>> {
        self.postures
            .par_iter()
            .map(|posture| pose::evaluate(&self.skeleton, posture))
            .collect()
    }
}
