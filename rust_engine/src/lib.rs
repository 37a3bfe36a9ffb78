//! Mocap Engine - ASF/AMC 动作捕捉数据运行时
//!
//! 提供：
//! - ASF 骨架层级解析
//! - AMC 动作曲线解析
//! - 欧拉角旋转与仿射矩阵运算
//! - 逐帧骨骼世界变换求值
//! - 协作式停止的定速播放器

pub mod animation;
pub mod config;
pub mod math;
pub mod player;
pub mod skeleton;

pub use animation::{JointTransform, Motion, Posture, SkeletonPose};
pub use config::MocapConfig;
pub use math::RotationOrder;
pub use player::{MotionPlayer, PlayerConfig, PlayerState};
pub use skeleton::{Bone, Channel, DofMask, Skeleton, SkeletonOffset};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MocapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("unknown bone '{name}' at line {line}")]
    UnknownBone { line: usize, name: String },

    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("too many {what}: limit is {limit}")]
    Capacity { what: &'static str, limit: usize },

    #[error("posture has {found} bones, skeleton has {expected}")]
    PostureMismatch { expected: usize, found: usize },

    #[error("division by zero")]
    DivideByZero,

    #[error("config error: {0}")]
    Config(String),
}

impl MocapError {
    /// 是否属于输入数据格式错误
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            MocapError::Parse { .. } | MocapError::UnknownBone { .. } | MocapError::InvalidHierarchy(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MocapError>;
