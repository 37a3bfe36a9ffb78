//! 动画系统
//!
//! 提供 AMC 动作解析、逐帧姿态与骨骼世界变换求值。

mod amc_loader;
mod motion;
pub mod pose;
mod posture;

pub use motion::Motion;
pub use pose::{JointTransform, SkeletonPose};
pub use posture::Posture;
