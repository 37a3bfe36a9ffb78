//! 骨架系统：骨骼、自由度与 ASF 层级解析

mod asf_loader;
mod bone;
mod dof;
mod manager;

pub use bone::{Bone, ROOT_ID, ROOT_NAME};
pub use dof::{Channel, DofMask};
pub use manager::{AngleUnit, Skeleton, SkeletonOffset, Units};
