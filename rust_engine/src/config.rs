//! 加载配置
//!
//! 所有参数扁平化，显式传给加载器，不使用全局实例。

use crate::math::RotationOrder;

/// 动作捕捉数据加载配置
#[derive(Debug, Clone)]
pub struct MocapConfig {
    /// 长度与平移缩放，默认 0.06
    /// ASF/AMC 中的长度单位乘以此值得到场景单位
    pub scale: f64,

    /// 骨骼表容量（含隐式根骨骼），默认 256
    pub max_bones: usize,

    /// 单个 Motion 的最大帧数，默认 1_000_000
    pub max_frames: usize,

    /// 欧拉角组合顺序，默认 Xyz（先 X 后 Y 再 Z）
    /// ASF axis 行带顺序标记时以标记为准
    pub rotation_order: RotationOrder,

    /// 动作文件的采样率，默认 120（CMU 采集帧率）
    pub frames_per_second: f64,
}

impl Default for MocapConfig {
    fn default() -> Self {
        Self {
            scale: 0.06,
            max_bones: 256,
            max_frames: 1_000_000,
            rotation_order: RotationOrder::Xyz,
            frames_per_second: 120.0,
        }
    }
}
