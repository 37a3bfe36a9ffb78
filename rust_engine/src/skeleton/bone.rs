//! 骨骼节点

use glam::{DMat4, DVec3};

use crate::math::{self, RotationOrder};

use super::dof::DofMask;

/// 根骨骼的保留名称
pub const ROOT_NAME: &str = "root";

/// 根骨骼的保留 id
pub const ROOT_ID: u32 = 0;

/// 骨骼节点
#[derive(Clone, Debug)]
pub struct Bone {
    pub id: u32,
    /// 父骨骼 id，根骨骼为 None
    pub parent: Option<u32>,
    pub name: String,

    // 静止姿态（父空间 / 全局坐标，ASF 约定）
    /// 单位方向向量
    pub direction: DVec3,
    /// 已乘以加载缩放
    pub length: f64,
    /// 局部坐标轴偏移角（度）
    pub axis: DVec3,
    pub axis_order: RotationOrder,

    pub dof: DofMask,
    /// 每个自由度的 (min, max)，仅记录不强制
    pub limits: Vec<(f64, f64)>,

    /// 父局部坐标系到当前局部坐标系的静止旋转（在层级构建时计算）
    pub rot_parent_current: DMat4,
}

impl Bone {
    pub fn new(id: u32, name: String) -> Self {
        Self {
            id,
            parent: None,
            name,
            direction: DVec3::ZERO,
            length: 0.0,
            axis: DVec3::ZERO,
            axis_order: RotationOrder::default(),
            dof: DofMask::empty(),
            limits: Vec::new(),
            rot_parent_current: DMat4::IDENTITY,
        }
    }

    /// 隐式根骨骼：6 个自由度，角度为零
    pub fn root() -> Self {
        let mut bone = Self::new(ROOT_ID, ROOT_NAME.to_string());
        bone.dof = DofMask::full();
        bone
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// 局部坐标轴相对全局的旋转 C
    pub fn axis_matrix(&self) -> DMat4 {
        math::euler_matrix(self.axis, self.axis_order)
    }

    /// 全局坐标下的骨骼向量
    pub fn bone_vector(&self) -> DVec3 {
        self.direction * self.length
    }

    /// 骨骼向量在自身局部坐标系中的表示，`extra_length` 为动作数据中的 l 通道
    pub fn local_tip(&self, extra_length: f64) -> DVec3 {
        let c_inv = self.axis_matrix().transpose();
        c_inv.transform_vector3(self.direction * (self.length + extra_length))
    }

    /// 重新计算 `rot_parent_current = C_parent⁻¹ · C`
    pub(crate) fn update_rest_transform(&mut self, parent_axis: &DMat4) {
        self.rot_parent_current = parent_axis.transpose() * self.axis_matrix();
    }
}

impl Default for Bone {
    fn default() -> Self {
        Self::new(0, String::new())
    }
}
