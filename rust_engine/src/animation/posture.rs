//! 单帧姿态
//!
//! 旋转 / 平移 / 长度以并行数组存放，索引与 `Skeleton` 的骨骼表一一对齐；
//! 这一对齐关系是姿态求值的前提。

use glam::DVec3;

use crate::skeleton::Skeleton;

/// 单帧姿态
#[derive(Clone, Debug, PartialEq)]
pub struct Posture {
    frame: u32,
    root_position: DVec3,
    /// 欧拉角（度），索引 0 为根骨骼
    bone_rotation: Vec<DVec3>,
    bone_translation: Vec<DVec3>,
    /// l 通道（沿骨骼方向的长度增量）
    bone_length: Vec<f64>,
}

impl Posture {
    /// 创建全零姿态
    pub fn new(frame: u32, bone_count: usize) -> Self {
        Self {
            frame,
            root_position: DVec3::ZERO,
            bone_rotation: vec![DVec3::ZERO; bone_count],
            bone_translation: vec![DVec3::ZERO; bone_count],
            bone_length: vec![0.0; bone_count],
        }
    }

    /// 静止姿态：根位于骨架的根位置，其余通道为零
    pub fn rest(skeleton: &Skeleton) -> Self {
        let mut posture = Self::new(0, skeleton.bone_count());
        posture.root_position = skeleton.root_position();
        posture
    }

    /// 动作文件中的帧号
    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn bone_count(&self) -> usize {
        self.bone_rotation.len()
    }

    pub fn root_position(&self) -> DVec3 {
        self.root_position
    }

    pub fn bone_rotation(&self, index: usize) -> Option<DVec3> {
        self.bone_rotation.get(index).copied()
    }

    pub fn bone_translation(&self, index: usize) -> Option<DVec3> {
        self.bone_translation.get(index).copied()
    }

    pub fn bone_length(&self, index: usize) -> Option<f64> {
        self.bone_length.get(index).copied()
    }

    pub fn rotations(&self) -> &[DVec3] {
        &self.bone_rotation
    }

    pub fn translations(&self) -> &[DVec3] {
        &self.bone_translation
    }

    pub fn lengths(&self) -> &[f64] {
        &self.bone_length
    }

    pub fn set_root_position(&mut self, position: DVec3) {
        self.root_position = position;
    }

    /// 设置骨骼旋转，索引越界时忽略
    pub fn set_bone_rotation(&mut self, index: usize, rotation: DVec3) {
        if let Some(slot) = self.bone_rotation.get_mut(index) {
            *slot = rotation;
        }
    }

    pub fn set_bone_translation(&mut self, index: usize, translation: DVec3) {
        if let Some(slot) = self.bone_translation.get_mut(index) {
            *slot = translation;
        }
    }

    pub fn set_bone_length(&mut self, index: usize, length: f64) {
        if let Some(slot) = self.bone_length.get_mut(index) {
            *slot = length;
        }
    }

    pub(crate) fn rotation_mut(&mut self, index: usize) -> &mut DVec3 {
        &mut self.bone_rotation[index]
    }

    pub(crate) fn translation_mut(&mut self, index: usize) -> &mut DVec3 {
        &mut self.bone_translation[index]
    }

    pub(crate) fn length_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.bone_length[index]
    }

    pub(crate) fn root_position_mut(&mut self) -> &mut DVec3 {
        &mut self.root_position
    }
}
