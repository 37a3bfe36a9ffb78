//! 骨架：骨骼表、查询与层级构建

use std::collections::{HashMap, VecDeque};

use glam::DVec3;

use crate::math::RotationOrder;
use crate::{MocapError, Result};

use super::bone::{Bone, ROOT_NAME};
use super::dof::Channel;

/// 角度单位
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AngleUnit {
    #[default]
    Degrees,
    Radians,
}

impl AngleUnit {
    /// 转换为度
    pub fn to_degrees(self, value: f64) -> f64 {
        match self {
            AngleUnit::Degrees => value,
            AngleUnit::Radians => value.to_degrees(),
        }
    }
}

/// `:units` 段
#[derive(Clone, Debug, PartialEq)]
pub struct Units {
    pub mass: f64,
    pub length: f64,
    pub angle: AngleUnit,
}

impl Default for Units {
    fn default() -> Self {
        Self {
            mass: 1.0,
            length: 1.0,
            angle: AngleUnit::Degrees,
        }
    }
}

/// 骨架整体的实时偏移，外部代码可逐帧修改
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SkeletonOffset {
    pub translation: DVec3,
    /// 欧拉角（度）
    pub rotation: DVec3,
}

/// 层级段中的一条父子关系
#[derive(Clone, Debug)]
pub(crate) struct HierarchyLink {
    pub line: usize,
    pub parent: String,
    pub child: String,
}

/// 骨架
///
/// 索引 0 固定为隐式根骨骼。构建完成后骨骼表不可变，
/// 只有根位置和整体偏移可以修改。
#[derive(Clone, Debug)]
pub struct Skeleton {
    name: String,
    bones: Vec<Bone>,
    parent_indices: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    name_to_index: HashMap<String, usize>,
    id_to_index: HashMap<u32, usize>,
    /// 父骨骼总在子骨骼之前
    evaluation_order: Vec<usize>,
    /// 带自由度的非根骨骼，按层级段出现顺序
    animated_bones: Vec<usize>,
    moving_bone_count: usize,
    root_order: Vec<Channel>,
    rotation_order: RotationOrder,
    units: Units,
    root_position: DVec3,
    offset: SkeletonOffset,
}

impl Skeleton {
    /// 根据骨骼表和层级关系组装骨架，校验树结构
    pub(crate) fn assemble(
        name: String,
        mut bones: Vec<Bone>,
        links: &[HierarchyLink],
        root_order: Vec<Channel>,
        rotation_order: RotationOrder,
        units: Units,
        root_position: DVec3,
    ) -> Result<Self> {
        let bone_count = bones.len();

        let mut name_to_index = HashMap::with_capacity(bone_count);
        let mut id_to_index = HashMap::with_capacity(bone_count);
        for (index, bone) in bones.iter().enumerate() {
            if name_to_index.insert(bone.name.clone(), index).is_some() {
                return Err(MocapError::InvalidHierarchy(format!(
                    "duplicate bone name '{}'",
                    bone.name
                )));
            }
            if id_to_index.insert(bone.id, index).is_some() {
                return Err(MocapError::InvalidHierarchy(format!(
                    "duplicate bone id {} ('{}')",
                    bone.id, bone.name
                )));
            }
        }

        // 解析父子关系
        let mut parent_indices: Vec<Option<usize>> = vec![None; bone_count];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); bone_count];
        let mut link_order = Vec::with_capacity(bone_count);
        for link in links {
            let parent = *name_to_index
                .get(&link.parent)
                .ok_or_else(|| MocapError::UnknownBone {
                    line: link.line,
                    name: link.parent.clone(),
                })?;
            let child = *name_to_index
                .get(&link.child)
                .ok_or_else(|| MocapError::UnknownBone {
                    line: link.line,
                    name: link.child.clone(),
                })?;
            if child == 0 {
                return Err(MocapError::Parse {
                    line: link.line,
                    message: format!("'{}' cannot be a child", ROOT_NAME),
                });
            }
            if parent_indices[child].is_some() {
                return Err(MocapError::Parse {
                    line: link.line,
                    message: format!("bone '{}' already has a parent", link.child),
                });
            }
            parent_indices[child] = Some(parent);
            children[parent].push(child);
            link_order.push(child);
        }

        // 自根骨骼广度优先遍历，未访问到的骨骼处于环中或与根不连通
        let mut evaluation_order = Vec::with_capacity(bone_count);
        let mut visited = vec![false; bone_count];
        let mut queue = VecDeque::from([0usize]);
        visited[0] = true;
        while let Some(index) = queue.pop_front() {
            evaluation_order.push(index);
            for &child in &children[index] {
                if !visited[child] {
                    visited[child] = true;
                    queue.push_back(child);
                }
            }
        }
        if let Some(orphan) = visited.iter().position(|v| !v) {
            return Err(MocapError::InvalidHierarchy(format!(
                "bone '{}' is not reachable from '{}'",
                bones[orphan].name, ROOT_NAME
            )));
        }

        // 父 id 与静止变换，按求值顺序保证父骨骼先算
        for &index in &evaluation_order {
            if let Some(parent) = parent_indices[index] {
                let parent_id = bones[parent].id;
                let parent_axis = bones[parent].axis_matrix();
                let bone = &mut bones[index];
                bone.parent = Some(parent_id);
                bone.update_rest_transform(&parent_axis);
            } else {
                let bone = &mut bones[index];
                bone.parent = None;
                bone.rot_parent_current = bone.axis_matrix();
            }
        }

        let animated_bones: Vec<usize> = link_order
            .into_iter()
            .filter(|&i| !bones[i].dof.is_empty())
            .collect();
        let moving_bone_count = animated_bones
            .iter()
            .filter(|&&i| bones[i].dof.has_rotation())
            .count();

        log::debug!(
            "骨架 '{}' 组装完成: {} 个骨骼, {} 个运动骨骼",
            name,
            bone_count,
            moving_bone_count
        );

        Ok(Self {
            name,
            bones,
            parent_indices,
            children,
            name_to_index,
            id_to_index,
            evaluation_order,
            animated_bones,
            moving_bone_count,
            root_order,
            rotation_order,
            units,
            root_position,
            offset: SkeletonOffset::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 骨骼数量（含根）
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn root(&self) -> &Bone {
        &self.bones[0]
    }

    /// 按表索引取骨骼
    pub fn bone_by_index(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn bone_by_id(&self, id: u32) -> Option<&Bone> {
        self.index_by_id(id).map(|i| &self.bones[i])
    }

    pub fn bone_by_name(&self, name: &str) -> Option<&Bone> {
        self.index_by_name(name).map(|i| &self.bones[i])
    }

    pub fn id_by_name(&self, name: &str) -> Option<u32> {
        self.index_by_name(name).map(|i| self.bones[i].id)
    }

    pub fn name_by_id(&self, id: u32) -> Option<&str> {
        self.bone_by_id(id).map(|b| b.name.as_str())
    }

    pub fn index_by_name(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn index_by_id(&self, id: u32) -> Option<usize> {
        self.id_to_index.get(&id).copied()
    }

    /// 父骨骼的表索引
    pub fn parent_index(&self, index: usize) -> Option<usize> {
        self.parent_indices.get(index).copied().flatten()
    }

    /// 直接子骨骼的表索引，按层级段中的顺序
    pub fn children(&self, index: usize) -> &[usize] {
        self.children.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 父骨骼在前的遍历顺序
    pub fn evaluation_order(&self) -> &[usize] {
        &self.evaluation_order
    }

    /// 动作数据中出现的非根骨骼（有任意自由度）
    pub fn animated_bones(&self) -> &[usize] {
        &self.animated_bones
    }

    /// 至少有一个旋转自由度的非根骨骼数量
    pub fn moving_bone_count(&self) -> usize {
        self.moving_bone_count
    }

    /// 根骨骼在动作数据中的通道顺序
    pub fn root_order(&self) -> &[Channel] {
        &self.root_order
    }

    pub fn rotation_order(&self) -> RotationOrder {
        self.rotation_order
    }

    pub fn units(&self) -> &Units {
        &self.units
    }

    pub fn root_position(&self) -> DVec3 {
        self.root_position
    }

    pub fn set_root_position(&mut self, position: DVec3) {
        self.root_position = position;
    }

    pub fn offset(&self) -> SkeletonOffset {
        self.offset
    }

    pub fn set_offset(&mut self, offset: SkeletonOffset) {
        self.offset = offset;
    }

    /// 重新导出层级：每个有子骨骼的父骨骼名及其子骨骼名
    pub fn hierarchy(&self) -> Vec<(String, Vec<String>)> {
        self.evaluation_order
            .iter()
            .filter(|&&i| !self.children[i].is_empty())
            .map(|&i| {
                let names = self.children[i]
                    .iter()
                    .map(|&c| self.bones[c].name.clone())
                    .collect();
                (self.bones[i].name.clone(), names)
            })
            .collect()
    }
}
