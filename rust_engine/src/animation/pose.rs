//! 姿态求值：把单帧姿态与骨架静止姿态组合为各骨骼的世界变换
//!
//! 对骨骼 b（父骨骼 p）:
//! `W_b = W_p · T(tip_p) · R_pc(b) · M_b · T(t_b)`，
//! 根骨骼: `W_root = T(offset + root_position) · R(offset) · C_root · M_root`。
//! 姿态中骨骼未启用的通道一律按零处理。

use glam::{DMat4, DVec3};

use crate::math;
use crate::skeleton::{Channel, DofMask, Skeleton, SkeletonOffset};
use crate::{MocapError, Result};

use super::Posture;

/// 单个骨骼的求值结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointTransform {
    /// 骨骼局部坐标系到世界坐标系
    pub world: DMat4,
    /// 关节起点（世界坐标）
    pub start: DVec3,
    /// 骨骼末端（世界坐标）
    pub end: DVec3,
}

impl Default for JointTransform {
    fn default() -> Self {
        Self {
            world: DMat4::IDENTITY,
            start: DVec3::ZERO,
            end: DVec3::ZERO,
        }
    }
}

/// 整个骨架的求值结果，索引与骨骼表对齐
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkeletonPose {
    joints: Vec<JointTransform>,
}

impl SkeletonPose {
    pub fn joints(&self) -> &[JointTransform] {
        &self.joints
    }

    pub fn joint(&self, index: usize) -> Option<&JointTransform> {
        self.joints.get(index)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }
}

/// 使用骨架当前偏移求值
pub fn evaluate(skeleton: &Skeleton, posture: &Posture) -> Result<SkeletonPose> {
    evaluate_with_offset(skeleton, posture, skeleton.offset())
}

/// 自顶向下单次遍历，父骨骼总是先于子骨骼
pub fn evaluate_with_offset(
    skeleton: &Skeleton,
    posture: &Posture,
    offset: SkeletonOffset,
) -> Result<SkeletonPose> {
    check_alignment(skeleton, posture)?;

    let mut joints = vec![JointTransform::default(); skeleton.bone_count()];
    for &index in skeleton.evaluation_order() {
        let parent_world = skeleton.parent_index(index).map(|p| joints[p].world);
        joints[index] = joint_from_parent(skeleton, posture, index, parent_world, offset);
    }
    Ok(SkeletonPose { joints })
}

/// 只沿祖先链计算单个骨骼的世界变换
pub fn bone_world_transform(
    skeleton: &Skeleton,
    posture: &Posture,
    index: usize,
) -> Result<Option<JointTransform>> {
    check_alignment(skeleton, posture)?;
    if index >= skeleton.bone_count() {
        return Ok(None);
    }

    let mut chain = vec![index];
    let mut current = index;
    while let Some(parent) = skeleton.parent_index(current) {
        chain.push(parent);
        current = parent;
    }

    let offset = skeleton.offset();
    let mut joint: Option<JointTransform> = None;
    for &bone in chain.iter().rev() {
        let parent_world = joint.map(|j| j.world);
        joint = Some(joint_from_parent(skeleton, posture, bone, parent_world, offset));
    }
    Ok(joint)
}

fn check_alignment(skeleton: &Skeleton, posture: &Posture) -> Result<()> {
    if posture.bone_count() != skeleton.bone_count() {
        return Err(MocapError::PostureMismatch {
            expected: skeleton.bone_count(),
            found: posture.bone_count(),
        });
    }
    Ok(())
}

fn joint_from_parent(
    skeleton: &Skeleton,
    posture: &Posture,
    index: usize,
    parent_world: Option<DMat4>,
    offset: SkeletonOffset,
) -> JointTransform {
    let bones = skeleton.bones();
    let bone = &bones[index];
    let order = skeleton.rotation_order();

    let rotation = masked(
        &bone.dof,
        posture.rotations()[index],
        [Channel::Rx, Channel::Ry, Channel::Rz],
    );
    let translation = masked(
        &bone.dof,
        posture.translations()[index],
        [Channel::Tx, Channel::Ty, Channel::Tz],
    );
    let motion = math::euler_matrix(rotation, order) * DMat4::from_translation(translation);

    let world = match (skeleton.parent_index(index), parent_world) {
        (Some(parent), Some(parent_world)) => {
            let tip = bones[parent].local_tip(extra_length(&bones[parent].dof, posture, parent));
            parent_world * DMat4::from_translation(tip) * bone.rot_parent_current * motion
        }
        _ => {
            DMat4::from_translation(offset.translation + posture.root_position())
                * math::euler_matrix(offset.rotation, order)
                * bone.rot_parent_current
                * motion
        }
    };

    JointTransform {
        world,
        start: math::transform_affine(&world, DVec3::ZERO),
        end: math::transform_affine(
            &world,
            bone.local_tip(extra_length(&bone.dof, posture, index)),
        ),
    }
}

/// 只保留骨骼接受的通道，其余分量置零
fn masked(dof: &DofMask, value: DVec3, channels: [Channel; 3]) -> DVec3 {
    let pick = |channel: Channel, v: f64| if dof.contains(channel) { v } else { 0.0 };
    DVec3::new(
        pick(channels[0], value.x),
        pick(channels[1], value.y),
        pick(channels[2], value.z),
    )
}

fn extra_length(dof: &DofMask, posture: &Posture, index: usize) -> f64 {
    if dof.contains(Channel::L) {
        posture.lengths()[index]
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MocapConfig;

    const TWO_BONE_ASF: &str = "\
:units
  angle deg
:root
  order TX TY TZ RX RY RZ
  axis XYZ
  position 0 0 0
  orientation 0 0 0
:bonedata
  begin
    id 1
    name upperarm
    direction 0 1 0
    length 5
    axis 0 0 0 XYZ
    dof rz l
  end
  begin
    id 2
    name forearm
    direction 0 1 0
    length 3
    axis 0 0 0 XYZ
    dof rx
  end
  begin
    id 3
    name spine
    direction 0 0 1
    length 2
    axis 0 0 0 XYZ
    dof rx ry rz
  end
:hierarchy
  begin
    root upperarm spine
    upperarm forearm
  end
";

    fn skeleton() -> Skeleton {
        let config = MocapConfig {
            scale: 1.0,
            ..MocapConfig::default()
        };
        Skeleton::parse(TWO_BONE_ASF, &config).unwrap()
    }

    #[test]
    fn test_upperarm_rotated_about_z() {
        let skeleton = skeleton();
        let upperarm = skeleton.index_by_name("upperarm").unwrap();
        let mut posture = Posture::rest(&skeleton);
        posture.set_bone_rotation(upperarm, DVec3::new(0.0, 0.0, 90.0));

        let pose = evaluate(&skeleton, &posture).unwrap();
        let joint = pose.joint(upperarm).unwrap();
        // 右手系：+Y 绕 Z 转 90° 得到 -X
        assert!(joint.start.abs_diff_eq(DVec3::ZERO, 1e-9));
        assert!(joint.end.abs_diff_eq(DVec3::new(-5.0, 0.0, 0.0), 1e-9));

        let forearm = pose.joint(skeleton.index_by_name("forearm").unwrap()).unwrap();
        assert!(forearm.start.abs_diff_eq(DVec3::new(-5.0, 0.0, 0.0), 1e-9));
        assert!(forearm.end.abs_diff_eq(DVec3::new(-8.0, 0.0, 0.0), 1e-9));
    }

    #[test]
    fn test_rest_pose_chains_bones() {
        let skeleton = skeleton();
        let pose = evaluate(&skeleton, &Posture::rest(&skeleton)).unwrap();
        let forearm = pose.joint(skeleton.index_by_name("forearm").unwrap()).unwrap();
        assert!(forearm.start.abs_diff_eq(DVec3::new(0.0, 5.0, 0.0), 1e-9));
        assert!(forearm.end.abs_diff_eq(DVec3::new(0.0, 8.0, 0.0), 1e-9));
    }

    #[test]
    fn test_root_translation_and_offset() {
        let mut skeleton = skeleton();
        skeleton.set_offset(SkeletonOffset {
            translation: DVec3::new(0.0, 0.0, 10.0),
            rotation: DVec3::ZERO,
        });
        let mut posture = Posture::rest(&skeleton);
        posture.set_root_position(DVec3::new(1.0, 0.0, 0.0));
        let pose = evaluate(&skeleton, &posture).unwrap();
        let upperarm = pose.joint(1).unwrap();
        assert!(upperarm.end.abs_diff_eq(DVec3::new(1.0, 5.0, 10.0), 1e-9));
    }

    #[test]
    fn test_length_channel_extends_bone() {
        let skeleton = skeleton();
        let mut posture = Posture::rest(&skeleton);
        posture.set_bone_length(1, 1.0);
        let pose = evaluate(&skeleton, &posture).unwrap();
        assert!(pose.joint(1).unwrap().end.abs_diff_eq(DVec3::new(0.0, 6.0, 0.0), 1e-9));
        assert!(pose.joint(2).unwrap().start.abs_diff_eq(DVec3::new(0.0, 6.0, 0.0), 1e-9));
    }

    #[test]
    fn test_disabled_channels_are_ignored() {
        let skeleton = skeleton();
        let upperarm = skeleton.index_by_name("upperarm").unwrap();
        let forearm = skeleton.index_by_name("forearm").unwrap();
        let mut posture = Posture::rest(&skeleton);
        // upperarm 只接受 rz 与 l，forearm 只接受 rx
        posture.set_bone_rotation(upperarm, DVec3::new(90.0, 45.0, 0.0));
        posture.set_bone_translation(upperarm, DVec3::new(1.0, 2.0, 3.0));
        posture.set_bone_length(forearm, 4.0);

        let pose = evaluate(&skeleton, &posture).unwrap();
        assert!(pose.joint(upperarm).unwrap().end.abs_diff_eq(DVec3::new(0.0, 5.0, 0.0), 1e-9));
        assert!(pose.joint(forearm).unwrap().end.abs_diff_eq(DVec3::new(0.0, 8.0, 0.0), 1e-9));
    }

    #[test]
    fn test_sibling_subtrees_are_independent() {
        let skeleton = skeleton();
        let mut posture = Posture::rest(&skeleton);
        posture.set_bone_rotation(1, DVec3::new(0.0, 0.0, 45.0));
        posture.set_bone_rotation(2, DVec3::new(30.0, 0.0, 0.0));
        posture.set_bone_rotation(3, DVec3::new(10.0, 20.0, 30.0));

        let full = evaluate(&skeleton, &posture).unwrap();
        for index in 0..skeleton.bone_count() {
            let single = bone_world_transform(&skeleton, &posture, index)
                .unwrap()
                .unwrap();
            assert!(single.world.abs_diff_eq(full.joint(index).unwrap().world, 1e-12));
        }

        // 修改 spine 分支不影响 forearm
        let mut other = posture.clone();
        other.set_bone_rotation(3, DVec3::new(-80.0, 5.0, 0.0));
        let changed = evaluate(&skeleton, &other).unwrap();
        assert_eq!(changed.joint(2), full.joint(2));
    }

    #[test]
    fn test_misaligned_posture_rejected() {
        let skeleton = skeleton();
        let err = evaluate(&skeleton, &Posture::new(0, 2)).unwrap_err();
        assert!(matches!(err, MocapError::PostureMismatch { expected: 4, found: 2 }));
    }

    #[test]
    fn test_out_of_range_bone_query() {
        let skeleton = skeleton();
        let posture = Posture::rest(&skeleton);
        assert!(bone_world_transform(&skeleton, &posture, 99).unwrap().is_none());
    }
}
