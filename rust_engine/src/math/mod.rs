//! 向量 / 矩阵基础运算
//!
//! 所有角度参数以度为单位，内部转换为弧度。
//! 矩阵均为仿射形式（最后一行固定为 0 0 0 1），列主序（glam 约定）。

use glam::{DMat4, DVec3, DVec4};

use crate::{MocapError, Result};

/// 坐标轴
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// 欧拉角组合顺序
///
/// 名称表示施加顺序：`Xyz` 先绕 X，再绕 Y，最后绕 Z，即 `M = Rz * Ry * Rx`。
/// `Zyx` 先绕 Z，即 `M = Rx * Ry * Rz`。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RotationOrder {
    #[default]
    Xyz,
    Xzy,
    Yxz,
    Yzx,
    Zxy,
    Zyx,
}

impl RotationOrder {
    /// 解析 ASF 中的顺序标记（如 `XYZ`），大小写不敏感
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "XYZ" => Some(Self::Xyz),
            "XZY" => Some(Self::Xzy),
            "YXZ" => Some(Self::Yxz),
            "YZX" => Some(Self::Yzx),
            "ZXY" => Some(Self::Zxy),
            "ZYX" => Some(Self::Zyx),
            _ => None,
        }
    }

    /// 按施加顺序返回三个轴
    pub fn axes(self) -> [Axis; 3] {
        match self {
            Self::Xyz => [Axis::X, Axis::Y, Axis::Z],
            Self::Xzy => [Axis::X, Axis::Z, Axis::Y],
            Self::Yxz => [Axis::Y, Axis::X, Axis::Z],
            Self::Yzx => [Axis::Y, Axis::Z, Axis::X],
            Self::Zxy => [Axis::Z, Axis::X, Axis::Y],
            Self::Zyx => [Axis::Z, Axis::Y, Axis::X],
        }
    }
}

/// 绕 X 轴旋转（右手系）
pub fn rotation_x(degrees: f64) -> DMat4 {
    let (s, c) = degrees.to_radians().sin_cos();
    DMat4::from_cols(
        DVec4::new(1.0, 0.0, 0.0, 0.0),
        DVec4::new(0.0, c, s, 0.0),
        DVec4::new(0.0, -s, c, 0.0),
        DVec4::W,
    )
}

/// 绕 Y 轴旋转（右手系）
pub fn rotation_y(degrees: f64) -> DMat4 {
    let (s, c) = degrees.to_radians().sin_cos();
    DMat4::from_cols(
        DVec4::new(c, 0.0, -s, 0.0),
        DVec4::new(0.0, 1.0, 0.0, 0.0),
        DVec4::new(s, 0.0, c, 0.0),
        DVec4::W,
    )
}

/// 绕 Z 轴旋转（右手系）
pub fn rotation_z(degrees: f64) -> DMat4 {
    let (s, c) = degrees.to_radians().sin_cos();
    DMat4::from_cols(
        DVec4::new(c, s, 0.0, 0.0),
        DVec4::new(-s, c, 0.0, 0.0),
        DVec4::new(0.0, 0.0, 1.0, 0.0),
        DVec4::W,
    )
}

/// 绕指定轴旋转
pub fn rotation_about(axis: Axis, degrees: f64) -> DMat4 {
    match axis {
        Axis::X => rotation_x(degrees),
        Axis::Y => rotation_y(degrees),
        Axis::Z => rotation_z(degrees),
    }
}

/// 由欧拉角（x, y, z 分量，单位度）构建旋转矩阵
pub fn euler_matrix(angles: DVec3, order: RotationOrder) -> DMat4 {
    order.axes().iter().fold(DMat4::IDENTITY, |acc, &axis| {
        let angle = match axis {
            Axis::X => angles.x,
            Axis::Y => angles.y,
            Axis::Z => angles.z,
        };
        rotation_about(axis, angle) * acc
    })
}

/// 用仿射矩阵变换点，只使用上方 3x4 块
pub fn transform_affine(m: &DMat4, p: DVec3) -> DVec3 {
    m.transform_point3(p)
}

/// 按欧拉角旋转向量
pub fn rotate_vector(v: DVec3, angles: DVec3, order: RotationOrder) -> DVec3 {
    euler_matrix(angles, order).transform_vector3(v)
}

pub fn cross(a: DVec3, b: DVec3) -> DVec3 {
    a.cross(b)
}

pub fn dot(a: DVec3, b: DVec3) -> f64 {
    a.dot(b)
}

/// 欧几里得范数
pub fn magnitude(a: DVec3) -> f64 {
    a.length()
}

/// 向量除以标量，除数为零时报错
pub fn checked_div(v: DVec3, s: f64) -> Result<DVec3> {
    if s == 0.0 || !s.is_finite() {
        return Err(MocapError::DivideByZero);
    }
    Ok(v / s)
}

/// 归一化，零向量报错
pub fn normalize(v: DVec3) -> Result<DVec3> {
    checked_div(v, magnitude(v))
}

/// 两向量之间的夹角（弧度，范围 [0, π]）
pub fn angle_between(v1: DVec3, v2: DVec3) -> f64 {
    let axis = cross(v1, v2);
    magnitude(axis).atan2(dot(v1, v2))
}
