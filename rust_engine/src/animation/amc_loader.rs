//! AMC (Acclaim Motion Capture) 动作文件解析
//!
//! 每帧以单独一行的帧号开始，随后每行为 `骨骼名 数值...`。
//! 根骨骼数值按 `:root order` 排列；其余骨骼按固定通道顺序
//! rx ry rz tx ty tz l 给出已启用的通道。

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::MocapConfig;
use crate::skeleton::{AngleUnit, Channel, Skeleton};
use crate::{MocapError, Result};

use super::{Motion, Posture};

/// 正在解析的帧
struct PendingFrame {
    line: usize,
    posture: Posture,
    seen: Vec<bool>,
}

impl Motion {
    /// 从文件加载 AMC
    pub fn load<P: AsRef<Path>>(
        path: P,
        skeleton: Arc<Skeleton>,
        config: &MocapConfig,
    ) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, skeleton, config)
    }

    /// 解析 AMC 文本；任何错误都会丢弃整个结果
    pub fn parse(text: &str, skeleton: Arc<Skeleton>, config: &MocapConfig) -> Result<Self> {
        let mut angle_unit = skeleton.units().angle;
        let mut postures: Vec<Posture> = Vec::new();
        let mut pending: Option<PendingFrame> = None;
        let mut last_line = 0;

        for (i, raw) in text.lines().enumerate() {
            let line_no = i + 1;
            last_line = line_no;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with(':') {
                if pending.is_some() || !postures.is_empty() {
                    return Err(MocapError::Parse {
                        line: line_no,
                        message: format!("header '{}' after frame data", line),
                    });
                }
                match line.to_ascii_uppercase().as_str() {
                    ":FULLY-SPECIFIED" => {}
                    ":DEGREES" => angle_unit = AngleUnit::Degrees,
                    ":RADIANS" => angle_unit = AngleUnit::Radians,
                    other => log::warn!("AMC 第 {} 行: 忽略未知标记 '{}'", line_no, other),
                }
                continue;
            }

            if let Some(frame) = parse_frame_index(line) {
                if let Some(done) = pending.take() {
                    postures.push(finish_frame(done, &skeleton, line_no)?);
                }
                if let Some(previous) = postures.last() {
                    if previous.frame().checked_add(1) != Some(frame) {
                        return Err(MocapError::Parse {
                            line: line_no,
                            message: format!(
                                "frame {} does not follow frame {}",
                                frame,
                                previous.frame()
                            ),
                        });
                    }
                }
                if postures.len() >= config.max_frames {
                    return Err(MocapError::Capacity {
                        what: "frames",
                        limit: config.max_frames,
                    });
                }
                pending = Some(PendingFrame {
                    line: line_no,
                    posture: Posture::new(frame, skeleton.bone_count()),
                    seen: vec![false; skeleton.bone_count()],
                });
                continue;
            }

            let frame = pending.as_mut().ok_or_else(|| MocapError::Parse {
                line: line_no,
                message: "bone data before the first frame index".to_string(),
            })?;
            parse_bone_line(line, line_no, frame, &skeleton, angle_unit, config.scale)?;
        }

        if let Some(done) = pending.take() {
            postures.push(finish_frame(done, &skeleton, last_line)?);
        }

        log::info!(
            "AMC 解析完成: {} 帧, {} 个骨骼",
            postures.len(),
            skeleton.bone_count()
        );

        Motion::from_postures(skeleton, postures, config.frames_per_second)
    }
}

/// 只有一个非负整数的行为帧号
fn parse_frame_index(line: &str) -> Option<u32> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    if tokens.next().is_some() {
        return None;
    }
    first.parse::<u32>().ok()
}

fn parse_bone_line(
    line: &str,
    line_no: usize,
    frame: &mut PendingFrame,
    skeleton: &Skeleton,
    angle_unit: AngleUnit,
    scale: f64,
) -> Result<()> {
    let mut tokens = line.split_whitespace();
    let name = tokens.next().unwrap_or_default();
    let values = tokens
        .map(|token| {
            token.parse::<f64>().map_err(|_| MocapError::Parse {
                line: line_no,
                message: format!("invalid number '{}' for bone '{}'", token, name),
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    let index = skeleton
        .index_by_name(name)
        .ok_or_else(|| MocapError::UnknownBone {
            line: line_no,
            name: name.to_string(),
        })?;
    if frame.seen[index] {
        return Err(MocapError::Parse {
            line: line_no,
            message: format!("bone '{}' appears twice in frame {}", name, frame.posture.frame()),
        });
    }
    frame.seen[index] = true;

    let channels: Vec<Channel> = if index == 0 {
        skeleton.root_order().to_vec()
    } else {
        skeleton.bones()[index].dof.channels().collect()
    };
    if values.len() != channels.len() {
        return Err(MocapError::Parse {
            line: line_no,
            message: format!(
                "bone '{}' expects {} values, found {}",
                name,
                channels.len(),
                values.len()
            ),
        });
    }

    let posture = &mut frame.posture;
    for (channel, value) in channels.into_iter().zip(values) {
        let angle = angle_unit.to_degrees(value);
        match (index, channel) {
            (0, Channel::Tx) => posture.root_position_mut().x = value * scale,
            (0, Channel::Ty) => posture.root_position_mut().y = value * scale,
            (0, Channel::Tz) => posture.root_position_mut().z = value * scale,
            (_, Channel::Rx) => posture.rotation_mut(index).x = angle,
            (_, Channel::Ry) => posture.rotation_mut(index).y = angle,
            (_, Channel::Rz) => posture.rotation_mut(index).z = angle,
            (_, Channel::Tx) => posture.translation_mut(index).x = value * scale,
            (_, Channel::Ty) => posture.translation_mut(index).y = value * scale,
            (_, Channel::Tz) => posture.translation_mut(index).z = value * scale,
            (_, Channel::L) => *posture.length_mut(index) = value * scale,
        }
    }
    Ok(())
}

/// 校验整帧：根骨骼与所有带自由度的骨骼都必须出现
fn finish_frame(frame: PendingFrame, skeleton: &Skeleton, line_no: usize) -> Result<Posture> {
    let required = std::iter::once(0).chain(skeleton.animated_bones().iter().copied());
    for index in required {
        if !frame.seen[index] {
            return Err(MocapError::Parse {
                line: line_no,
                message: format!(
                    "frame {} (line {}) has no data for bone '{}'",
                    frame.posture.frame(),
                    frame.line,
                    skeleton.bones()[index].name
                ),
            });
        }
    }
    Ok(frame.posture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    const ASF: &str = "\
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
    dof rz
  end
  begin
    id 2
    name hand
    direction 0 1 0
    length 1
    axis 0 0 0 XYZ
    dof rx tx l
  end
  begin
    id 3
    name finger
    direction 0 1 0
    length 1
    axis 0 0 0 XYZ
  end
:hierarchy
  begin
    root upperarm
    upperarm hand
    hand finger
  end
";

    const AMC: &str = "\
# generated
:FULLY-SPECIFIED
:DEGREES
1
root 1 2 3 0 0 0
upperarm 90
hand 10 0.5 2
2
root 1 2 4 0 0 0
hand 20 0.5 2
upperarm 45
";

    fn config() -> MocapConfig {
        MocapConfig {
            scale: 1.0,
            ..MocapConfig::default()
        }
    }

    fn skeleton() -> Arc<Skeleton> {
        Arc::new(Skeleton::parse(ASF, &config()).unwrap())
    }

    #[test]
    fn test_parse_frames() {
        let motion = Motion::parse(AMC, skeleton(), &config()).unwrap();
        assert_eq!(motion.frame_count(), 2);
        assert_eq!(motion.first_frame(), Some(1));

        let first = motion.posture(0).unwrap();
        assert_eq!(first.root_position(), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(first.bone_rotation(1), Some(DVec3::new(0.0, 0.0, 90.0)));
        assert_eq!(first.bone_rotation(2), Some(DVec3::new(10.0, 0.0, 0.0)));
        assert_eq!(first.bone_translation(2), Some(DVec3::new(0.5, 0.0, 0.0)));
        assert_eq!(first.bone_length(2), Some(2.0));

        // 第二帧的骨骼行顺序不同
        let second = motion.posture(1).unwrap();
        assert_eq!(second.frame(), 2);
        assert_eq!(second.bone_rotation(1), Some(DVec3::new(0.0, 0.0, 45.0)));
    }

    #[test]
    fn test_single_rotation_channel_value_count() {
        let ok = "1\nroot 0 0 0 0 0 0\nupperarm 30\nhand 0 0 0\n";
        assert!(Motion::parse(ok, skeleton(), &config()).is_ok());

        let none = "1\nroot 0 0 0 0 0 0\nupperarm\nhand 0 0 0\n";
        let err = Motion::parse(none, skeleton(), &config()).unwrap_err();
        assert!(matches!(err, MocapError::Parse { line: 3, .. }));

        let two = "1\nroot 0 0 0 0 0 0\nupperarm 30 40\nhand 0 0 0\n";
        let err = Motion::parse(two, skeleton(), &config()).unwrap_err();
        assert!(matches!(err, MocapError::Parse { line: 3, .. }));
    }

    #[test]
    fn test_frame_discontinuity() {
        let text = AMC.replace("\n2\n", "\n4\n");
        let err = Motion::parse(&text, skeleton(), &config()).unwrap_err();
        assert!(matches!(err, MocapError::Parse { line: 8, .. }));
    }

    #[test]
    fn test_frame_index_does_not_wrap() {
        let text = "4294967295\nroot 0 0 0 0 0 0\nupperarm 0\nhand 0 0 0\n\
                    0\nroot 0 0 0 0 0 0\nupperarm 0\nhand 0 0 0\n";
        let err = Motion::parse(text, skeleton(), &config()).unwrap_err();
        assert!(matches!(err, MocapError::Parse { line: 5, .. }));
    }

    #[test]
    fn test_missing_bone_in_frame() {
        let text = "1\nroot 0 0 0 0 0 0\nupperarm 30\n";
        let err = Motion::parse(text, skeleton(), &config()).unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_duplicate_bone_in_frame() {
        let text = "1\nroot 0 0 0 0 0 0\nupperarm 30\nupperarm 30\nhand 0 0 0\n";
        assert!(Motion::parse(text, skeleton(), &config()).is_err());
    }

    #[test]
    fn test_unknown_bone() {
        let text = "1\nroot 0 0 0 0 0 0\nHead 30\n";
        let err = Motion::parse(text, skeleton(), &config()).unwrap_err();
        assert!(matches!(err, MocapError::UnknownBone { line: 3, .. }));
    }

    #[test]
    fn test_bad_number() {
        let text = "1\nroot 0 0 0 0 0 x\n";
        let err = Motion::parse(text, skeleton(), &config()).unwrap_err();
        assert!(matches!(err, MocapError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_frame_capacity() {
        let config = MocapConfig {
            max_frames: 1,
            ..config()
        };
        let err = Motion::parse(AMC, skeleton(), &config).unwrap_err();
        assert!(matches!(err, MocapError::Capacity { what: "frames", limit: 1 }));
    }

    #[test]
    fn test_radians_header() {
        let text = ":RADIANS\n1\nroot 0 0 0 0 0 0\nupperarm 3.141592653589793\nhand 0 0 0\n";
        let motion = Motion::parse(text, skeleton(), &config()).unwrap();
        let rz = motion.posture(0).unwrap().bone_rotation(1).unwrap().z;
        assert!((rz - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_root_order_respected() {
        let asf = ASF.replace("order TX TY TZ RX RY RZ", "order RX RY RZ TX TY TZ");
        let skeleton = Arc::new(Skeleton::parse(&asf, &config()).unwrap());
        let text = "1\nroot 10 20 30 1 2 3\nupperarm 0\nhand 0 0 0\n";
        let motion = Motion::parse(text, skeleton, &config()).unwrap();
        let posture = motion.posture(0).unwrap();
        assert_eq!(posture.root_position(), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(posture.bone_rotation(0), Some(DVec3::new(10.0, 20.0, 30.0)));
    }
}
