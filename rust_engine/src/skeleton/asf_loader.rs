//! ASF (Acclaim Skeleton File) 层级描述解析
//!
//! 行式文本，`:` 开头的标记引入新段；骨骼数据段由 `begin` / `end`
//! 包围的关键字行组成，层级段每行为“父骨骼名 子骨骼名...”。

use std::fs;
use std::path::Path;

use glam::DVec3;

use crate::config::MocapConfig;
use crate::math::{self, RotationOrder};
use crate::{MocapError, Result};

use super::bone::Bone;
use super::dof::Channel;
use super::manager::{AngleUnit, HierarchyLink, Skeleton, Units};

/// 当前所在段
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Preamble,
    Units,
    Root,
    BoneData,
    Hierarchy,
    Skipped,
}

/// 解析过程中的中间状态
struct AsfParser<'a> {
    config: &'a MocapConfig,
    name: String,
    units: Units,
    root: Bone,
    root_order: Vec<Channel>,
    root_position: DVec3,
    bones: Vec<Bone>,
    current: Option<(usize, Bone, bool)>,
    links: Vec<HierarchyLink>,
    hierarchy_done: bool,
    limits_open: bool,
}

impl Skeleton {
    /// 从文件加载 ASF
    pub fn load<P: AsRef<Path>>(path: P, config: &MocapConfig) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, config)
    }

    /// 解析 ASF 文本，失败时不返回任何部分结果
    pub fn parse(text: &str, config: &MocapConfig) -> Result<Self> {
        let mut parser = AsfParser::new(config);
        let mut section = Section::Preamble;

        for (i, raw) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with(':') {
                parser.close_limits();
                if section == Section::BoneData {
                    parser.ensure_no_open_block(line_no)?;
                }
                section = parser.enter_section(line, line_no)?;
                continue;
            }

            match section {
                Section::Preamble | Section::Skipped => {}
                Section::Units => parser.parse_units_line(line, line_no)?,
                Section::Root => parser.parse_root_line(line, line_no)?,
                Section::BoneData => parser.parse_bone_line(line, line_no)?,
                Section::Hierarchy => parser.parse_hierarchy_line(line, line_no)?,
            }
        }

        if section == Section::BoneData {
            parser.ensure_no_open_block(text.lines().count())?;
        }

        parser.finish()
    }
}

impl<'a> AsfParser<'a> {
    fn new(config: &'a MocapConfig) -> Self {
        let mut root = Bone::root();
        root.axis_order = config.rotation_order;
        Self {
            config,
            name: String::new(),
            units: Units::default(),
            root,
            root_order: Channel::ALL[..6].to_vec(),
            root_position: DVec3::ZERO,
            bones: Vec::new(),
            current: None,
            links: Vec::new(),
            hierarchy_done: false,
            limits_open: false,
        }
    }

    fn enter_section(&mut self, line: &str, line_no: usize) -> Result<Section> {
        let (keyword, rest) = split_keyword(line);
        let section = match keyword {
            ":name" => {
                self.name = rest.to_string();
                Section::Preamble
            }
            ":version" | ":documentation" => Section::Skipped,
            ":units" => Section::Units,
            ":root" => Section::Root,
            ":bonedata" => Section::BoneData,
            ":hierarchy" => {
                self.hierarchy_done = false;
                Section::Hierarchy
            }
            other => {
                log::warn!("ASF 第 {} 行: 未知段 '{}'，已跳过", line_no, other);
                Section::Skipped
            }
        };
        log::debug!("ASF 第 {} 行: 进入段 {:?}", line_no, section);
        Ok(section)
    }

    fn parse_units_line(&mut self, line: &str, line_no: usize) -> Result<()> {
        let (keyword, rest) = split_keyword(line);
        match keyword {
            "mass" => self.units.mass = parse_f64(rest, line_no)?,
            "length" => self.units.length = parse_f64(rest, line_no)?,
            "angle" => {
                self.units.angle = match rest {
                    "deg" => AngleUnit::Degrees,
                    "rad" => AngleUnit::Radians,
                    other => {
                        return Err(MocapError::Parse {
                            line: line_no,
                            message: format!("unknown angle unit '{}'", other),
                        })
                    }
                }
            }
            other => log::warn!("ASF 第 {} 行: 忽略未知单位 '{}'", line_no, other),
        }
        Ok(())
    }

    fn parse_root_line(&mut self, line: &str, line_no: usize) -> Result<()> {
        let (keyword, rest) = split_keyword(line);
        match keyword {
            "order" => {
                let order = rest
                    .split_whitespace()
                    .map(|token| {
                        Channel::from_token(token)
                            .filter(|c| *c != Channel::L)
                            .ok_or_else(|| MocapError::Parse {
                                line: line_no,
                                message: format!("invalid root channel '{}'", token),
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                self.root_order = order;
            }
            "axis" => {
                self.root.axis_order = parse_order(rest, line_no)?;
            }
            "position" => {
                self.root_position = parse_vec3(rest, line_no)? * self.config.scale;
            }
            "orientation" => {
                let angles = parse_vec3(rest, line_no)?;
                self.root.axis = self.angles_to_degrees(angles);
            }
            other => log::warn!("ASF 第 {} 行: 忽略 :root 关键字 '{}'", line_no, other),
        }
        Ok(())
    }

    fn parse_bone_line(&mut self, line: &str, line_no: usize) -> Result<()> {
        if line == "begin" {
            if self.current.is_some() {
                return Err(MocapError::Parse {
                    line: line_no,
                    message: "nested 'begin'".to_string(),
                });
            }
            // 根骨骼占用索引 0
            let table_len = self.bones.len() + 1;
            if table_len >= self.config.max_bones {
                return Err(MocapError::Capacity {
                    what: "bones",
                    limit: self.config.max_bones,
                });
            }
            let mut bone = Bone::new(table_len as u32, String::new());
            bone.axis_order = self.config.rotation_order;
            self.current = Some((line_no, bone, false));
            return Ok(());
        }

        if line == "end" {
            self.limits_open = false;
            let (start, bone, has_name) = self.current.take().ok_or_else(|| MocapError::Parse {
                line: line_no,
                message: "'end' without 'begin'".to_string(),
            })?;
            if !has_name {
                return Err(MocapError::Parse {
                    line: start,
                    message: "bone block has no name".to_string(),
                });
            }
            self.bones.push(bone);
            return Ok(());
        }

        let angle_unit = self.units.angle;
        let scale = self.config.scale;
        let (_, bone, has_name) = self.current.as_mut().ok_or_else(|| MocapError::Parse {
            line: line_no,
            message: format!("expected 'begin', found '{}'", line),
        })?;

        // limits 的续行
        if line.starts_with('(') && self.limits_open {
            bone.limits.push(parse_limit(line, line_no)?);
            return Ok(());
        }
        self.limits_open = false;

        let (keyword, rest) = split_keyword(line);
        match keyword {
            "id" => {
                bone.id = rest.parse::<u32>().map_err(|_| MocapError::Parse {
                    line: line_no,
                    message: format!("invalid bone id '{}'", rest),
                })?;
            }
            "name" => {
                if rest.is_empty() {
                    return Err(MocapError::Parse {
                        line: line_no,
                        message: "empty bone name".to_string(),
                    });
                }
                bone.name = rest.to_string();
                *has_name = true;
            }
            "direction" => {
                let direction = parse_vec3(rest, line_no)?;
                bone.direction = math::normalize(direction).map_err(|_| MocapError::Parse {
                    line: line_no,
                    message: "zero-length direction".to_string(),
                })?;
            }
            "length" => {
                let length = parse_f64(rest, line_no)?;
                if length < 0.0 {
                    return Err(MocapError::Parse {
                        line: line_no,
                        message: format!("negative length {}", length),
                    });
                }
                bone.length = length * scale;
            }
            "axis" => {
                let mut tokens = rest.split_whitespace();
                let angles: Vec<&str> = tokens.by_ref().take(3).collect();
                let angles = parse_vec3(&angles.join(" "), line_no)?;
                bone.axis = DVec3::new(
                    angle_unit.to_degrees(angles.x),
                    angle_unit.to_degrees(angles.y),
                    angle_unit.to_degrees(angles.z),
                );
                if let Some(order) = tokens.next() {
                    bone.axis_order = parse_order(order, line_no)?;
                }
            }
            "dof" => {
                for token in rest.split_whitespace() {
                    let channel = Channel::from_token(token).ok_or_else(|| MocapError::Parse {
                        line: line_no,
                        message: format!("unknown dof channel '{}'", token),
                    })?;
                    if !bone.dof.insert(channel) {
                        return Err(MocapError::Parse {
                            line: line_no,
                            message: format!("duplicate dof channel '{}'", token),
                        });
                    }
                }
            }
            "limits" => {
                if !rest.is_empty() {
                    bone.limits.push(parse_limit(rest, line_no)?);
                }
                self.limits_open = true;
            }
            "bodymass" | "cofmass" => {}
            other => log::warn!("ASF 第 {} 行: 忽略未知关键字 '{}'", line_no, other),
        }
        Ok(())
    }

    fn parse_hierarchy_line(&mut self, line: &str, line_no: usize) -> Result<()> {
        if self.hierarchy_done {
            log::warn!("ASF 第 {} 行: 层级段结束后的内容已忽略", line_no);
            return Ok(());
        }
        match line {
            "begin" => return Ok(()),
            "end" => {
                self.hierarchy_done = true;
                return Ok(());
            }
            _ => {}
        }
        let mut tokens = line.split_whitespace();
        let parent = tokens.next().unwrap_or_default();
        for child in tokens {
            self.links.push(HierarchyLink {
                line: line_no,
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_no_open_block(&self, line_no: usize) -> Result<()> {
        match &self.current {
            Some((start, _, _)) => Err(MocapError::Parse {
                line: line_no,
                message: format!("bone block opened at line {} is not closed", start),
            }),
            None => Ok(()),
        }
    }

    fn close_limits(&mut self) {
        self.limits_open = false;
    }

    fn angles_to_degrees(&self, angles: DVec3) -> DVec3 {
        let unit = self.units.angle;
        DVec3::new(
            unit.to_degrees(angles.x),
            unit.to_degrees(angles.y),
            unit.to_degrees(angles.z),
        )
    }

    fn finish(self) -> Result<Skeleton> {
        let mut bones = Vec::with_capacity(self.bones.len() + 1);
        bones.push(self.root);
        bones.extend(self.bones);

        let skeleton = Skeleton::assemble(
            self.name,
            bones,
            &self.links,
            self.root_order,
            self.config.rotation_order,
            self.units,
            self.root_position,
        )?;

        log::info!(
            "ASF 解析完成: {} 个骨骼, {} 个运动骨骼",
            skeleton.bone_count(),
            skeleton.moving_bone_count()
        );
        Ok(skeleton)
    }
}

/// 拆出首个关键字与其余部分
fn split_keyword(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (line, ""),
    }
}

fn parse_f64(token: &str, line_no: usize) -> Result<f64> {
    token.trim().parse::<f64>().map_err(|_| MocapError::Parse {
        line: line_no,
        message: format!("invalid number '{}'", token.trim()),
    })
}

fn parse_vec3(data: &str, line_no: usize) -> Result<DVec3> {
    let values: Vec<&str> = data.split_whitespace().collect();
    if values.len() != 3 {
        return Err(MocapError::Parse {
            line: line_no,
            message: format!("expected 3 values, found {}", values.len()),
        });
    }
    Ok(DVec3::new(
        parse_f64(values[0], line_no)?,
        parse_f64(values[1], line_no)?,
        parse_f64(values[2], line_no)?,
    ))
}

fn parse_order(token: &str, line_no: usize) -> Result<RotationOrder> {
    RotationOrder::from_token(token.trim()).ok_or_else(|| MocapError::Parse {
        line: line_no,
        message: format!("invalid rotation order '{}'", token.trim()),
    })
}

/// 解析 `(min max)`
fn parse_limit(data: &str, line_no: usize) -> Result<(f64, f64)> {
    let inner = data
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| MocapError::Parse {
            line: line_no,
            message: format!("malformed limit '{}'", data.trim()),
        })?;
    let values: Vec<&str> = inner.split_whitespace().collect();
    if values.len() != 2 {
        return Err(MocapError::Parse {
            line: line_no,
            message: format!("malformed limit '{}'", data.trim()),
        });
    }
    Ok((parse_f64(values[0], line_no)?, parse_f64(values[1], line_no)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARM_ASF: &str = "\
# test skeleton
:version 1.10
:name arm
:units
  mass 1.0
  length 1.0
  angle deg
:documentation
  anything goes here
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
     limits (-180.0 180.0)
  end
  begin
     id 2
     name forearm
     direction 0 2 0
     length 3
     axis 0 0 0 XYZ
     dof rx ry
     limits (-90 90)
            (-45 45)
  end
:hierarchy
  begin
    root upperarm
    upperarm forearm
  end
";

    fn unit_config() -> MocapConfig {
        MocapConfig {
            scale: 1.0,
            ..MocapConfig::default()
        }
    }

    #[test]
    fn test_parse_arm() {
        let skeleton = Skeleton::parse(ARM_ASF, &unit_config()).unwrap();
        assert_eq!(skeleton.name(), "arm");
        assert_eq!(skeleton.bone_count(), 3);
        assert_eq!(skeleton.moving_bone_count(), 2);

        let forearm = skeleton.bone_by_name("forearm").unwrap();
        assert_eq!(forearm.id, 2);
        assert_eq!(forearm.parent, Some(1));
        assert!(forearm.direction.abs_diff_eq(DVec3::Y, 1e-12));
        assert_eq!(forearm.length, 3.0);
        assert_eq!(forearm.dof.count(), 2);
        assert_eq!(forearm.limits, vec![(-90.0, 90.0), (-45.0, 45.0)]);

        let upperarm = skeleton.bone_by_index(1).unwrap();
        assert_eq!(upperarm.parent, Some(0));
        assert!(upperarm.dof.contains(Channel::Rz));
    }

    #[test]
    fn test_name_id_round_trip() {
        let skeleton = Skeleton::parse(ARM_ASF, &unit_config()).unwrap();
        for bone in skeleton.bones() {
            let id = skeleton.id_by_name(&bone.name).unwrap();
            assert_eq!(skeleton.name_by_id(id), Some(bone.name.as_str()));
        }
    }

    #[test]
    fn test_scale_applied_to_length() {
        let config = MocapConfig {
            scale: 0.5,
            ..MocapConfig::default()
        };
        let skeleton = Skeleton::parse(ARM_ASF, &config).unwrap();
        assert_eq!(skeleton.bone_by_name("upperarm").unwrap().length, 2.5);
    }

    #[test]
    fn test_radians_converted() {
        let text = ARM_ASF
            .replace("angle deg", "angle rad")
            .replace("axis 0 0 0 XYZ\n     dof rz", "axis 0 0 1.5707963267948966 XYZ\n     dof rz");
        let skeleton = Skeleton::parse(&text, &unit_config()).unwrap();
        let axis = skeleton.bone_by_name("upperarm").unwrap().axis;
        assert!((axis.z - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_hierarchy_name_fails() {
        let text = ARM_ASF.replace("upperarm forearm", "upperarm forearm Head");
        let err = Skeleton::parse(&text, &unit_config()).unwrap_err();
        match err {
            MocapError::UnknownBone { name, line } => {
                assert_eq!(name, "Head");
                assert_eq!(line, 38);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_bad_number_fails() {
        let text = ARM_ASF.replace("length 5", "length five");
        let err = Skeleton::parse(&text, &unit_config()).unwrap_err();
        assert!(matches!(err, MocapError::Parse { line: 20, .. }));
    }

    #[test]
    fn test_unknown_keyword_ignored() {
        let text = ARM_ASF.replace("     dof rz\n", "     dof rz\n     color red\n");
        assert!(Skeleton::parse(&text, &unit_config()).is_ok());
    }

    #[test]
    fn test_unknown_dof_token_fails() {
        let text = ARM_ASF.replace("dof rz", "dof rw");
        assert!(Skeleton::parse(&text, &unit_config()).unwrap_err().is_parse_error());
    }

    #[test]
    fn test_repeated_dof_token_fails() {
        let text = ARM_ASF.replace("dof rz", "dof rz rz");
        let err = Skeleton::parse(&text, &unit_config()).unwrap_err();
        assert!(matches!(err, MocapError::Parse { line: 22, .. }));
    }

    #[test]
    fn test_capacity_exceeded() {
        let config = MocapConfig {
            max_bones: 2,
            ..unit_config()
        };
        let err = Skeleton::parse(ARM_ASF, &config).unwrap_err();
        assert!(matches!(err, MocapError::Capacity { what: "bones", limit: 2 }));
    }

    #[test]
    fn test_unclosed_block_fails() {
        let text = ARM_ASF.replace("     limits (-90 90)\n            (-45 45)\n  end\n", "");
        assert!(Skeleton::parse(&text, &unit_config()).is_err());
    }

    #[test]
    fn test_root_section() {
        let text = ARM_ASF
            .replace("order TX TY TZ RX RY RZ", "order RX RY RZ TX TY TZ")
            .replace("position 0 0 0", "position 1 2 3");
        let skeleton = Skeleton::parse(&text, &unit_config()).unwrap();
        assert_eq!(skeleton.root_order()[0], Channel::Rx);
        assert_eq!(skeleton.root_position(), DVec3::new(1.0, 2.0, 3.0));
    }
}
