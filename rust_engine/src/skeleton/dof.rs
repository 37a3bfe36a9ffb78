//! 自由度通道

/// 单个动画通道
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Rx,
    Ry,
    Rz,
    Tx,
    Ty,
    Tz,
    /// 沿骨骼方向的长度变化
    L,
}

impl Channel {
    /// 动作数据中的固定通道顺序
    pub const ALL: [Channel; 7] = [
        Channel::Rx,
        Channel::Ry,
        Channel::Rz,
        Channel::Tx,
        Channel::Ty,
        Channel::Tz,
        Channel::L,
    ];

    /// 解析通道标记，大小写不敏感（`:root order` 使用大写）
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "rx" => Some(Channel::Rx),
            "ry" => Some(Channel::Ry),
            "rz" => Some(Channel::Rz),
            "tx" => Some(Channel::Tx),
            "ty" => Some(Channel::Ty),
            "tz" => Some(Channel::Tz),
            "l" => Some(Channel::L),
            _ => None,
        }
    }

    fn bit(self) -> u8 {
        match self {
            Channel::Rx => 1 << 0,
            Channel::Ry => 1 << 1,
            Channel::Rz => 1 << 2,
            Channel::Tx => 1 << 3,
            Channel::Ty => 1 << 4,
            Channel::Tz => 1 << 5,
            Channel::L => 1 << 6,
        }
    }

    pub fn is_rotation(self) -> bool {
        matches!(self, Channel::Rx | Channel::Ry | Channel::Rz)
    }
}

/// 骨骼接受的通道集合
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DofMask {
    bits: u8,
}

impl DofMask {
    pub fn empty() -> Self {
        Self::default()
    }

    /// 根骨骼：三个旋转加三个平移
    pub fn full() -> Self {
        let mut mask = Self::empty();
        for channel in &Channel::ALL[..6] {
            mask.insert(*channel);
        }
        mask
    }

    /// 加入通道，已存在时返回 false
    pub fn insert(&mut self, channel: Channel) -> bool {
        let fresh = !self.contains(channel);
        self.bits |= channel.bit();
        fresh
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.bits & channel.bit() != 0
    }

    /// 启用的通道，按固定顺序 rx ry rz tx ty tz l
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        Channel::ALL.iter().copied().filter(move |c| self.contains(*c))
    }

    /// 每帧需要读取的数值个数
    pub fn count(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn has_rotation(&self) -> bool {
        self.channels().any(Channel::is_rotation)
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}
