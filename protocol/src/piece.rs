//! 棋子定义

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// 阵营
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// A 方（先连接，在第 0 行）
    A,
    /// B 方（后连接，在第 4 行）
    B,
}

impl Side {
    /// 全部阵营，按分配顺序
    pub const ALL: [Side; 2] = [Side::A, Side::B];

    /// 文本标记
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::A => "A",
            Side::B => "B",
        }
    }

    /// 从文本标记解析
    pub fn from_tag(tag: &str) -> Option<Side> {
        match tag {
            "A" => Some(Side::A),
            "B" => Some(Side::B),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 走法规则类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveRule {
    /// 直走一格
    Step,
    /// 直跳两格
    Leap,
    /// 斜跳两格
    DiagonalLeap,
}

/// 棋子种类
///
/// P1-P3 是三个普通兵，H1、H2 是两种英雄。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    P1,
    P2,
    P3,
    H1,
    H2,
}

impl PieceKind {
    /// 全部种类
    pub const ALL: [PieceKind; 5] = [
        PieceKind::P1,
        PieceKind::P2,
        PieceKind::P3,
        PieceKind::H1,
        PieceKind::H2,
    ];

    /// 该种类使用的走法规则
    pub fn rule(&self) -> MoveRule {
        match self {
            PieceKind::P1 | PieceKind::P2 | PieceKind::P3 => MoveRule::Step,
            PieceKind::H1 => MoveRule::Leap,
            PieceKind::H2 => MoveRule::DiagonalLeap,
        }
    }

    /// 文本标记
    pub fn as_str(&self) -> &'static str {
        match self {
            PieceKind::P1 => "P1",
            PieceKind::P2 => "P2",
            PieceKind::P3 => "P3",
            PieceKind::H1 => "H1",
            PieceKind::H2 => "H2",
        }
    }

    /// 从文本标记解析
    pub fn from_tag(tag: &str) -> Option<PieceKind> {
        PieceKind::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

/// 棋子标识，形如 `A-P1`
///
/// 每个标识在棋盘上至多出现一次，前缀即所属阵营。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PieceId {
    pub side: Side,
    pub kind: PieceKind,
}

impl PieceId {
    /// 创建新棋子
    pub const fn new(side: Side, kind: PieceKind) -> Self {
        Self { side, kind }
    }

    /// 检查是否属于指定阵营
    pub fn belongs_to(&self, side: Side) -> bool {
        self.side == side
    }

    /// 解析棋子标识；任何无法识别的标识都视为棋盘上不存在
    pub fn parse(s: &str) -> Result<Self, RuleError> {
        let not_found = || RuleError::PieceNotFound(s.to_string());
        let (side, kind) = s.split_once('-').ok_or_else(not_found)?;
        let side = Side::from_tag(side).ok_or_else(not_found)?;
        let kind = PieceKind::from_tag(kind).ok_or_else(not_found)?;
        Ok(PieceId::new(side, kind))
    }
}

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.side, self.kind.as_str())
    }
}

impl FromStr for PieceId {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PieceId::parse(s)
    }
}

impl TryFrom<String> for PieceId {
    type Error = RuleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PieceId::parse(&value)
    }
}

impl From<PieceId> for String {
    fn from(piece: PieceId) -> Self {
        piece.to_string()
    }
}
