//! 棋盘格子地址
//!
//! 文本形式为 `row<R>-col<C>`，R 与 C 均为 0-4 的单个数字。
//! 序列化与解析互为逆运算，同一个格子只有一种合法写法。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{BOARD_SIZE, CELL_COUNT};
use crate::error::RuleError;

/// 棋盘位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Position {
    /// 行 (0-4)
    pub row: u8,
    /// 列 (0-4)
    pub col: u8,
}

impl Position {
    /// 创建新位置
    pub fn new(row: u8, col: u8) -> Option<Self> {
        if row < BOARD_SIZE && col < BOARD_SIZE {
            Some(Self { row, col })
        } else {
            None
        }
    }

    /// 创建新位置（不检查边界，内部使用）
    pub const fn new_unchecked(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// 检查位置是否在棋盘内
    pub fn is_valid(&self) -> bool {
        self.row < BOARD_SIZE && self.col < BOARD_SIZE
    }

    /// 获取偏移后的位置，越界返回 None
    pub fn offset(&self, d_row: i8, d_col: i8) -> Option<Position> {
        let row = self.row as i8 + d_row;
        let col = self.col as i8 + d_col;
        if row < 0 || col < 0 {
            return None;
        }
        Position::new(row as u8, col as u8)
    }

    /// 转换为数组索引（行优先）
    pub fn to_index(&self) -> usize {
        self.row as usize * BOARD_SIZE as usize + self.col as usize
    }

    /// 从数组索引转换
    pub fn from_index(index: usize) -> Option<Self> {
        if index < CELL_COUNT {
            Some(Position {
                row: (index / BOARD_SIZE as usize) as u8,
                col: (index % BOARD_SIZE as usize) as u8,
            })
        } else {
            None
        }
    }

    /// 遍历全部格子（行优先）
    pub fn all() -> impl Iterator<Item = Position> {
        (0..CELL_COUNT).filter_map(Position::from_index)
    }

    /// 编码为文本地址
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// 解析文本地址
    pub fn decode(address: &str) -> Result<Self, RuleError> {
        let malformed = || RuleError::MalformedAddress(address.to_string());

        let rest = address.strip_prefix("row").ok_or_else(malformed)?;
        let (row, col) = rest.split_once("-col").ok_or_else(malformed)?;
        let row = parse_coordinate(row).ok_or_else(malformed)?;
        let col = parse_coordinate(col).ok_or_else(malformed)?;

        Position::new(row, col).ok_or_else(malformed)
    }
}

/// 坐标必须是恰好一位数字，拒绝 "01"、"+1" 这类写法
fn parse_coordinate(s: &str) -> Option<u8> {
    match s.as_bytes() {
        [d] if d.is_ascii_digit() => Some(d - b'0'),
        _ => None,
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row{}-col{}", self.row, self.col)
    }
}

impl FromStr for Position {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::decode(s)
    }
}

impl TryFrom<String> for Position {
    type Error = RuleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Position::decode(&value)
    }
}

impl From<Position> for String {
    fn from(pos: Position) -> Self {
        pos.encode()
    }
}
