//! 棋盘状态

use std::collections::HashSet;

use crate::constants::CELL_COUNT;
use crate::error::{ProtocolError, Result};
use crate::piece::{PieceId, PieceKind, Side};
use crate::position::Position;

/// 初始布局：A 方占第 0 行，B 方占第 4 行（镜像排列）
const INITIAL_LAYOUT: [(u8, u8, Side, PieceKind); 10] = [
    (0, 0, Side::A, PieceKind::P1),
    (0, 1, Side::A, PieceKind::P2),
    (0, 2, Side::A, PieceKind::P3),
    (0, 3, Side::A, PieceKind::H1),
    (0, 4, Side::A, PieceKind::H2),
    (4, 0, Side::B, PieceKind::H2),
    (4, 1, Side::B, PieceKind::H1),
    (4, 2, Side::B, PieceKind::P3),
    (4, 3, Side::B, PieceKind::P2),
    (4, 4, Side::B, PieceKind::P1),
];

/// 棋盘
///
/// 唯一的权威状态。格子到棋子的映射，空格为 None。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    /// 5x5 棋盘，索引为 row * 5 + col
    squares: [Option<PieceId>; CELL_COUNT],
}

impl Board {
    /// 创建空棋盘
    pub fn empty() -> Self {
        Self {
            squares: [None; CELL_COUNT],
        }
    }

    /// 创建初始棋盘
    pub fn initial() -> Self {
        let mut board = Self::empty();
        for (row, col, side, kind) in INITIAL_LAYOUT {
            board.set(Position::new_unchecked(row, col), Some(PieceId::new(side, kind)));
        }
        board
    }

    /// 获取指定位置的棋子
    pub fn get(&self, pos: Position) -> Option<PieceId> {
        if pos.is_valid() {
            self.squares[pos.to_index()]
        } else {
            None
        }
    }

    /// 设置指定位置的棋子
    ///
    /// 只用于布局和测试；对局中的修改一律走 [`Board::apply_move`]。
    pub fn set(&mut self, pos: Position, piece: Option<PieceId>) {
        if pos.is_valid() {
            self.squares[pos.to_index()] = piece;
        }
    }

    /// 查找棋子所在位置（线性扫描）
    pub fn locate(&self, piece: PieceId) -> Option<Position> {
        self.squares
            .iter()
            .position(|square| *square == Some(piece))
            .and_then(Position::from_index)
    }

    /// 移动棋子（不检查规则），返回被吃掉的棋子
    ///
    /// 先清空起点再写入终点，终点原有棋子被覆盖。
    pub fn apply_move(&mut self, piece: PieceId, from: Position, to: Position) -> Option<PieceId> {
        debug_assert_eq!(self.get(from), Some(piece));
        let captured = self.get(to);
        self.set(from, None);
        self.set(to, Some(piece));
        captured
    }

    /// 获取所有棋子（行优先）
    pub fn pieces(&self) -> Vec<(Position, PieceId)> {
        self.squares
            .iter()
            .enumerate()
            .filter_map(|(index, square)| {
                let piece = (*square)?;
                Position::from_index(index).map(|pos| (pos, piece))
            })
            .collect()
    }

    /// 棋盘上的棋子数
    pub fn len(&self) -> usize {
        self.squares.iter().filter(|square| square.is_some()).count()
    }

    /// 棋盘是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 序列化为状态串：`格子:棋子` 以逗号连接，每个有子的格子恰好出现一次
    pub fn to_state_token(&self) -> String {
        self.pieces()
            .iter()
            .map(|(pos, piece)| format!("{pos}:{piece}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// 从状态串解析棋盘
    pub fn from_state_token(token: &str) -> Result<Self> {
        let mut board = Self::empty();
        if token.is_empty() {
            return Ok(board);
        }

        let mut seen = HashSet::new();
        for pair in token.split(',') {
            let (cell, piece) = pair.split_once(':').ok_or_else(|| invalid(format!(
                "missing ':' in {pair:?}"
            )))?;
            let pos = Position::decode(cell)?;
            let piece = PieceId::parse(piece)?;

            if board.get(pos).is_some() {
                return Err(invalid(format!("cell {pos} appears twice")));
            }
            if !seen.insert(piece) {
                return Err(invalid(format!("piece {piece} appears twice")));
            }
            board.set(pos, Some(piece));
        }

        Ok(board)
    }
}

fn invalid(reason: String) -> ProtocolError {
    ProtocolError::InvalidStateToken { reason }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece(s: &str) -> PieceId {
        s.parse().unwrap()
    }

    fn pos(s: &str) -> Position {
        s.parse().unwrap()
    }

    #[test]
    fn test_initial_board() {
        let board = Board::initial();

        assert_eq!(board.len(), 10);
        assert_eq!(board.get(pos("row0-col0")), Some(piece("A-P1")));
        assert_eq!(board.get(pos("row0-col3")), Some(piece("A-H1")));
        assert_eq!(board.get(pos("row4-col0")), Some(piece("B-H2")));
        assert_eq!(board.get(pos("row4-col4")), Some(piece("B-P1")));
        assert_eq!(board.get(pos("row2-col2")), None);
    }

    #[test]
    fn test_initial_state_token() {
        let board = Board::initial();
        assert_eq!(
            board.to_state_token(),
            "row0-col0:A-P1,row0-col1:A-P2,row0-col2:A-P3,row0-col3:A-H1,row0-col4:A-H2,\
             row4-col0:B-H2,row4-col1:B-H1,row4-col2:B-P3,row4-col3:B-P2,row4-col4:B-P1"
        );
    }

    #[test]
    fn test_locate() {
        let board = Board::initial();
        assert_eq!(board.locate(piece("A-H2")), Some(pos("row0-col4")));
        assert_eq!(board.locate(piece("B-P2")), Some(pos("row4-col3")));

        assert_eq!(Board::empty().locate(piece("A-P1")), None);
    }

    #[test]
    fn test_apply_move() {
        let mut board = Board::initial();
        let mover = piece("A-P1");

        let captured = board.apply_move(mover, pos("row0-col0"), pos("row1-col0"));
        assert!(captured.is_none());

        assert_eq!(board.locate(mover), Some(pos("row1-col0")));
        assert_eq!(board.get(pos("row0-col0")), None);
        assert_eq!(board.len(), 10);
    }

    #[test]
    fn test_apply_move_captures() {
        let mut board = Board::empty();
        board.set(pos("row2-col2"), Some(piece("A-P2")));
        board.set(pos("row3-col2"), Some(piece("B-P2")));

        let captured = board.apply_move(piece("A-P2"), pos("row2-col2"), pos("row3-col2"));
        assert_eq!(captured, Some(piece("B-P2")));
        assert_eq!(board.len(), 1);
        assert_eq!(board.locate(piece("B-P2")), None);
        assert_eq!(board.to_state_token(), "row3-col2:A-P2");
    }

    #[test]
    fn test_state_token_is_complete() {
        let board = Board::initial();
        let token = board.to_state_token();

        let pairs: Vec<&str> = token.split(',').collect();
        assert_eq!(pairs.len(), board.len());
        for (pos, piece) in board.pieces() {
            let pair = format!("{pos}:{piece}");
            assert_eq!(pairs.iter().filter(|p| **p == pair).count(), 1);
        }
    }

    #[test]
    fn test_state_token_parse() {
        let board = Board::initial();
        let parsed = Board::from_state_token(&board.to_state_token()).unwrap();
        assert_eq!(parsed, board);

        assert_eq!(Board::from_state_token("").unwrap(), Board::empty());
    }

    #[test]
    fn test_state_token_rejects_bad_input() {
        assert!(Board::from_state_token("row0-col0").is_err());
        assert!(Board::from_state_token("row9-col0:A-P1").is_err());
        assert!(Board::from_state_token("row0-col0:X-P1").is_err());
        assert!(Board::from_state_token("row0-col0:A-P1,row0-col0:A-P2").is_err());
        assert!(Board::from_state_token("row0-col0:A-P1,row0-col1:A-P1").is_err());
    }

    #[test]
    fn test_every_cell_addressable() {
        let mut board = Board::empty();
        let piece = piece("A-P3");
        for cell in Position::all() {
            assert_eq!(board.get(cell), None);
            board.set(cell, Some(piece));
            assert_eq!(board.get(cell), Some(piece));
            assert_eq!(board.locate(piece), Some(cell));
            board.set(cell, None);
        }
        assert!(board.is_empty());

        // 越界地址读写都是空操作
        let outside = Position::new_unchecked(5, 0);
        board.set(outside, Some(piece));
        assert_eq!(board.get(outside), None);
        assert!(board.is_empty());
    }

    #[test]
    fn test_empty_board_token() {
        let board = Board::empty();
        assert!(board.is_empty());
        assert_eq!(board.to_state_token(), "");
    }
}
