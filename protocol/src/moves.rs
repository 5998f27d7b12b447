//! 走法生成和验证
//!
//! 候选走法只看棋子种类和位置，不看棋盘；占用情况由合法性过滤处理。

use crate::board::Board;
use crate::error::RuleError;
use crate::piece::{MoveRule, PieceId, PieceKind, Side};
use crate::position::Position;

/// 直走方向：上、下、左、右
const ORTHOGONAL: [(i8, i8); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// 斜走方向：左上、右上、左下、右下
const DIAGONAL: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];

/// 走法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    /// 走动的棋子
    pub piece: PieceId,
    /// 起始位置
    pub from: Position,
    /// 目标位置
    pub to: Position,
    /// 被吃的棋子（如果有）
    pub captured: Option<PieceId>,
}

impl Move {
    /// 创建新走法
    pub fn new(piece: PieceId, from: Position, to: Position) -> Self {
        Self {
            piece,
            from,
            to,
            captured: None,
        }
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} -> {}", self.piece, self.from, self.to)
    }
}

/// 走法生成器
pub struct MoveGenerator;

impl MoveGenerator {
    /// 生成候选目标格（不考虑占用）
    pub fn candidates(kind: PieceKind, from: Position) -> Vec<Position> {
        let (directions, distance) = match kind.rule() {
            MoveRule::Step => (ORTHOGONAL, 1),
            MoveRule::Leap => (ORTHOGONAL, 2),
            MoveRule::DiagonalLeap => (DIAGONAL, 2),
        };

        directions
            .iter()
            .filter_map(|&(d_row, d_col)| from.offset(d_row * distance, d_col * distance))
            .collect()
    }

    /// 生成合法目标格：候选格中去掉己方占据的格子
    ///
    /// 空格和对方棋子所在格都是合法的，后者即吃子。
    pub fn legal_moves(board: &Board, piece: PieceId, from: Position) -> Vec<Position> {
        Self::candidates(piece.kind, from)
            .into_iter()
            .filter(|&to| !Self::is_self_occupied(board, piece.side, to))
            .collect()
    }

    /// 目标格是否被指定阵营的棋子占据
    fn is_self_occupied(board: &Board, side: Side, to: Position) -> bool {
        board.get(to).is_some_and(|occupant| occupant.belongs_to(side))
    }

    /// 校验一次走棋请求
    ///
    /// 检查顺序：归属、是否在棋盘上、是否在候选格中、是否被己方占据。
    /// 全部通过时返回待执行的走法，棋盘不被修改。
    pub fn validate(board: &Board, mover: Side, piece: PieceId, to: Position) -> Result<Move, RuleError> {
        if !piece.belongs_to(mover) {
            return Err(RuleError::WrongSide {
                piece: piece.to_string(),
                side: mover.to_string(),
            });
        }

        let from = board
            .locate(piece)
            .ok_or_else(|| RuleError::PieceNotFound(piece.to_string()))?;

        if !Self::candidates(piece.kind, from).contains(&to) {
            return Err(RuleError::IllegalDestination {
                piece: piece.to_string(),
                to: to.to_string(),
            });
        }

        if let Some(occupant) = board.get(to).filter(|occupant| occupant.belongs_to(mover)) {
            return Err(RuleError::SelfOccupied {
                to: to.to_string(),
                occupant: occupant.to_string(),
            });
        }

        let mut mv = Move::new(piece, from, to);
        mv.captured = board.get(to);
        Ok(mv)
    }
}
