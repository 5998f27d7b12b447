//! 消息类型定义
//!
//! 线上格式为带 `type` 判别字段的 JSON 对象。

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::piece::Side;

/// 会话 ID
pub type SessionId = u64;

/// 客户端发送给服务端的消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// 走棋
    ///
    /// 字段保持原始文本，解析失败按无效走法处理，而不是丢弃整条消息。
    Move {
        character: String,
        #[serde(rename = "newPosition")]
        new_position: String,
    },
}

/// 服务端发送给客户端的消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// 人数已满，随后断开连接
    Full,
    /// 分配的阵营
    Player { player: Side },
    /// 完整棋盘快照
    GameState {
        #[serde(rename = "gameState")]
        game_state: String,
    },
    /// 走棋被拒绝
    InvalidMove,
}

impl ServerMessage {
    /// 由棋盘生成快照消息
    pub fn game_state(board: &Board) -> Self {
        ServerMessage::GameState {
            game_state: board.to_state_token(),
        }
    }
}
