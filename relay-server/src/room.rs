//! 对局
//!
//! `Room` 持有棋盘、会话注册表和广播器，是一局对战的全部状态。
//! 外部通过 `Arc<Mutex<Room>>` 串行访问，校验、落子、广播在同一次加锁内完成。

use tracing::info;

use protocol::{
    Board, Move, MoveGenerator, PieceId, Position, RuleError, ServerMessage, SessionId, Side,
};

use crate::broadcast::{Broadcaster, Outbox};
use crate::session::SessionRegistry;

/// 加入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// 分配了阵营
    Assigned { session_id: SessionId, side: Side },
    /// 人数已满
    Full,
}

/// 对局
pub struct Room {
    board: Board,
    sessions: SessionRegistry,
    subscribers: Broadcaster,
}

impl Room {
    /// 以初始布局创建对局
    pub fn new() -> Self {
        Self::with_board(Board::initial())
    }

    /// 以指定棋盘创建对局
    pub fn with_board(board: Board) -> Self {
        Self {
            board,
            sessions: SessionRegistry::new(),
            subscribers: Broadcaster::new(),
        }
    }

    /// 当前棋盘
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// 当前状态串
    pub fn state_token(&self) -> String {
        self.board.to_state_token()
    }

    /// 会话注册表
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// 在线玩家数
    pub fn player_count(&self) -> usize {
        self.sessions.assigned_count()
    }

    /// 新连接加入
    ///
    /// 成功时向该连接发送阵营和完整棋盘快照；人数已满时不登记任何状态。
    pub fn join(&mut self, peer_addr: Option<String>, outbox: Outbox) -> JoinOutcome {
        let Some((session_id, side)) = self.sessions.assign(peer_addr) else {
            return JoinOutcome::Full;
        };

        self.subscribers.subscribe(session_id, outbox);
        self.subscribers
            .send_to(session_id, ServerMessage::Player { player: side });
        self.subscribers
            .send_to(session_id, ServerMessage::game_state(&self.board));

        info!(session_id, side = %side, players = self.player_count(), "player joined");
        JoinOutcome::Assigned { session_id, side }
    }

    /// 连接断开，立即释放阵营并移除订阅
    pub fn leave(&mut self, session_id: SessionId) -> Option<Side> {
        self.subscribers.unsubscribe(session_id);
        let side = self.sessions.side_of(session_id);
        let session = self.sessions.disconnect(session_id)?;

        info!(
            session_id,
            side = ?side,
            peer = session.peer_addr.as_deref().unwrap_or("unknown"),
            players = self.player_count(),
            "player left"
        );
        side
    }

    /// 执行走棋
    ///
    /// 任何一步校验失败都不修改棋盘。
    pub fn make_move(
        &mut self,
        mover: Side,
        character: &str,
        new_position: &str,
    ) -> Result<Move, RuleError> {
        let piece = PieceId::parse(character)?;
        let to = Position::decode(new_position)?;

        let mut mv = MoveGenerator::validate(&self.board, mover, piece, to)?;
        mv.captured = self.board.apply_move(mv.piece, mv.from, mv.to);
        Ok(mv)
    }

    /// 会话是否仍有出站通道
    ///
    /// 出站队列积压满后订阅被移除，连接应随之结束。
    pub fn is_connected(&self, session_id: SessionId) -> bool {
        self.subscribers.contains(session_id)
    }

    /// 发送消息给单个会话
    pub fn send_to(&mut self, session_id: SessionId, msg: ServerMessage) -> bool {
        self.subscribers.send_to(session_id, msg)
    }

    /// 把当前棋盘快照广播给所有在线会话
    pub fn broadcast_state(&mut self) -> usize {
        let msg = ServerMessage::game_state(&self.board);
        self.subscribers.broadcast(&msg)
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new()
    }
}
