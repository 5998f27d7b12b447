//! 会话管理
//!
//! 每个连接一个会话：`Connecting → Assigned(Side) → Disconnected`。
//! 同时最多两个已分配阵营的会话，断开后立即释放阵营。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use protocol::{Side, SessionId, MAX_PLAYERS};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// 已连接，尚未分配阵营
    Connecting,
    /// 已分配阵营
    Assigned(Side),
    /// 已断开
    Disconnected,
}

/// 会话信息
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub peer_addr: Option<String>,
    pub status: SessionStatus,
}

impl Session {
    pub fn new(id: SessionId, peer_addr: Option<String>) -> Self {
        Self {
            id,
            peer_addr,
            status: SessionStatus::Connecting,
        }
    }

    /// 已分配的阵营
    pub fn side(&self) -> Option<Side> {
        match self.status {
            SessionStatus::Assigned(side) => Some(side),
            _ => None,
        }
    }
}

/// 会话注册表
pub struct SessionRegistry {
    /// 会话 ID -> 会话信息（只保存在线会话）
    sessions: HashMap<SessionId, Session>,
    /// ID 生成器
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// 生成新的会话 ID
    fn generate_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// 第一个未被占用的阵营（A 优先）
    fn free_side(&self) -> Option<Side> {
        Side::ALL
            .into_iter()
            .find(|side| self.holder_of(*side).is_none())
    }

    /// 为新连接分配阵营，人数已满返回 None
    pub fn assign(&mut self, peer_addr: Option<String>) -> Option<(SessionId, Side)> {
        if self.is_full() {
            return None;
        }
        let side = self.free_side()?;

        let mut session = Session::new(self.generate_id(), peer_addr);
        session.status = SessionStatus::Assigned(side);
        let id = session.id;
        self.sessions.insert(id, session);

        Some((id, side))
    }

    /// 会话断开，释放其阵营
    pub fn disconnect(&mut self, session_id: SessionId) -> Option<Session> {
        let mut session = self.sessions.remove(&session_id)?;
        session.status = SessionStatus::Disconnected;
        Some(session)
    }

    /// 获取会话的阵营
    pub fn side_of(&self, session_id: SessionId) -> Option<Side> {
        self.sessions.get(&session_id).and_then(Session::side)
    }

    /// 获取持有指定阵营的会话
    pub fn holder_of(&self, side: Side) -> Option<SessionId> {
        self.sessions
            .values()
            .find(|s| s.side() == Some(side))
            .map(|s| s.id)
    }

    /// 已分配阵营的会话数
    pub fn assigned_count(&self) -> usize {
        self.sessions.values().filter(|s| s.side().is_some()).count()
    }

    /// 是否已满
    pub fn is_full(&self) -> bool {
        self.assigned_count() >= MAX_PLAYERS
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
