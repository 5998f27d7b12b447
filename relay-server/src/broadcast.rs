//! 广播
//!
//! 订阅者列表：会话 ID -> 出站消息通道。通道有界，投递用 `try_send`，
//! 持有对局锁时不会等待慢连接；队列已满的订阅者被移除，其连接随后关闭。
//! 各连接收到的顺序与提交顺序一致。

use std::collections::HashMap;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use protocol::{ServerMessage, SessionId};

/// 每个连接最多积压的出站消息数
pub const OUTBOX_CAPACITY: usize = 64;

/// 出站消息发送端
pub type Outbox = mpsc::Sender<ServerMessage>;

/// 出站消息接收端（由连接的写入任务持有）
pub type Inbox = mpsc::Receiver<ServerMessage>;

/// 创建一对出站通道
pub fn outbox() -> (Outbox, Inbox) {
    mpsc::channel(OUTBOX_CAPACITY)
}

/// 投递结果
enum Delivery {
    Sent,
    /// 写入任务已退出
    Closed,
    /// 对端长时间不读，队列已满
    Lagging,
}

/// 广播器
#[derive(Default)]
pub struct Broadcaster {
    subscribers: HashMap<SessionId, Outbox>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加订阅者
    pub fn subscribe(&mut self, session_id: SessionId, outbox: Outbox) {
        self.subscribers.insert(session_id, outbox);
    }

    /// 移除订阅者，其通道随之关闭
    pub fn unsubscribe(&mut self, session_id: SessionId) -> bool {
        self.subscribers.remove(&session_id).is_some()
    }

    /// 是否仍在订阅
    pub fn contains(&self, session_id: SessionId) -> bool {
        self.subscribers.contains_key(&session_id)
    }

    /// 发送消息给单个会话
    pub fn send_to(&mut self, session_id: SessionId, msg: ServerMessage) -> bool {
        let Some(tx) = self.subscribers.get(&session_id) else {
            return false;
        };
        match Self::deliver(session_id, tx, msg) {
            Delivery::Sent => true,
            Delivery::Closed => false,
            Delivery::Lagging => {
                self.unsubscribe(session_id);
                false
            }
        }
    }

    /// 广播消息给所有在线会话，返回成功投递数
    pub fn broadcast(&mut self, msg: &ServerMessage) -> usize {
        let mut delivered = 0;
        let mut lagging = Vec::new();
        for (&session_id, tx) in &self.subscribers {
            match Self::deliver(session_id, tx, msg.clone()) {
                Delivery::Sent => delivered += 1,
                Delivery::Closed => {}
                Delivery::Lagging => lagging.push(session_id),
            }
        }
        for session_id in lagging {
            self.unsubscribe(session_id);
        }
        delivered
    }

    fn deliver(session_id: SessionId, tx: &Outbox, msg: ServerMessage) -> Delivery {
        match tx.try_send(msg) {
            Ok(()) => Delivery::Sent,
            // 写入任务已退出，会话稍后由读取端清理
            Err(TrySendError::Closed(_)) => {
                debug!(session_id, "outbox closed, message dropped");
                Delivery::Closed
            }
            Err(TrySendError::Full(_)) => {
                warn!(session_id, capacity = OUTBOX_CAPACITY, "outbox full, dropping subscriber");
                Delivery::Lagging
            }
        }
    }

    /// 订阅者数量
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
