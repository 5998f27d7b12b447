//! 五路棋中继服务端
//!
//! 包含:
//! - 会话管理（阵营分配与释放）
//! - 广播
//! - 对局（棋盘、校验、落子）
//! - 连接处理与监听循环

pub mod broadcast;
pub mod room;
pub mod server;
pub mod session;

pub use broadcast::{outbox, Broadcaster, Inbox, Outbox, OUTBOX_CAPACITY};
pub use room::{JoinOutcome, Room};
pub use server::{handle_connection, MessageHandler, Server, SharedRoom};
pub use session::{Session, SessionRegistry, SessionStatus};
