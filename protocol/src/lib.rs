//! 五路棋对战共享协议库
//!
//! 包含:
//! - 格子地址、棋子、棋盘等核心数据结构
//! - 走法生成和规则验证
//! - 消息类型定义 (ClientMessage, ServerMessage)
//! - 传输层抽象 (Connector, Connection, Listener traits)
//! - WebSocket 与 TCP 帧两种传输实现
//! - 网络配置

mod board;
mod config;
mod constants;
mod error;
mod message;
mod moves;
mod piece;
mod position;
mod transport;

pub use board::Board;
pub use config::{NetworkConfig, TransportType};
pub use constants::*;
pub use error::{ConfigError, ProtocolError, Result, RuleError};
pub use message::{ClientMessage, ServerMessage, SessionId};
pub use moves::{Move, MoveGenerator};
pub use piece::{MoveRule, PieceId, PieceKind, Side};
pub use position::Position;
pub use transport::{
    Connection, Connector, Listener, MessageReader, MessageWriter,
    TcpConnection, TcpConnector, TcpListener,
    WsConnection, WsConnector, WsListener, WsReader, WsWriter,
    FrameReader, FrameWriter,
};
