//! 错误类型定义

use thiserror::Error;

/// 走棋规则错误
///
/// 所有变体对客户端都表现为同一条 `invalidMove` 消息，区分它们只为日志和测试。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// 格子地址格式错误或越界
    #[error("Malformed cell address: {0:?}")]
    MalformedAddress(String),

    /// 棋盘上没有这个棋子（包括无法解析的棋子标识）
    #[error("Piece not found: {0:?}")]
    PieceNotFound(String),

    /// 目标格不在该棋子的候选走法中
    #[error("Illegal destination {to} for {piece}")]
    IllegalDestination { piece: String, to: String },

    /// 目标格被己方棋子占据
    #[error("Destination {to} is occupied by own piece {occupant}")]
    SelfOccupied { to: String, occupant: String },

    /// 请求方不拥有该棋子
    #[error("Piece {piece} does not belong to side {side}")]
    WrongSide { piece: String, side: String },
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化错误
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket 错误
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// 协议版本不匹配
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u8, actual: u8 },

    /// 帧大小超限
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,

    /// 无效的状态串
    #[error("Invalid state token: {reason}")]
    InvalidStateToken { reason: String },

    /// 规则错误
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),
}

impl ProtocolError {
    /// 是否只是一条坏消息（连接本身仍可用）
    pub fn is_malformed_message(&self) -> bool {
        matches!(self, ProtocolError::Json(_))
    }
}

/// 配置错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 配置值无效
    #[error("Invalid config: {reason}")]
    Invalid { reason: String },
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
