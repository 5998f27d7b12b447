//! 协议常量定义

use std::time::Duration;

/// 协议版本号（TCP 帧头使用）
pub const PROTOCOL_VERSION: u8 = 1;

/// 棋盘边长（行数 = 列数）
pub const BOARD_SIZE: u8 = 5;

/// 棋盘格子总数
pub const CELL_COUNT: usize = (BOARD_SIZE as usize) * (BOARD_SIZE as usize);

/// 一局对战的最大玩家数
pub const MAX_PLAYERS: usize = 2;

/// 消息帧最大大小
pub const MAX_FRAME_SIZE: usize = 65536;

/// 默认监听端口
pub const DEFAULT_PORT: u16 = 8080;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);
