//! 网络配置

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_PORT;
use crate::error::ConfigError;

/// 传输协议类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportType {
    /// WebSocket，每条消息一个 JSON 文本帧
    WebSocket,
    /// TCP，带版本号和长度前缀的 JSON 帧
    Tcp,
}

impl TransportType {
    /// 从配置字符串解析
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ws" | "websocket" => Some(TransportType::WebSocket),
            "tcp" => Some(TransportType::Tcp),
            _ => None,
        }
    }
}

/// 网络配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub transport: TransportType,
    pub host: String,
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            transport: TransportType::WebSocket,
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl NetworkConfig {
    /// 环境变量：传输协议（ws / tcp）
    pub const ENV_TRANSPORT: &'static str = "RELAY_TRANSPORT";
    /// 环境变量：监听地址
    pub const ENV_HOST: &'static str = "RELAY_HOST";
    /// 环境变量：监听端口
    pub const ENV_PORT: &'static str = "RELAY_PORT";

    /// 从进程环境变量读取配置，未设置的项使用默认值
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取配置
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup(Self::ENV_TRANSPORT) {
            config.transport = TransportType::from_name(&name).ok_or_else(|| ConfigError::Invalid {
                reason: format!("{} must be 'ws' or 'tcp', got {name:?}", Self::ENV_TRANSPORT),
            })?;
        }
        if let Some(host) = lookup(Self::ENV_HOST) {
            config.host = host;
        }
        if let Some(port) = lookup(Self::ENV_PORT) {
            config.port = port.parse().map_err(|_| ConfigError::Invalid {
                reason: format!("{} must be a port number, got {port:?}", Self::ENV_PORT),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "host must not be empty".to_string(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                reason: "port must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// 监听地址 `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
