//! 传输层抽象
//!
//! 提供 Connector/Connection/Listener traits 使上层协议与具体传输实现解耦。
//! 默认使用 WebSocket（每条消息一个 JSON 文本帧），另有带长度前缀的 TCP 帧实现。

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::error::CapacityError;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

use crate::error::{ProtocolError, Result};
use crate::{CONNECT_TIMEOUT, MAX_FRAME_SIZE, PROTOCOL_VERSION};

/// 读端抽象（连接拆分后由读取任务持有）
#[async_trait]
pub trait MessageReader: Send + 'static {
    /// 接收消息
    async fn recv<M: DeserializeOwned>(&mut self) -> Result<M>;
}

/// 写端抽象（连接拆分后由写入任务持有）
#[async_trait]
pub trait MessageWriter: Send + 'static {
    /// 发送消息
    async fn send<M: Serialize + Send + Sync>(&mut self, msg: &M) -> Result<()>;

    /// 关闭连接
    async fn close(&mut self) -> Result<()>;
}

/// 连接抽象 trait（核心抽象，用于业务层）
#[async_trait]
pub trait Connection: Send {
    type Reader: MessageReader;
    type Writer: MessageWriter;

    /// 发送消息
    async fn send<M: Serialize + Send + Sync>(&mut self, msg: &M) -> Result<()>;

    /// 接收消息
    async fn recv<M: DeserializeOwned>(&mut self) -> Result<M>;

    /// 关闭连接
    async fn close(&mut self) -> Result<()>;

    /// 获取远端地址
    fn peer_addr(&self) -> Option<String>;

    /// 分离读写端
    fn split(self) -> (Self::Reader, Self::Writer)
    where
        Self: Sized;
}

/// 连接器 trait（客户端使用）
#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Connection;

    /// 建立连接
    async fn connect(&self, addr: &str) -> Result<Self::Conn>;
}

/// 监听器 trait（服务端使用）
///
/// 接受和握手分两步：`accept_incoming` 只取出底层连接，立即返回；
/// `handshake` 可能等待对端，应放在每个连接自己的任务里执行。
#[async_trait]
pub trait Listener: Send + Sync + Sized {
    type Conn: Connection + 'static;
    type Incoming: Send + 'static;

    /// 绑定地址
    async fn bind(addr: &str) -> Result<Self>;

    /// 接受底层连接，不做握手
    async fn accept_incoming(&mut self) -> Result<Self::Incoming>;

    /// 在底层连接上完成握手
    async fn handshake(incoming: Self::Incoming) -> Result<Self::Conn>;

    /// 接受连接并完成握手
    async fn accept(&mut self) -> Result<Self::Conn> {
        let incoming = self.accept_incoming().await?;
        Self::handshake(incoming).await
    }

    /// 获取本地地址
    fn local_addr(&self) -> Option<String>;
}

async fn connect_tcp(addr: &str) -> Result<TcpStream> {
    let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| ProtocolError::ConnectionTimeout)?
        .map_err(ProtocolError::Io)?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

// ============================================================================
// WebSocket 实现
// ============================================================================

type WsStream = WebSocketStream<TcpStream>;

/// 对端正常断开的错误统一为 ConnectionClosed，超长消息统一为 FrameTooLarge
fn map_ws_error(err: tungstenite::Error) -> ProtocolError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            ProtocolError::ConnectionClosed
        }
        tungstenite::Error::Capacity(CapacityError::MessageTooLong { size, max_size }) => {
            ProtocolError::FrameTooLarge {
                size,
                max: max_size,
            }
        }
        err => ProtocolError::WebSocket(err),
    }
}

/// 服务端 WebSocket 配置：单条消息和单帧都不超过 MAX_FRAME_SIZE
fn ws_config() -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(MAX_FRAME_SIZE);
    config.max_frame_size = Some(MAX_FRAME_SIZE);
    config
}

fn check_frame_size(size: usize) -> Result<()> {
    if size > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(())
}

/// WebSocket 读端
pub struct WsReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl MessageReader for WsReader {
    async fn recv<M: DeserializeOwned>(&mut self) -> Result<M> {
        loop {
            let frame = match self.stream.next().await {
                Some(frame) => frame.map_err(map_ws_error)?,
                None => return Err(ProtocolError::ConnectionClosed),
            };

            match frame {
                Message::Text(text) => {
                    check_frame_size(text.len())?;
                    return Ok(serde_json::from_str(&text)?);
                }
                Message::Binary(bytes) => {
                    check_frame_size(bytes.len())?;
                    return Ok(serde_json::from_slice(&bytes)?);
                }
                Message::Close(_) => return Err(ProtocolError::ConnectionClosed),
                // 控制帧由 tungstenite 自动应答
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }
}

/// WebSocket 写端
pub struct WsWriter {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl MessageWriter for WsWriter {
    async fn send<M: Serialize + Send + Sync>(&mut self, msg: &M) -> Result<()> {
        let text = serde_json::to_string(msg)?;
        check_frame_size(text.len())?;
        self.sink.send(Message::Text(text)).await.map_err(map_ws_error)
    }

    async fn close(&mut self) -> Result<()> {
        match self.sink.close().await.map_err(map_ws_error) {
            Err(ProtocolError::ConnectionClosed) => Ok(()),
            result => result,
        }
    }
}

/// WebSocket 连接
pub struct WsConnection {
    reader: WsReader,
    writer: WsWriter,
    peer_addr: Option<String>,
}

impl WsConnection {
    fn new(stream: WsStream, peer_addr: Option<String>) -> Self {
        let (sink, stream) = stream.split();
        Self {
            reader: WsReader { stream },
            writer: WsWriter { sink },
            peer_addr,
        }
    }

    /// 对 TcpStream 完成服务端握手（服务端使用）
    pub async fn accept(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr().ok().map(|a| a.to_string());
        let handshake = tokio_tungstenite::accept_async_with_config(stream, Some(ws_config()));
        let ws = timeout(CONNECT_TIMEOUT, handshake)
            .await
            .map_err(|_| ProtocolError::ConnectionTimeout)?
            .map_err(map_ws_error)?;
        debug!(peer = ?peer_addr, "websocket handshake completed");
        Ok(Self::new(ws, peer_addr))
    }
}

#[async_trait]
impl Connection for WsConnection {
    type Reader = WsReader;
    type Writer = WsWriter;

    async fn send<M: Serialize + Send + Sync>(&mut self, msg: &M) -> Result<()> {
        self.writer.send(msg).await
    }

    async fn recv<M: DeserializeOwned>(&mut self) -> Result<M> {
        self.reader.recv().await
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.close().await
    }

    fn peer_addr(&self) -> Option<String> {
        self.peer_addr.clone()
    }

    fn split(self) -> (WsReader, WsWriter) {
        (self.reader, self.writer)
    }
}

/// WebSocket 连接器
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    type Conn = WsConnection;

    async fn connect(&self, addr: &str) -> Result<Self::Conn> {
        let stream = connect_tcp(addr).await?;
        let peer_addr = stream.peer_addr().ok().map(|a| a.to_string());
        let (ws, _response) = tokio_tungstenite::client_async(format!("ws://{addr}/"), stream)
            .await
            .map_err(map_ws_error)?;
        Ok(WsConnection::new(ws, peer_addr))
    }
}

/// WebSocket 监听器
pub struct WsListener {
    listener: tokio::net::TcpListener,
}

#[async_trait]
impl Listener for WsListener {
    type Conn = WsConnection;
    type Incoming = TcpStream;

    async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(ProtocolError::Io)?;
        Ok(Self { listener })
    }

    async fn accept_incoming(&mut self) -> Result<TcpStream> {
        let (stream, _addr) = self.listener.accept().await.map_err(ProtocolError::Io)?;
        Ok(stream)
    }

    async fn handshake(stream: TcpStream) -> Result<Self::Conn> {
        WsConnection::accept(stream).await
    }

    fn local_addr(&self) -> Option<String> {
        self.listener.local_addr().ok().map(|a| a.to_string())
    }
}

// ============================================================================
// TCP 实现
// ============================================================================

/// TCP 连接器
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Conn = TcpConnection;

    async fn connect(&self, addr: &str) -> Result<Self::Conn> {
        let stream = connect_tcp(addr).await?;
        TcpConnection::from_stream(stream)
    }
}

/// TCP 连接
pub struct TcpConnection {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
    peer_addr: Option<String>,
}

impl TcpConnection {
    /// 从 TcpStream 创建（服务端使用）
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr().ok().map(|a| a.to_string());
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: FrameReader::new(read_half),
            writer: FrameWriter::new(write_half),
            peer_addr,
        })
    }
}

#[async_trait]
impl Connection for TcpConnection {
    type Reader = FrameReader<OwnedReadHalf>;
    type Writer = FrameWriter<OwnedWriteHalf>;

    async fn send<M: Serialize + Send + Sync>(&mut self, msg: &M) -> Result<()> {
        self.writer.write_frame(msg).await
    }

    async fn recv<M: DeserializeOwned>(&mut self) -> Result<M> {
        self.reader.read_frame().await
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.close().await
    }

    fn peer_addr(&self) -> Option<String> {
        self.peer_addr.clone()
    }

    fn split(self) -> (Self::Reader, Self::Writer) {
        (self.reader, self.writer)
    }
}

/// TCP 监听器
pub struct TcpListener {
    listener: tokio::net::TcpListener,
}

#[async_trait]
impl Listener for TcpListener {
    type Conn = TcpConnection;
    type Incoming = TcpStream;

    async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(ProtocolError::Io)?;
        Ok(Self { listener })
    }

    async fn accept_incoming(&mut self) -> Result<TcpStream> {
        let (stream, _addr) = self.listener.accept().await.map_err(ProtocolError::Io)?;
        Ok(stream)
    }

    // 帧协议没有握手
    async fn handshake(stream: TcpStream) -> Result<Self::Conn> {
        TcpConnection::from_stream(stream)
    }

    fn local_addr(&self) -> Option<String> {
        self.listener.local_addr().ok().map(|a| a.to_string())
    }
}

// ============================================================================
// 帧编解码
// ============================================================================

/// 帧头大小: 1 字节版本 + 4 字节长度
const HEADER_SIZE: usize = 5;

fn map_eof(e: std::io::Error) -> ProtocolError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ProtocolError::ConnectionClosed
    } else {
        ProtocolError::Io(e)
    }
}

/// 帧读取器
pub struct FrameReader<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin + Send> FrameReader<R> {
    /// 创建新的帧读取器
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
        }
    }

    /// 读取并解码一帧消息
    ///
    /// 消息体解析失败时整帧已被读走，连接仍可继续使用。
    pub async fn read_frame<M: DeserializeOwned>(&mut self) -> Result<M> {
        let mut header = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut header).await.map_err(map_eof)?;

        let version = header[0];
        if version != PROTOCOL_VERSION {
            debug!(version, "frame with unexpected protocol version");
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                actual: version,
            });
        }

        // 长度为大端序
        let length = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
        check_frame_size(length)?;

        if self.buffer.len() < length {
            self.buffer.resize(length, 0);
        }
        self.reader
            .read_exact(&mut self.buffer[..length])
            .await
            .map_err(map_eof)?;

        Ok(serde_json::from_slice(&self.buffer[..length])?)
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send + 'static> MessageReader for FrameReader<R> {
    async fn recv<M: DeserializeOwned>(&mut self) -> Result<M> {
        self.read_frame().await
    }
}

/// 帧写入器
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    /// 创建新的帧写入器
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 编码并写入一帧消息
    pub async fn write_frame<M: Serialize>(&mut self, msg: &M) -> Result<()> {
        let payload = serde_json::to_vec(msg)?;
        check_frame_size(payload.len())?;

        let length = payload.len() as u32;
        let mut header = [0u8; HEADER_SIZE];
        header[0] = PROTOCOL_VERSION;
        header[1..5].copy_from_slice(&length.to_be_bytes());

        self.writer.write_all(&header).await?;
        self.writer.write_all(&payload).await?;
        self.writer.flush().await?;

        Ok(())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send + 'static> MessageWriter for FrameWriter<W> {
    async fn send<M: Serialize + Send + Sync>(&mut self, msg: &M) -> Result<()> {
        self.write_frame(msg).await
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
