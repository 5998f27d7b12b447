//! 服务器主逻辑

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use protocol::{
    ClientMessage, Connection, Listener, MessageReader, MessageWriter, ProtocolError,
    ServerMessage, SessionId,
};

use crate::broadcast::{outbox, Inbox};
use crate::room::{JoinOutcome, Room};

/// accept 出现 IO 错误后的退避时间
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// 连接结束后等待写入任务发完剩余消息的上限
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// 共享的对局状态
pub type SharedRoom = Arc<Mutex<Room>>;

/// 消息处理器
pub struct MessageHandler;

impl MessageHandler {
    /// 处理客户端消息
    pub fn handle(room: &mut Room, session_id: SessionId, msg: ClientMessage) {
        match msg {
            ClientMessage::Move {
                character,
                new_position,
            } => Self::handle_move(room, session_id, &character, &new_position),
        }
    }

    /// 处理走棋：成功则广播新局面，失败只回复请求方
    fn handle_move(room: &mut Room, session_id: SessionId, character: &str, new_position: &str) {
        let Some(mover) = room.sessions().side_of(session_id) else {
            warn!(session_id, "move from unassigned session");
            room.send_to(session_id, ServerMessage::InvalidMove);
            return;
        };

        match room.make_move(mover, character, new_position) {
            Ok(mv) => {
                info!(session_id, side = %mover, "move committed: {}", mv);
                if let Some(captured) = mv.captured {
                    info!(session_id, "{} captured", captured);
                }
                room.broadcast_state();
            }
            Err(e) => {
                warn!(session_id, side = %mover, "invalid move: {}", e);
                room.send_to(session_id, ServerMessage::InvalidMove);
            }
        }
    }

    /// 处理无法解析或超长的消息，同样以无效走法回复
    pub fn handle_malformed(room: &mut Room, session_id: SessionId, err: &ProtocolError) {
        warn!(session_id, "malformed message: {}", err);
        room.send_to(session_id, ServerMessage::InvalidMove);
    }
}

/// 服务器
pub struct Server<L: Listener> {
    listener: L,
    room: SharedRoom,
}

impl<L: Listener + 'static> Server<L> {
    /// 以初始布局创建服务器
    pub fn new(listener: L) -> Self {
        Self::with_room(listener, Arc::new(Mutex::new(Room::new())))
    }

    /// 使用已有对局创建服务器
    pub fn with_room(listener: L, room: SharedRoom) -> Self {
        Self { listener, room }
    }

    /// 获取本地地址
    pub fn local_addr(&self) -> Option<String> {
        self.listener.local_addr()
    }

    /// 共享的对局状态
    pub fn room(&self) -> SharedRoom {
        Arc::clone(&self.room)
    }

    /// 接受连接直到任务被取消
    pub async fn run(mut self) {
        info!("server listening on {}", self.local_addr().unwrap_or_default());

        loop {
            match self.listener.accept_incoming().await {
                Ok(incoming) => {
                    let room = Arc::clone(&self.room);
                    tokio::spawn(async move {
                        // 握手在连接自己的任务里完成，慢连接不影响后续 accept
                        let conn = match L::handshake(incoming).await {
                            Ok(conn) => conn,
                            Err(e) => {
                                warn!("handshake failed: {}", e);
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, room).await {
                            warn!("connection ended with error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("accept failed: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

/// 处理单个连接的完整生命周期
pub async fn handle_connection<C: Connection>(conn: C, room: SharedRoom) -> protocol::Result<()> {
    let peer_addr = conn.peer_addr();
    let peer = peer_addr.clone().unwrap_or_else(|| "unknown".to_string());
    let (tx, rx) = outbox();

    let outcome = room.lock().await.join(peer_addr, tx);
    let (mut reader, mut writer) = conn.split();

    let session_id = match outcome {
        JoinOutcome::Full => {
            info!(peer = %peer, "room is full, rejecting connection");
            writer.send(&ServerMessage::Full).await?;
            writer.close().await?;
            return Ok(());
        }
        JoinOutcome::Assigned { session_id, side } => {
            info!(session_id, side = %side, peer = %peer, "connection accepted");
            session_id
        }
    };

    let mut write_task = tokio::spawn(write_loop(session_id, writer, rx));
    let result = read_loop(session_id, &mut reader, &room).await;

    // 读端结束即视为断开，同步释放阵营；订阅移除后写入任务会自行退出
    room.lock().await.leave(session_id);
    match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut write_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(session_id, "write task panicked: {}", e),
        Err(_) => {
            // 对端不读，剩余消息写不出去
            warn!(session_id, "outbox not drained in time, dropping connection");
            write_task.abort();
        }
    }

    result
}

async fn read_loop<R: MessageReader>(
    session_id: SessionId,
    reader: &mut R,
    room: &SharedRoom,
) -> protocol::Result<()> {
    loop {
        match reader.recv::<ClientMessage>().await {
            Ok(msg) => {
                debug!(session_id, ?msg, "received");
                let mut room = room.lock().await;
                MessageHandler::handle(&mut room, session_id, msg);
                if !room.is_connected(session_id) {
                    warn!(session_id, "session stopped reading, closing");
                    return Ok(());
                }
            }
            Err(e) if e.is_malformed_message() => {
                let mut room = room.lock().await;
                MessageHandler::handle_malformed(&mut room, session_id, &e);
                if !room.is_connected(session_id) {
                    warn!(session_id, "session stopped reading, closing");
                    return Ok(());
                }
            }
            Err(e @ ProtocolError::FrameTooLarge { .. }) => {
                // 超长帧之后流已不可用：回复一次后结束连接
                MessageHandler::handle_malformed(&mut *room.lock().await, session_id, &e);
                return Err(e);
            }
            Err(ProtocolError::ConnectionClosed) => {
                debug!(session_id, "connection closed by peer");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}

async fn write_loop<W: MessageWriter>(session_id: SessionId, mut writer: W, mut rx: Inbox) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = writer.send(&msg).await {
            warn!(session_id, "send failed: {}", e);
            break;
        }
    }
    let _ = writer.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{Board, Connector, Side, WsConnection, WsConnector, WsListener};
    use protocol::{FrameReader, TcpConnector, TcpListener, MAX_FRAME_SIZE, PROTOCOL_VERSION};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    async fn start_ws() -> (String, SharedRoom) {
        let listener = WsListener::bind("127.0.0.1:0").await.unwrap();
        let server = Server::new(listener);
        let addr = server.local_addr().unwrap();
        let room = server.room();
        tokio::spawn(server.run());
        (addr, room)
    }

    async fn recv<C: Connection>(conn: &mut C) -> ServerMessage {
        timeout(WAIT, conn.recv()).await.unwrap().unwrap()
    }

    fn move_msg(character: &str, new_position: &str) -> ClientMessage {
        ClientMessage::Move {
            character: character.to_string(),
            new_position: new_position.to_string(),
        }
    }

    fn token_of(msg: ServerMessage) -> String {
        match msg {
            ServerMessage::GameState { game_state } => game_state,
            other => panic!("expected gameState, got {other:?}"),
        }
    }

    /// 连接并读取阵营分配和初始快照
    async fn join(addr: &str, expected: Side) -> WsConnection {
        let mut conn = WsConnector.connect(addr).await.unwrap();
        assert_eq!(recv(&mut conn).await, ServerMessage::Player { player: expected });
        let token = token_of(recv(&mut conn).await);
        assert!(Board::from_state_token(&token).is_ok());
        conn
    }

    async fn wait_for_players(room: &SharedRoom, count: usize) {
        timeout(WAIT, async {
            while room.lock().await.player_count() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn test_handle_move_broadcasts() {
        let mut room = Room::new();
        let (tx_a, mut rx_a) = outbox();
        let (tx_b, mut rx_b) = outbox();
        room.join(None, tx_a);
        room.join(None, tx_b);
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}

        let session_a = room.sessions().holder_of(Side::A).unwrap();
        MessageHandler::handle(&mut room, session_a, move_msg("A-P1", "row1-col0"));
        let token_a = token_of(rx_a.try_recv().unwrap());
        let token_b = token_of(rx_b.try_recv().unwrap());
        assert_eq!(token_a, token_b);
        assert!(token_a.contains("row1-col0:A-P1"));
    }

    #[test]
    fn test_handle_invalid_move_replies_only_to_requester() {
        let mut room = Room::new();
        let (tx_a, mut rx_a) = outbox();
        let (tx_b, mut rx_b) = outbox();
        room.join(None, tx_a);
        room.join(None, tx_b);
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}

        let before = room.state_token();
        let session_b = room.sessions().holder_of(Side::B).unwrap();
        MessageHandler::handle(&mut room, session_b, move_msg("A-P1", "row1-col0"));

        assert_eq!(rx_b.try_recv().unwrap(), ServerMessage::InvalidMove);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(room.state_token(), before);
    }

    #[tokio::test]
    async fn test_two_players_and_full() {
        let (addr, _room) = start_ws().await;

        let _a = join(&addr, Side::A).await;
        let _b = join(&addr, Side::B).await;

        let mut third = WsConnector.connect(&addr).await.unwrap();
        assert_eq!(recv(&mut third).await, ServerMessage::Full);
        let closed: protocol::Result<ServerMessage> = timeout(WAIT, third.recv()).await.unwrap();
        assert!(closed.is_err());
    }

    #[tokio::test]
    async fn test_move_broadcast_over_websocket() {
        let (addr, _room) = start_ws().await;
        let mut a = join(&addr, Side::A).await;
        let mut b = join(&addr, Side::B).await;

        a.send(&move_msg("A-P1", "row1-col0")).await.unwrap();

        let token_a = token_of(recv(&mut a).await);
        let token_b = token_of(recv(&mut b).await);
        assert_eq!(token_a, token_b);
        assert!(token_a.contains("row1-col0:A-P1"));
        assert!(!token_a.contains("row0-col0:A-P1"));
    }

    #[tokio::test]
    async fn test_rejections_go_to_requester_only() {
        let (addr, room) = start_ws().await;
        let mut a = join(&addr, Side::A).await;
        let mut b = join(&addr, Side::B).await;
        let before = room.lock().await.state_token();

        // 己方棋子占据目标格
        a.send(&move_msg("A-H1", "row0-col1")).await.unwrap();
        assert_eq!(recv(&mut a).await, ServerMessage::InvalidMove);

        // 移动对方的棋子，目标格本身合法
        b.send(&move_msg("A-P1", "row1-col0")).await.unwrap();
        assert_eq!(recv(&mut b).await, ServerMessage::InvalidMove);

        // 不是合法消息
        b.send(&serde_json::json!({ "type": "chat", "text": "hi" })).await.unwrap();
        assert_eq!(recv(&mut b).await, ServerMessage::InvalidMove);

        assert_eq!(room.lock().await.state_token(), before);

        // A 的下一条消息就是这次广播，说明之前的拒绝没有发给 A
        b.send(&move_msg("B-P1", "row3-col4")).await.unwrap();
        let token_a = token_of(recv(&mut a).await);
        let token_b = token_of(recv(&mut b).await);
        assert_eq!(token_a, token_b);
        assert!(token_a.contains("row3-col4:B-P1"));
    }

    #[tokio::test]
    async fn test_disconnect_frees_side() {
        let (addr, room) = start_ws().await;
        let mut a = join(&addr, Side::A).await;
        let _b = join(&addr, Side::B).await;

        a.close().await.unwrap();
        drop(a);
        wait_for_players(&room, 1).await;

        let _c = join(&addr, Side::A).await;
        assert_eq!(room.lock().await.player_count(), 2);
    }

    #[tokio::test]
    async fn test_late_joiner_sees_current_state() {
        let (addr, room) = start_ws().await;
        let mut a = join(&addr, Side::A).await;

        a.send(&move_msg("A-H1", "row2-col3")).await.unwrap();
        let token = token_of(recv(&mut a).await);

        let mut b = WsConnector.connect(&addr).await.unwrap();
        assert_eq!(recv(&mut b).await, ServerMessage::Player { player: Side::B });
        assert_eq!(token_of(recv(&mut b).await), token);
        assert_eq!(room.lock().await.state_token(), token);
    }

    #[tokio::test]
    async fn test_tcp_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = Server::new(listener);
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let mut a = TcpConnector.connect(&addr).await.unwrap();
        assert_eq!(recv(&mut a).await, ServerMessage::Player { player: Side::A });
        let _initial = token_of(recv(&mut a).await);

        a.send(&move_msg("A-P3", "row1-col2")).await.unwrap();
        assert!(token_of(recv(&mut a).await).contains("row1-col2:A-P3"));
    }

    #[tokio::test]
    async fn test_idle_socket_does_not_block_join() {
        let (addr, room) = start_ws().await;

        // 只建立 TCP 连接，从不发送升级请求
        let _idle = TcpStream::connect(&addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let _a = timeout(Duration::from_secs(2), join(&addr, Side::A)).await.unwrap();
        assert_eq!(room.lock().await.player_count(), 1);
    }

    /// 连续发送往返走法，再收齐全部广播
    async fn shuttle(
        mut conn: WsConnection,
        piece: &'static str,
        there: &'static str,
        back: &'static str,
        rounds: usize,
        expected: usize,
    ) -> Vec<String> {
        for i in 0..rounds {
            let to = if i % 2 == 0 { there } else { back };
            conn.send(&move_msg(piece, to)).await.unwrap();
        }
        let mut tokens = Vec::with_capacity(expected);
        for _ in 0..expected {
            tokens.push(token_of(recv(&mut conn).await));
        }
        tokens
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_moves_same_order_for_everyone() {
        const ROUNDS: usize = 10;
        let (addr, room) = start_ws().await;
        let a = join(&addr, Side::A).await;
        let b = join(&addr, Side::B).await;

        let (tokens_a, tokens_b) = tokio::join!(
            tokio::spawn(shuttle(a, "A-P1", "row1-col0", "row0-col0", ROUNDS, 2 * ROUNDS)),
            tokio::spawn(shuttle(b, "B-P1", "row3-col4", "row4-col4", ROUNDS, 2 * ROUNDS)),
        );
        let tokens_a = tokens_a.unwrap();
        let tokens_b = tokens_b.unwrap();

        assert_eq!(tokens_a.len(), 2 * ROUNDS);
        assert_eq!(tokens_a, tokens_b);
        for token in &tokens_a {
            // 解析会拒绝重复的格子和棋子
            let board = Board::from_state_token(token).unwrap();
            assert_eq!(board.len(), 10);
        }

        // 往返次数为偶数，两枚棋子都回到原位
        let last = tokens_a.last().unwrap();
        assert_eq!(*last, Board::initial().to_state_token());
        assert_eq!(room.lock().await.state_token(), *last);
    }

    #[tokio::test]
    async fn test_oversized_frame_gets_reply_then_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = Server::new(listener);
        let addr = server.local_addr().unwrap();
        let room = server.room();
        tokio::spawn(server.run());

        let stream = TcpStream::connect(&addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = FrameReader::new(read_half);

        let player: ServerMessage = reader.read_frame().await.unwrap();
        assert_eq!(player, ServerMessage::Player { player: Side::A });
        let _initial: ServerMessage = reader.read_frame().await.unwrap();

        let mut header = vec![PROTOCOL_VERSION];
        header.extend_from_slice(&((MAX_FRAME_SIZE as u32) + 1).to_be_bytes());
        write_half.write_all(&header).await.unwrap();

        let reply: ServerMessage = timeout(WAIT, reader.read_frame()).await.unwrap().unwrap();
        assert_eq!(reply, ServerMessage::InvalidMove);
        let closed: protocol::Result<ServerMessage> =
            timeout(WAIT, reader.read_frame()).await.unwrap();
        assert!(matches!(closed, Err(ProtocolError::ConnectionClosed)));

        wait_for_players(&room, 0).await;
    }
}
