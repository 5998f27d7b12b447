use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use protocol::{Listener, NetworkConfig, TcpListener, TransportType, WsListener};
use relay_server::Server;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("relay_server=debug".parse()?))
        .init();

    let config = NetworkConfig::from_env()?;
    info!(transport = ?config.transport, "五路棋服务端启动中...");

    let addr = config.bind_addr();
    tokio::select! {
        result = serve(&config.transport, &addr) => result?,
        _ = tokio::signal::ctrl_c() => info!("收到退出信号，服务端关闭"),
    }

    Ok(())
}

async fn serve(transport: &TransportType, addr: &str) -> Result<()> {
    match transport {
        TransportType::WebSocket => run(WsListener::bind(addr).await?).await,
        TransportType::Tcp => run(TcpListener::bind(addr).await?).await,
    }
    Ok(())
}

async fn run<L: Listener + 'static>(listener: L) {
    Server::new(listener).run().await
}
