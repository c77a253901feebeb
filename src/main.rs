use httpproxy::cache::Cache;
use httpproxy::config::ProxyConfig;
use httpproxy::handler;
use std::net::UdpSocket;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Guesses the proxy's own primary IPv4 address for the synthesized
/// `Host:` line in revalidation HEAD requests. Connecting a UDP socket
/// never sends a packet; it only asks the kernel to pick the local
/// address it would route through. Not security-critical - falls back
/// to loopback if the trick fails (e.g. no route at all).
fn resolve_host_ip() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

async fn connect_upstream(server_port: u16) -> std::io::Result<TcpStream> {
    TcpStream::connect(("127.0.0.1", server_port)).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("httpproxy=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match ProxyConfig::parse(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    info!(
        client_port = config.client_port,
        server_port = config.server_port,
        cache_cap = config.cache_cap,
        max_file_size = config.max_file_size,
        policy = ?config.policy,
        "starting httpproxy"
    );

    let listener = match TcpListener::bind(("0.0.0.0", config.client_port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to open listen socket: {e}");
            std::process::exit(1);
        }
    };

    let mut upstream = match connect_upstream(config.server_port).await {
        Ok(stream) => Some(stream),
        Err(e) => {
            error!("failed to connect to upstream: {e}");
            std::process::exit(1);
        }
    };

    let host_ip = resolve_host_ip();
    let mut cache = Cache::new(config.cache_cap, config.policy);

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        .expect("failed to install SIGINT handler");

    loop {
        let accept_result = tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
            result = listener.accept() => result,
        };

        let (mut client, addr) = match accept_result {
            Ok(pair) => pair,
            Err(e) => {
                warn!("accept error: {e}");
                continue;
            }
        };
        debug!(%addr, "accepted connection");

        let mut stream = match upstream.take() {
            Some(stream) => stream,
            None => match connect_upstream(config.server_port).await {
                Ok(stream) => stream,
                Err(e) => {
                    error!("unable to reconnect to upstream: {e}");
                    std::process::exit(1);
                }
            },
        };

        match handler::handle_connection(
            &mut client,
            &mut stream,
            &mut cache,
            config.max_file_size,
            &host_ip,
        )
        .await
        {
            Ok(()) => {
                debug!(%addr, "connection closed");
                upstream = Some(stream);
            }
            Err(e) => {
                debug!(%addr, "connection closed with error: {e}");
                // Don't trust a socket that just errored; the next
                // accepted client triggers a fresh connect instead.
                upstream = None;
            }
        }
    }
}
