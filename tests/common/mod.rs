//! Shared utilities for integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use guarded_caller::config::CallerConfig;
use guarded_caller::resilience::DependencyRegistry;
use guarded_caller::{HttpServer, Shutdown};

/// Consume the request head so closing the socket does not reset the client.
async fn read_request_head(socket: &mut TcpStream) {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 512];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    return;
                }
            }
        }
    }
}

/// Start a programmable mock backend on an ephemeral port.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        read_request_head(&mut socket).await;
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Config pointing at `backend` with fast, jitter-free retries.
#[allow(dead_code)]
pub fn config_for(backend: SocketAddr) -> CallerConfig {
    let mut config = CallerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.downstream.base_url = format!("http://{}", backend);
    config.timeouts.attempt_ms = 200;
    config.retries.base_delay_ms = 50;
    config.retries.multiplier = 2.0;
    config.retries.jitter = 0.0;
    config
}

pub struct RunningCaller {
    pub addr: SocketAddr,
    pub registry: Arc<DependencyRegistry>,
    pub config_updates: mpsc::UnboundedSender<CallerConfig>,
    pub shutdown: Shutdown,
}

#[allow(dead_code)]
impl RunningCaller {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn call_url(&self) -> String {
        self.url("/service-a/call-service-b")
    }
}

impl Drop for RunningCaller {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the caller on an ephemeral port.
pub async fn start_caller(config: CallerConfig) -> RunningCaller {
    let server = HttpServer::new(config).unwrap();
    let registry = server.registry();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    RunningCaller {
        addr,
        registry,
        config_updates,
        shutdown,
    }
}

/// Client that never reuses connections.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
