//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use health_engine::config::parse_config;
use health_engine::lifecycle::build_engine;
use health_engine::{HealthEngine, HealthServer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Start a programmable mock backend on an ephemeral port.
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
                        let mut request = [0u8; 4096];
                        let _ = socket.read(&mut request).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
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

/// A health engine plus its HTTP server, running on an ephemeral port.
pub struct TestDaemon {
    pub addr: SocketAddr,
    pub engine: HealthEngine,
    shutdown: Shutdown,
    server: JoinHandle<()>,
}

impl TestDaemon {
    /// Start from TOML config text. `[server]` settings are ignored.
    pub async fn start(config_toml: &str) -> Self {
        let config = parse_config(config_toml).unwrap();
        let engine = build_engine(&config).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let server = HealthServer::new(&config, Arc::new(engine.aggregator()));
        let rx = shutdown.subscribe();
        let server = tokio::spawn(async move {
            server.serve(listener, rx).await.unwrap();
        });

        Self {
            addr,
            engine,
            shutdown,
            server,
        }
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }

    pub async fn stop(self) {
        self.engine.shutdown().await;
        self.shutdown.trigger();
        self.server.await.unwrap();
    }
}

/// Client that ignores proxy settings from the environment.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

pub async fn get(url: &str) -> reqwest::Response {
    client().get(url).send().await.unwrap()
}

/// Poll `url` until it answers `expected`, or panic after `deadline`.
pub async fn wait_for_status(url: &str, expected: u16, deadline: Duration) {
    let client = client();
    let started = tokio::time::Instant::now();
    let mut last = None;

    while started.elapsed() < deadline {
        if let Ok(response) = client.get(url).send().await {
            let status = response.status().as_u16();
            if status == expected {
                return;
            }
            last = Some(status);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{url} did not answer {expected} within {deadline:?} (last: {last:?})");
}
