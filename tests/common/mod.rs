//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use render_gateway::{GatewayConfig, HttpServer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Start a programmable render server. `f` receives the raw request head
/// and returns the status code and JSON/text body to send back.
pub async fn start_render_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
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
                        let head = read_head(&mut socket).await;
                        let (status, body) = f(head).await;
                        let status_text = match status {
                            200 => "200 OK",
                            302 => "302 Found",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
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

async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Write a build output tree: manifest, node modules and client assets.
///
/// Routes: `/` (leaf 1, no server logic), `/account` (leaf 2, server
/// logic), `/blog/[slug]` (leaf 4, server logic in layout 3).
pub fn write_build(root: &Path) {
    std::fs::create_dir_all(root.join("nodes")).unwrap();
    std::fs::create_dir_all(root.join("client/_app/immutable/nodes")).unwrap();
    std::fs::create_dir_all(root.join("client/_app/immutable/chunks")).unwrap();

    std::fs::write(
        root.join("manifest.json"),
        r#"{
            "appPath": "_app",
            "appDir": "_app",
            "routes": [
                { "id": "/", "page": { "layouts": [0], "leaf": 1 } },
                { "id": "/account", "page": { "layouts": [0, null], "leaf": 2 } },
                { "id": "/blog/[slug]", "page": { "layouts": [3], "leaf": 4 } }
            ]
        }"#,
    )
    .unwrap();

    let nodes = [
        r#"{ "universal": { "ssr": true } }"#,
        r#"{ "universal": { "prerender": true } }"#,
        r#"{ "server": { "ssr": true } }"#,
        r#"{ "server": {} }"#,
        r#"{}"#,
    ];
    for (i, node) in nodes.iter().enumerate() {
        std::fs::write(root.join("nodes").join(format!("{i}.json")), node).unwrap();
    }

    for leaf in [1, 2, 4] {
        std::fs::write(
            root.join(format!("client/_app/immutable/nodes/{leaf}.deadbeef.js")),
            format!("export const leaf = {leaf};"),
        )
        .unwrap();
    }
    std::fs::write(root.join("client/_app/immutable/chunks/app.js"), "start()").unwrap();
}

/// A gateway configuration pointing at `root` and `upstream`.
pub fn config(root: &Path, upstream: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.assets.root = root.display().to_string();
    config.manifest.path = root.join("manifest.json").display().to_string();
    config.manifest.nodes_dir = root.join("nodes").display().to_string();
    config.upstream.address = upstream.to_string();
    config
}

/// Run a gateway; drop or send on the returned sender to stop it.
pub async fn start_gateway(config: GatewayConfig) -> (SocketAddr, oneshot::Sender<()>) {
    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let _ = server
            .run(listener, async {
                let _ = rx.await;
            })
            .await;
    });

    (addr, tx)
}

/// Client that never reuses connections and ignores system proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
