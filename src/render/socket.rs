//! WebSocket relay to the render server.
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Gateway ←──── WebSocket frames ────→ Render server
//! ```
//!
//! # Design Decisions
//! - Frame-level forwarding (no message buffering)
//! - Close frames propagated in both directions
//! - Whichever side finishes first ends the relay

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::extract::ws::{self, CloseFrame, WebSocket};
use axum::http::{header, request, HeaderValue};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest};

use crate::render::SocketHandler;

const FORWARDED: [header::HeaderName; 5] = [
    header::COOKIE,
    header::AUTHORIZATION,
    header::ORIGIN,
    header::USER_AGENT,
    header::SEC_WEBSOCKET_PROTOCOL,
];

/// Relays an accepted client socket to the render server.
pub struct UpstreamSocket {
    upstream: SocketAddr,
}

impl UpstreamSocket {
    pub fn new(upstream: SocketAddr) -> Self {
        Self { upstream }
    }
}

#[async_trait]
impl SocketHandler for UpstreamSocket {
    async fn serve(&self, mut socket: WebSocket, head: request::Parts) {
        let path = head.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let url = format!("ws://{}{}", self.upstream, path);

        let mut upstream_request = match url.as_str().into_client_request() {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Invalid upstream socket URL");
                return;
            }
        };
        for name in FORWARDED.iter() {
            if let Some(value) = head.headers.get(name) {
                upstream_request.headers_mut().insert(name.clone(), value.clone());
            }
        }
        upstream_request
            .headers_mut()
            .insert(super::upstream::X_RENDER_PLATFORM, HeaderValue::from_static("trusted"));

        let upstream = match tokio_tungstenite::connect_async(upstream_request).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Upstream socket connect failed");
                let _ = socket
                    .send(ws::Message::Close(Some(CloseFrame {
                        code: ws::close_code::ERROR,
                        reason: "upstream unavailable".into(),
                    })))
                    .await;
                return;
            }
        };

        tracing::debug!(url = %url, "Socket relay established");

        let (mut client_tx, mut client_rx) = socket.split();
        let (mut upstream_tx, mut upstream_rx) = upstream.split();

        let client_to_upstream = async {
            while let Some(Ok(message)) = client_rx.next().await {
                let closing = matches!(message, ws::Message::Close(_));
                if upstream_tx.send(to_upstream(message)).await.is_err() || closing {
                    break;
                }
            }
        };

        let upstream_to_client = async {
            while let Some(Ok(message)) = upstream_rx.next().await {
                let Some(message) = to_client(message) else {
                    continue;
                };
                let closing = matches!(message, ws::Message::Close(_));
                if client_tx.send(message).await.is_err() || closing {
                    break;
                }
            }
        };

        tokio::select! {
            _ = client_to_upstream => {}
            _ = upstream_to_client => {}
        }

        tracing::debug!(url = %url, "Socket relay closed");
    }
}

fn to_upstream(message: ws::Message) -> tungstenite::Message {
    match message {
        ws::Message::Text(text) => tungstenite::Message::Text(text.as_str().into()),
        ws::Message::Binary(data) => tungstenite::Message::Binary(data),
        ws::Message::Ping(data) => tungstenite::Message::Ping(data),
        ws::Message::Pong(data) => tungstenite::Message::Pong(data),
        ws::Message::Close(frame) => tungstenite::Message::Close(frame.map(|frame| {
            tungstenite::protocol::CloseFrame {
                code: frame.code.into(),
                reason: frame.reason.as_str().into(),
            }
        })),
    }
}

fn to_client(message: tungstenite::Message) -> Option<ws::Message> {
    Some(match message {
        tungstenite::Message::Text(text) => ws::Message::Text(text.as_str().into()),
        tungstenite::Message::Binary(data) => ws::Message::Binary(data),
        tungstenite::Message::Ping(data) => ws::Message::Ping(data),
        tungstenite::Message::Pong(data) => ws::Message::Pong(data),
        tungstenite::Message::Close(frame) => ws::Message::Close(frame.map(|frame| CloseFrame {
            code: frame.code.into(),
            reason: frame.reason.as_str().into(),
        })),
        tungstenite::Message::Frame(_) => return None,
    })
}
