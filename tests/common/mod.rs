//! Test server harness.
//!
//! Spawns the real router on an ephemeral port and drives it over HTTP and
//! WebSocket, the same way a browser client would.

#![allow(dead_code)]

use std::{collections::HashMap, future::Future, net::SocketAddr, time::Duration};

use anyhow::{anyhow, bail, Context};
use futures_util::{SinkExt, StreamExt};
use roomcall::{config::Config, router, AppState};
use serde_json::{json, Value};
use tokio::{net::TcpStream, task::JoinHandle, time::timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);
const SILENCE_WINDOW: Duration = Duration::from_millis(200);

pub struct TestServer {
    addr: SocketAddr,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with(HashMap::new()).await
    }

    pub async fn spawn_with(vars: HashMap<String, String>) -> anyhow::Result<Self> {
        let config = Config::from_vars(&vars)?;
        let app = router(AppState::new(&config), &config);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind test server")?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {e}");
            }
        });

        Ok(Self {
            addr,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub async fn create_room(&self) -> anyhow::Result<String> {
        let body: Value = self
            .client
            .post(format!("{}/create-room", self.url()))
            .send()
            .await?
            .json()
            .await?;
        body["roomId"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("no roomId in {body}"))
    }

    /// `None` when the room is gone (404).
    pub async fn lookup(&self, room_id: &str) -> anyhow::Result<Option<Value>> {
        let response = self
            .client
            .get(format!("{}/room/{room_id}", self.url()))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?.json().await?))
    }

    pub async fn channel(&self) -> anyhow::Result<TestChannel> {
        let (ws, _) = connect_async(format!("ws://{}/ws", self.addr)).await?;
        Ok(TestChannel { ws })
    }

    /// Opens a channel and joins, consuming the `current-participants` reply.
    pub async fn joined(&self, room_id: &str, participant_id: &str) -> anyhow::Result<(TestChannel, Value)> {
        let mut channel = self.channel().await?;
        channel.emit("join-room", json!([room_id, participant_id])).await?;
        let snapshot = channel.expect("current-participants").await?;
        Ok((channel, snapshot))
    }
}

pub struct TestChannel {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestChannel {
    pub async fn emit(&mut self, event: &str, data: Value) -> anyhow::Result<()> {
        self.send_raw(json!({ "event": event, "data": data }).to_string()).await
    }

    pub async fn send_raw(&mut self, text: impl Into<String>) -> anyhow::Result<()> {
        self.ws.send(Message::text(text.into())).await?;
        Ok(())
    }

    /// Next JSON event frame, skipping control frames.
    pub async fn recv(&mut self) -> anyhow::Result<Value> {
        loop {
            let frame = timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .context("timed out waiting for event")?
                .ok_or_else(|| anyhow!("channel closed"))??;
            if let Message::Text(text) = frame {
                return Ok(serde_json::from_str(text.as_str())?);
            }
        }
    }

    /// Next event, which must be named `event`; returns its data.
    pub async fn expect(&mut self, event: &str) -> anyhow::Result<Value> {
        let frame = self.recv().await?;
        if frame["event"] != event {
            bail!("expected {event}, got {frame}");
        }
        Ok(frame["data"].clone())
    }

    pub async fn expect_silence(&mut self) -> anyhow::Result<()> {
        match timeout(SILENCE_WINDOW, self.ws.next()).await {
            Err(_) => Ok(()),
            Ok(frame) => bail!("expected no event, got {frame:?}"),
        }
    }

    pub async fn close(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}

/// Polls `check` until it yields `true` or the receive timeout passes.
pub async fn eventually<F, Fut>(mut check: F) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        if check().await? {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("condition not met in time");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
