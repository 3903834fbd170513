//! `GET /api/ws/replay`. Bridges the WebSocket duplex
//! channel onto `ReplayStreamer::run`'s two `mpsc` channels — outbound
//! `ReplayFrame`s serialized as JSON text frames, inbound text frames
//! deserialized as `ReplayControl`. Modeled on the upgrade/split pattern the
//! load-generator WebSocket sync handler uses: `ws.split()` into a sink and
//! a stream, with the sink owned by one task and the stream polled by
//! another.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::Extension;
use futures::{SinkExt, StreamExt};
use hospital_twin_core::replay::ReplayStreamer;
use hospital_twin_core::types::ReplayControl;
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::AppState;
use crate::timefmt::{default_replay_anchor, parse_iso8601};

#[derive(Deserialize)]
pub struct ReplayQuery {
    pub unit_id: Uuid,
    pub start_time: Option<String>,
    #[serde(default = "default_speed")]
    pub speed: f64,
}

fn default_speed() -> f64 {
    1.0
}

pub async fn replay_ws(
    ws: WebSocketUpgrade,
    Extension(state): Extension<AppState>,
    Query(q): Query<ReplayQuery>,
) -> impl IntoResponse {
    let start_time = match q.start_time.as_deref().map(parse_iso8601).transpose() {
        Ok(t) => t.unwrap_or_else(default_replay_anchor),
        Err(_) => default_replay_anchor(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, q.unit_id, start_time, q.speed))
}

async fn handle_socket(socket: WebSocket, state: AppState, unit_id: Uuid, start_time: i64, speed: f64) {
    let (mut sink, mut stream) = socket.split();
    let (tick_tx, mut tick_rx) = mpsc::channel(8);
    let (control_tx, control_rx) = mpsc::channel(8);

    let streamer = ReplayStreamer::new(state.store.clone());
    let driver = tokio::spawn(async move {
        streamer.run(unit_id, start_time, speed, tick_tx, control_rx).await;
    });

    let outbound = tokio::spawn(async move {
        while let Some(frame) = tick_rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(t) => t,
                Err(_) => continue,
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
            if matches!(frame, hospital_twin_core::types::ReplayFrame::Complete) {
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if let Some(control) = parse_control(&text) {
                    if control_tx.send(control).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) => {
                let _ = control_tx.send(ReplayControl::Stop).await;
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Binary(_)) => {}
            Err(_) => break,
        }
    }

    drop(control_tx);
    let _ = driver.await;
    let _ = outbound.await;
}

#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ControlMessage {
    Play,
    Pause,
    Seek { timestamp: i64 },
    Speed { value: f64 },
    Stop,
}

fn parse_control(text: &str) -> Option<ReplayControl> {
    let msg: ControlMessage = serde_json::from_str(text).ok()?;
    Some(match msg {
        ControlMessage::Play => ReplayControl::Play,
        ControlMessage::Pause => ReplayControl::Pause,
        ControlMessage::Seek { timestamp } => ReplayControl::Seek(timestamp),
        ControlMessage::Speed { value } => ReplayControl::Speed(value),
        ControlMessage::Stop => ReplayControl::Stop,
    })
}
