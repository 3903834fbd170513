//! `GET /api/simulation/ws/{job_id}` — polls run status once a
//! second and pushes it as a JSON frame, closing once the run reaches a
//! terminal status. Simpler than the replay socket: this side never reads
//! inbound frames, so there is no `stream.next()` loop, only an outbound
//! sender on a timer.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::Extension;
use futures::SinkExt;
use hospital_twin_core::types::RunStatus;
use std::time::Duration;
use uuid::Uuid;

use crate::state::AppState;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub async fn simulation_status_ws(
    ws: WebSocketUpgrade,
    Extension(state): Extension<AppState>,
    Path(job_id): Path<Uuid>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, job_id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, job_id: Uuid) {
    loop {
        let run = match state.store.load_run(job_id).await {
            Ok(Some(run)) => run,
            Ok(None) => {
                let _ = socket
                    .send(Message::Text(
                        serde_json::json!({"error": "run not found"}).to_string(),
                    ))
                    .await;
                break;
            }
            Err(e) => {
                let _ = socket
                    .send(Message::Text(serde_json::json!({"error": e.to_string()}).to_string()))
                    .await;
                break;
            }
        };

        let terminal = matches!(run.status, RunStatus::Completed | RunStatus::Failed);
        let payload = match serde_json::to_string(&run) {
            Ok(p) => p,
            Err(_) => break,
        };
        if socket.send(Message::Text(payload)).await.is_err() {
            break;
        }
        if terminal {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    let _ = socket.send(Message::Close(None)).await;
}
