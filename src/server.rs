//! Thin HTTP + WebSocket transport around the [`Runner`].
//!
//! Carries no simulation logic: it feeds raw map text into the runner,
//! answers snapshot queries, and relays the per-tick frames to connected
//! observers as JSON.

use crate::runner::Runner;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{Html, IntoResponse, Redirect},
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

pub fn router(runner: Arc<Runner>) -> Router {
    Router::new()
        .route("/", get(index).post(submit))
        .route("/ws", get(upgrade))
        .with_state(runner)
}

#[derive(Deserialize)]
struct MapForm {
    map: String,
}

async fn index(State(runner): State<Arc<Runner>>) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html>\n<body>\n\
         <h1>Enter Map</h1>\n\
         <form action=\"/\" method=\"post\">\n\
         <input name=\"map\" /><br />\n\
         <button>Save</button>\n\
         </form>\n\
         <div>\n<h1>Current Map</h1>\n<pre>{}</pre>\n</div>\n\
         </body>\n</html>\n",
        runner.snapshot().await
    ))
}

async fn submit(State(runner): State<Arc<Runner>>, Form(form): Form<MapForm>) -> Redirect {
    // The form is a single-line input, so rows are separated by a literal
    // backslash-n typed by the user.
    let contents = form.map.replace("\\n", "\n");
    runner.submit_map(&contents).await;

    Redirect::to("/")
}

async fn upgrade(State(runner): State<Arc<Runner>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| observe(socket, runner))
}

/// One observer connection: answers `"map"` and `"run"` text messages and
/// forwards every broadcast frame as JSON.
async fn observe(mut socket: WebSocket, runner: Arc<Runner>) {
    let mut frames = runner.subscribe();
    tracing::debug!("observer connected");

    loop {
        tokio::select! {
            message = socket.recv() => {
                let Some(Ok(message)) = message else {
                    break;
                };

                let Message::Text(text) = message else {
                    continue;
                };

                let reply = match text.as_str() {
                    "map" => Some(runner.snapshot().await),
                    "run" => match runner.start().await {
                        Ok(_) => None,
                        // Rejected, not queued; report it to this caller only.
                        Err(err) => Some(json!({ "error": err.to_string() }).to_string()),
                    },
                    _ => None,
                };

                if let Some(reply) = reply {
                    if socket.send(Message::Text(reply.into())).await.is_err() {
                        break;
                    }
                }
            }
            frame = frames.recv() => {
                let frame = match frame {
                    Ok(frame) => frame,
                    // A slow observer misses frames rather than stalling the run.
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "observer lagged behind the frame feed");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let Ok(payload) = serde_json::to_string(&frame) else {
                    continue;
                };

                if socket.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!("observer disconnected");
}
