//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.
//!
//! While a submission is being graded the socket is still read, so a close frame
//! (or a dropped connection) cancels the grading and the engine call under it.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument, warn};

use crate::logic::{self, ApiError};
use crate::protocol::{ClientWsMessage, ErrorOut, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "sql_grader", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "sql_grader", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "sql_grader", bytes = txt.len(), "WS message received");
            let work = handle_client_ws(incoming, &state);
            tokio::pin!(work);
            let outcome = loop {
              tokio::select! {
                reply = &mut work => break Some(reply),
                next = socket.recv() => match next {
                  Some(Ok(Message::Ping(payload))) => { let _ = socket.send(Message::Pong(payload)).await; }
                  Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break None,
                  Some(Ok(_)) => {
                    let busy = ServerWsMessage::Error(ErrorOut { error: "busy".into(), message: "A submission is already being graded.".into() });
                    let _ = socket.send(Message::Text(encode(&busy))).await;
                  }
                },
              }
            };
            match outcome {
              Some(reply) => reply,
              None => {
                warn!(target: "sql_grader", "Client left while grading; submission cancelled");
                break;
              }
            }
          }
          Err(e) => ServerWsMessage::Error(ErrorOut { error: "bad_request".into(), message: format!("Invalid JSON: {}", e) }),
        };

        if let Err(e) = socket.send(Message::Text(encode(&reply_msg))).await {
          error!(target: "sql_grader", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "sql_grader", "WebSocket disconnected");
}

fn encode(msg: &ServerWsMessage) -> String {
  serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "error": "internal", "message": format!("Serialization error: {}", e) }).to_string()
  })
}

fn error_reply(e: ApiError) -> ServerWsMessage {
  ServerWsMessage::Error(e.body())
}

#[instrument(level = "info", skip_all)]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Grade(body) => match logic::grade_submission(state, &body).await {
      Ok(out) => ServerWsMessage::Verdict(out),
      Err(e) => error_reply(e),
    },

    ClientWsMessage::SubmitChallenge { challenge_id, query, user_id } => {
      match logic::submit_challenge(state, &challenge_id, &query, user_id.as_deref()).await {
        Ok(out) => ServerWsMessage::Verdict(out),
        Err(e) => error_reply(e),
      }
    }
  }
}
