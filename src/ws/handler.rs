//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::GameError;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{decode_client_msg, ClientMsg, ProtocolError, ServerMsg};

/// How long queued messages may take to flush once the session ends
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();

    let bound = run_session(conn_id, &state, ws_sink, ws_stream, tx.clone(), rx).await;

    // Cleanup on disconnect, unless the route was evicted or a newer socket
    // took the name over
    if let Some(name) = bound {
        if state.hub.unbind(&name, &tx) {
            state.game.leave(&name);
        }
    }

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split. Returns the player name
/// still bound to this connection when it ends.
async fn run_session(
    conn_id: Uuid,
    state: &AppState,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    tx: mpsc::UnboundedSender<ServerMsg>,
    mut outbound_rx: mpsc::UnboundedReceiver<ServerMsg>,
) -> Option<String> {
    let rate_limiter = ConnectionRateLimiter::new();
    // Cancelled by the hub on eviction, or below when the reader stops
    let closed = CancellationToken::new();

    // Spawn writer task: outbound messages -> WebSocket
    let writer_closed = closed.clone();
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                biased;
                msg = outbound_rx.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
                _ = writer_closed.cancelled() => {
                    // Flush what was queued before the close, e.g. KICKED
                    while let Ok(msg) = outbound_rx.try_recv() {
                        if send_msg(&mut ws_sink, &msg).await.is_err() {
                            break;
                        }
                    }
                    let _ = ws_sink.close().await;
                    break;
                }
            };
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let mut bound: Option<String> = None;

    // Reader loop: WebSocket -> game
    loop {
        // Closure wins over a pending frame, so an evicted client cannot rejoin
        let result = tokio::select! {
            biased;
            _ = state.shutdown.cancelled() => break,
            _ = closed.cancelled() => {
                info!(conn_id = %conn_id, name = ?bound, "Connection evicted");
                break;
            }
            next = ws_stream.next() => match next {
                Some(result) => result,
                None => break,
            },
        };

        match result {
            Ok(Message::Text(text)) => {
                let decoded = decode_client_msg(&text);
                if !is_lifecycle(&decoded, bound.is_some()) && !rate_limiter.check_input() {
                    debug!(conn_id = %conn_id, "Rate limited input message");
                    continue;
                }

                let msg = match decoded {
                    Ok(msg) => msg,
                    Err(e) => {
                        debug!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                        reply_error(&tx, &GameError::from(e));
                        continue;
                    }
                };

                if let Err(e) = bind_connection(state, &mut bound, &msg, &tx, &closed) {
                    debug!(conn_id = %conn_id, error = %e, "Message for another player dropped");
                    reply_error(&tx, &e);
                    continue;
                }

                let leaving = matches!(msg, ClientMsg::Disconnect { .. });
                let name = msg.name().to_string();

                match state.game.handle(msg).await {
                    Ok(()) => state.game.registry().touch(&name, Instant::now()),
                    Err(e) => {
                        debug!(conn_id = %conn_id, name = %name, error = %e, "Client message refused");
                        if matches!(e, GameError::Banned(_)) {
                            state.hub.unbind(&name, &tx);
                            bound = None;
                        }
                        reply_error(&tx, &e);
                    }
                }

                if leaving {
                    state.hub.unbind(&name, &tx);
                    bound = None;
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(conn_id = %conn_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Let the writer flush, then stop it
    closed.cancel();
    let writer_abort = writer_handle.abort_handle();
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer_handle)
        .await
        .is_err()
    {
        writer_abort.abort();
    }

    bound
}

/// Frames that join or leave bypass the input rate limit. A join only
/// counts while the connection is still unbound.
fn is_lifecycle(decoded: &Result<ClientMsg, ProtocolError>, bound: bool) -> bool {
    match decoded {
        Ok(ClientMsg::Disconnect { .. }) => true,
        Ok(ClientMsg::AddNewPlayer { .. }) => !bound,
        _ => false,
    }
}

/// Tie the connection to the name in its first ADD_NEW_PLAYER and refuse
/// messages about anyone else afterwards
fn bind_connection(
    state: &AppState,
    bound: &mut Option<String>,
    msg: &ClientMsg,
    tx: &mpsc::UnboundedSender<ServerMsg>,
    closed: &CancellationToken,
) -> Result<(), GameError> {
    let claimed = msg.name();
    match (bound.as_deref(), msg) {
        (Some(name), _) if name == claimed => Ok(()),
        (Some(name), _) => Err(GameError::NameMismatch {
            bound: name.to_string(),
            claimed: claimed.to_string(),
        }),
        (None, ClientMsg::AddNewPlayer { .. }) => {
            state.hub.bind(claimed, tx.clone(), closed.clone());
            *bound = Some(claimed.to_string());
            Ok(())
        }
        (None, _) => Err(GameError::UnknownPlayer(claimed.to_string())),
    }
}

fn reply_error(tx: &mpsc::UnboundedSender<ServerMsg>, e: &GameError) {
    let _ = tx.send(ServerMsg::error(e.code(), e.to_string()));
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(name: &str) -> ClientMsg {
        ClientMsg::AddNewPlayer {
            name: name.to_string(),
            position: Default::default(),
            rotation: Default::default(),
            pitch: 0.0,
        }
    }

    #[test]
    fn joins_and_leaves_skip_the_rate_limit() {
        let bye = Ok(ClientMsg::Disconnect {
            name: "ann".to_string(),
        });
        assert!(is_lifecycle(&bye, true));

        let first_join = Ok(join("ann"));
        assert!(is_lifecycle(&first_join, false));
        assert!(!is_lifecycle(&first_join, true));

        let reload = Ok(ClientMsg::Reload {
            name: "ann".to_string(),
        });
        assert!(!is_lifecycle(&reload, true));

        let garbage = decode_client_msg("{not json");
        assert!(!is_lifecycle(&garbage, false));
    }
}
