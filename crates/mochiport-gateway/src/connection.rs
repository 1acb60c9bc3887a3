use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mochiport_types::events::{RealtimeCommand, RealtimeEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

type Subscriptions = Arc<RwLock<HashSet<Uuid>>>;

/// Serve one realtime socket until either side closes it.
///
/// `client` is the authenticated subject when auth is enabled, used only
/// for logging.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, client: Option<String>) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id = Uuid::new_v4();
    let client = client.unwrap_or_else(|| "anonymous".to_string());

    let ready = RealtimeEvent::Ready { connection_id };
    let Ok(ready) = serde_json::to_string(&ready) else {
        return;
    };
    if sender.send(Message::Text(ready.into())).await.is_err() {
        return;
    }

    let open = dispatcher.connection_opened();
    info!("{} connected to realtime ({}), {} open", client, connection_id, open);

    let mut broadcast_rx = dispatcher.subscribe();
    let subscriptions: Subscriptions = Arc::new(RwLock::new(HashSet::new()));
    let send_subscriptions = subscriptions.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward matching broadcasts -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let msg = match result {
                        Ok(msg) => msg,
                        Err(RecvError::Lagged(n)) => {
                            warn!("Realtime receiver lagged by {} messages", n);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    let forward = {
                        let subs = send_subscriptions.read().unwrap_or_else(|e| e.into_inner());
                        should_forward(msg.conversation_id, &subs)
                    };
                    if !forward {
                        continue;
                    }

                    if sender.send(Message::Text(msg.json.to_string().into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let recv_client = client.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<RealtimeCommand>(&text) {
                    Ok(cmd) => {
                        let mut subs = subscriptions.write().unwrap_or_else(|e| e.into_inner());
                        apply_command(&mut subs, cmd);
                        debug!("{} now subscribed to {} conversations", recv_client, subs.len());
                    }
                    Err(e) => {
                        let preview: String = text.chars().take(200).collect();
                        warn!("{} bad command: {} -- raw: {}", recv_client, e, preview);
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    let open = dispatcher.connection_closed();
    info!("{} disconnected from realtime ({}), {} open", client, connection_id, open);
}

/// Global events always go out; scoped ones only to subscribers.
fn should_forward(conversation_id: Option<Uuid>, subscriptions: &HashSet<Uuid>) -> bool {
    match conversation_id {
        Some(id) => subscriptions.contains(&id),
        None => true,
    }
}

fn apply_command(subscriptions: &mut HashSet<Uuid>, cmd: RealtimeCommand) {
    match cmd {
        RealtimeCommand::Subscribe { conversation_ids } => {
            *subscriptions = conversation_ids.into_iter().collect();
        }
        RealtimeCommand::Unsubscribe { conversation_ids } => {
            for id in conversation_ids {
                subscriptions.remove(&id);
            }
        }
    }
}
