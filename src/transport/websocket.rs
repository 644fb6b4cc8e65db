//! WebSocket transport
//!
//! Translates protocol JSON into `RoomService` calls. Responsibilities:
//! - Accept TCP/WebSocket connections and create a `Client` for each
//! - Enforce identify-first: nothing but `identify` is served until the
//!   connection says who it is
//! - Reply to every request with exactly one `ServerMessage`
//! - Attach room subscriptions to the connection and release them when it
//!   goes away
//!
//! Requests are answered in order. Events of a subscribed room travel over the
//! same outbound channel, so an event may reach the client before the reply
//! to the request that caused it.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::client::Client;
use crate::client::connection::OUTBOUND_CAPACITY;
use crate::room::{RoomId, RoomService, UserId};
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::utils::error::Result;

pub async fn start_websocket_server(addr: &str, service: Arc<RoomService>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("WebSocket server listening on ws://{}", listener.local_addr()?);
    serve(listener, service).await;
    Ok(())
}

/// Accept loop over an already bound listener.
pub async fn serve(listener: TcpListener, service: Arc<RoomService>) {
    while let Ok((stream, peer)) = listener.accept().await {
        let service = service.clone();
        tokio::spawn(async move {
            debug!("Connection from {peer}");
            handle_connection(stream, service).await;
        });
    }
    warn!("Listener stopped accepting connections");
}

async fn handle_connection(stream: TcpStream, service: Arc<RoomService>) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake error: {e}");
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<WsMessage>(OUTBOUND_CAPACITY);
    let mut client = Client::new(tx);
    let client_id = client.id.clone();
    info!("Client {client_id} connected");

    let writer = {
        let client_id = client_id.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    warn!("Failed to send message to {client_id}: {e}");
                    break;
                }
            }
            debug!("Send loop closed for {client_id}");
        })
    };

    while let Some(frame) = ws_receiver.next().await {
        let text = match frame {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("Read error from {client_id}: {e}");
                break;
            }
        };

        let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(request) => handle_request(&service, &mut client, request),
            Err(err) => {
                warn!(
                    "Invalid client message from {client_id}: {err} | {}",
                    text.as_str().chars().take(100).collect::<String>()
                );
                ServerMessage::error(400, "BAD_REQUEST", err.to_string())
            }
        };
        if !client.send(&reply).await {
            break;
        }
    }

    // Dropping the client aborts its forwarders, which closes their
    // subscriptions and releases the last senders of the writer's channel.
    drop(client);
    let _ = writer.await;
    info!("Client {client_id} disconnected");
}

/// Serves one request for `client`. Failures become `error` replies; the
/// connection stays usable.
pub(crate) fn handle_request(
    service: &RoomService,
    client: &mut Client,
    request: ClientMessage,
) -> ServerMessage {
    let outcome = match client.user_id().cloned() {
        Some(actor) => dispatch(service, client, &actor, request),
        None => match request {
            ClientMessage::Identify { user_id, name } => identify(service, client, user_id, &name),
            _ => {
                return ServerMessage::error(401, "UNIDENTIFIED", "identify before anything else");
            }
        },
    };

    outcome.unwrap_or_else(|err| {
        debug!("Request from {} failed: {err}", client.id);
        ServerMessage::from(&err)
    })
}

fn identify(
    service: &RoomService,
    client: &mut Client,
    user_id: UserId,
    name: &str,
) -> Result<ServerMessage> {
    let user = service.register_user(user_id, name)?;
    info!("Client {} identified as {}", client.id, user.id);
    let user_id = user.id.clone();
    client.identify(user);
    Ok(ServerMessage::Identified { user_id })
}

fn dispatch(
    service: &RoomService,
    client: &mut Client,
    actor: &UserId,
    request: ClientMessage,
) -> Result<ServerMessage> {
    let reply = match request {
        ClientMessage::Identify { user_id, name } => {
            if &user_id != actor {
                return Ok(ServerMessage::error(
                    409,
                    "ALREADY_IDENTIFIED",
                    format!("connection already identified as {actor}"),
                ));
            }
            return identify(service, client, user_id, &name);
        }
        ClientMessage::CreateRoom { name } => ServerMessage::Room {
            room: service.create_room(actor, &name)?,
        },
        ClientMessage::GetRoom { room_id } => ServerMessage::Room {
            room: service.get_room(&room_id)?,
        },
        ClientMessage::RenameRoom { room_id, name } => ServerMessage::Room {
            room: service.rename_room(&room_id, actor, &name)?,
        },
        ClientMessage::JoinRoom { room_id } => ServerMessage::Room {
            room: service.join_room(&room_id, actor)?,
        },
        ClientMessage::LeaveRoom { room_id } => match service.leave_room(&room_id, actor)? {
            Some(room) => ServerMessage::Room { room },
            None => ServerMessage::Done {},
        },
        ClientMessage::Kick { room_id, user_id } => {
            match service.kick_member(&room_id, actor, &user_id)? {
                Some(room) => ServerMessage::Room { room },
                None => ServerMessage::Done {},
            }
        }
        ClientMessage::DeleteRoom { room_id } => {
            service.delete_room(&room_id, actor)?;
            ServerMessage::Done {}
        }
        ClientMessage::UpdatePlayback { room_id, playback } => ServerMessage::Room {
            room: service.update_playback(&room_id, actor, playback)?,
        },
        ClientMessage::Subscribe { room_id } => {
            let subscription = service.broker().subscribe(&room_id, actor)?;
            client.attach(subscription);
            debug!("{actor} subscribed to room {room_id}");
            ServerMessage::Done {}
        }
        ClientMessage::Unsubscribe { room_id } => {
            unsubscribe(service, client, actor, &room_id);
            ServerMessage::Done {}
        }
    };
    Ok(reply)
}

fn unsubscribe(service: &RoomService, client: &mut Client, actor: &UserId, room_id: &RoomId) {
    // Close first so a subscribe right after this sees a free slot.
    service.broker().unsubscribe(room_id, actor);
    client.detach(room_id);
    debug!("{actor} unsubscribed from room {room_id}");
}
