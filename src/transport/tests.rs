use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::Broker;
use crate::client::Client;
use crate::persistence::MemoryStore;
use crate::room::{RoomId, RoomService, UserId};
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::transport::websocket::handle_request;
use crate::utils::ids::UuidGenerator;

fn service() -> Arc<RoomService> {
    Arc::new(RoomService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(UuidGenerator),
        Arc::new(Broker::default()),
    ))
}

fn parse(msg: Value) -> ClientMessage {
    serde_json::from_value(msg).unwrap()
}

fn connect(service: &RoomService, id: &str) -> (Client, mpsc::Receiver<WsMessage>) {
    let (tx, rx) = mpsc::channel(16);
    let mut client = Client::new(tx);
    let reply = handle_request(
        service,
        &mut client,
        parse(json!({"type": "identify", "user_id": id, "name": id})),
    );
    assert_eq!(
        reply,
        ServerMessage::Identified {
            user_id: UserId::new(id)
        }
    );
    (client, rx)
}

fn create_room(service: &RoomService, client: &mut Client) -> RoomId {
    match handle_request(
        service,
        client,
        parse(json!({"type": "create_room", "name": "party"})),
    ) {
        ServerMessage::Room { room } => room.id().clone(),
        other => panic!("unexpected reply {other:?}"),
    }
}

fn error_code(reply: &ServerMessage) -> (u16, &str) {
    match reply {
        ServerMessage::Error { status, code, .. } => (*status, code.as_str()),
        other => panic!("expected an error, got {other:?}"),
    }
}

#[test]
fn test_client_message_parsing() {
    let msg = parse(json!({"type": "kick", "room_id": "r1", "user_id": "bob"}));
    assert_eq!(
        msg,
        ClientMessage::Kick {
            room_id: RoomId::new("r1"),
            user_id: UserId::new("bob"),
        }
    );

    let msg = parse(json!({
        "type": "update_playback",
        "room_id": "r1",
        "playback": {"media": "m1", "position": 12.5}
    }));
    assert!(matches!(msg, ClientMessage::UpdatePlayback { .. }));

    assert!(serde_json::from_value::<ClientMessage>(json!({"type": "publish"})).is_err());
}

#[test]
fn test_server_message_format() {
    let ok = serde_json::to_value(ServerMessage::Done {}).unwrap();
    assert_eq!(ok, json!({"type": "ok"}));

    let err = serde_json::to_value(ServerMessage::error(404, "ROOM_NOT_FOUND", "gone")).unwrap();
    assert_eq!(err["type"], "error");
    assert_eq!(err["status"], 404);
    assert_eq!(err["code"], "ROOM_NOT_FOUND");
}

#[tokio::test]
async fn test_requests_before_identify_are_rejected() {
    let service = service();
    let (tx, _rx) = mpsc::channel(4);
    let mut client = Client::new(tx);

    let reply = handle_request(
        &service,
        &mut client,
        parse(json!({"type": "create_room", "name": "party"})),
    );
    assert_eq!(error_code(&reply), (401, "UNIDENTIFIED"));
}

#[tokio::test]
async fn test_identify_rejects_invalid_name_and_second_identity() {
    let service = service();
    let (tx, _rx) = mpsc::channel(4);
    let mut client = Client::new(tx);

    let reply = handle_request(
        &service,
        &mut client,
        parse(json!({"type": "identify", "user_id": "a", "name": "x"})),
    );
    assert_eq!(error_code(&reply), (400, "VALIDATION_FAILED"));
    assert!(client.user().is_none());

    let (mut client, _rx) = connect(&service, "alice");
    let reply = handle_request(
        &service,
        &mut client,
        parse(json!({"type": "identify", "user_id": "mallory", "name": "Mallory"})),
    );
    assert_eq!(error_code(&reply), (409, "ALREADY_IDENTIFIED"));
}

#[tokio::test]
async fn test_room_lifecycle_over_requests() {
    let service = service();
    let (mut alice, _a) = connect(&service, "alice");
    let (mut bob, _b) = connect(&service, "bob");
    let room_id = create_room(&service, &mut alice);

    let reply = handle_request(
        &service,
        &mut bob,
        parse(json!({"type": "join_room", "room_id": room_id})),
    );
    match reply {
        ServerMessage::Room { room } => assert_eq!(room.members().len(), 2),
        other => panic!("unexpected reply {other:?}"),
    }

    let reply = handle_request(
        &service,
        &mut bob,
        parse(json!({"type": "join_room", "room_id": room_id})),
    );
    assert_eq!(error_code(&reply), (409, "ALREADY_MEMBER"));

    let reply = handle_request(
        &service,
        &mut bob,
        parse(json!({"type": "rename_room", "room_id": room_id, "name": "mine"})),
    );
    assert_eq!(error_code(&reply), (403, "NOT_OWNER"));

    let reply = handle_request(
        &service,
        &mut alice,
        parse(json!({"type": "kick", "room_id": room_id, "user_id": "alice"})),
    );
    assert_eq!(error_code(&reply), (403, "SELF_KICK"));

    let reply = handle_request(
        &service,
        &mut alice,
        parse(json!({"type": "leave_room", "room_id": room_id})),
    );
    match reply {
        ServerMessage::Room { room } => assert_eq!(room.owner_id(), &UserId::new("bob")),
        other => panic!("unexpected reply {other:?}"),
    }

    let reply = handle_request(
        &service,
        &mut bob,
        parse(json!({"type": "leave_room", "room_id": room_id})),
    );
    assert_eq!(reply, ServerMessage::Done {});

    let reply = handle_request(
        &service,
        &mut bob,
        parse(json!({"type": "get_room", "room_id": room_id})),
    );
    assert_eq!(error_code(&reply), (404, "ROOM_NOT_FOUND"));
}

#[tokio::test]
async fn test_subscribe_streams_events_and_unsubscribe_frees_slot() {
    let service = service();
    let (mut alice, mut inbox) = connect(&service, "alice");
    let (mut bob, _b) = connect(&service, "bob");
    let room_id = create_room(&service, &mut alice);

    let subscribe = json!({"type": "subscribe", "room_id": room_id});
    assert_eq!(
        handle_request(&service, &mut alice, parse(subscribe.clone())),
        ServerMessage::Done {}
    );
    let reply = handle_request(&service, &mut alice, parse(subscribe.clone()));
    assert_eq!(error_code(&reply), (409, "ALREADY_SUBSCRIBED"));

    handle_request(
        &service,
        &mut bob,
        parse(json!({"type": "join_room", "room_id": room_id})),
    );
    let frame = timeout(Duration::from_secs(1), inbox.recv())
        .await
        .unwrap()
        .unwrap();
    let frame: Value = match frame {
        WsMessage::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("unexpected frame {other:?}"),
    };
    assert_eq!(frame["event"], "UserJoined");
    assert_eq!(frame["data"]["user"]["id"], "bob");

    assert_eq!(
        handle_request(
            &service,
            &mut alice,
            parse(json!({"type": "unsubscribe", "room_id": room_id}))
        ),
        ServerMessage::Done {}
    );
    assert_eq!(
        handle_request(&service, &mut alice, parse(subscribe)),
        ServerMessage::Done {}
    );
}

#[tokio::test]
async fn test_subscribe_to_unknown_room() {
    let service = service();
    let (mut alice, _a) = connect(&service, "alice");

    let reply = handle_request(
        &service,
        &mut alice,
        parse(json!({"type": "subscribe", "room_id": "nope"})),
    );
    assert_eq!(error_code(&reply), (404, "STREAM_NOT_FOUND"));
}

#[tokio::test]
async fn test_delete_room_and_playback() {
    let service = service();
    let (mut alice, _a) = connect(&service, "alice");
    let (mut bob, _b) = connect(&service, "bob");
    let room_id = create_room(&service, &mut alice);

    let reply = handle_request(
        &service,
        &mut bob,
        parse(json!({"type": "update_playback", "room_id": room_id, "playback": {"paused": true}})),
    );
    assert_eq!(error_code(&reply), (400, "NOT_MEMBER"));

    let reply = handle_request(
        &service,
        &mut alice,
        parse(json!({"type": "update_playback", "room_id": room_id, "playback": {"paused": true}})),
    );
    match reply {
        ServerMessage::Room { room } => assert_eq!(room.playback(), Some(&json!({"paused": true}))),
        other => panic!("unexpected reply {other:?}"),
    }

    let reply = handle_request(
        &service,
        &mut bob,
        parse(json!({"type": "delete_room", "room_id": room_id})),
    );
    assert_eq!(error_code(&reply), (403, "NOT_OWNER"));

    let reply = handle_request(
        &service,
        &mut alice,
        parse(json!({"type": "delete_room", "room_id": room_id})),
    );
    assert_eq!(reply, ServerMessage::Done {});
    assert!(!service.broker().has_topic(&room_id));
}
