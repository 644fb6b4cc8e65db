use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tungstenite::protocol::Message as WsMessage;

use super::Client;
use crate::broker::{Broker, Event};
use crate::room::{RoomId, User, UserId};

fn room() -> RoomId {
    RoomId::new("room-1")
}

fn alice() -> UserId {
    UserId::new("alice")
}

async fn next_json(rx: &mut mpsc::Receiver<WsMessage>) -> Value {
    let frame = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("frame in time")
        .expect("channel open");
    match frame {
        WsMessage::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("unexpected frame {other:?}"),
    }
}

#[test]
fn test_client_new() {
    let (tx, _) = mpsc::channel::<WsMessage>(4);
    let client = Client::new(tx);
    assert!(!client.id.is_empty());
    assert!(client.user().is_none());
}

#[test]
fn test_identify() {
    let (tx, _) = mpsc::channel::<WsMessage>(4);
    let mut client = Client::new(tx);
    client.identify(User::new(alice(), "Alice").unwrap());
    assert_eq!(client.user_id(), Some(&alice()));
}

#[tokio::test]
async fn test_attached_subscription_forwards_events() {
    let broker = Arc::new(Broker::default());
    broker.create_topic(&room());
    let (tx, mut rx) = mpsc::channel(8);
    let mut client = Client::new(tx);

    client.attach(broker.subscribe(&room(), &alice()).unwrap());
    assert!(client.is_attached(&room()));
    broker.publish(
        &room(),
        Event::RoomRenamed {
            name: "lounge".into(),
        },
    );

    let frame = next_json(&mut rx).await;
    assert_eq!(frame["type"], "event");
    assert_eq!(frame["room_id"], "room-1");
    assert_eq!(frame["event"], "RoomRenamed");
    assert_eq!(frame["data"]["name"], "lounge");
}

#[tokio::test]
async fn test_room_deletion_sends_final_event() {
    let broker = Arc::new(Broker::default());
    broker.create_topic(&room());
    let (tx, mut rx) = mpsc::channel(8);
    let mut client = Client::new(tx);
    client.attach(broker.subscribe(&room(), &alice()).unwrap());

    broker.destroy_topic(&room());

    let frame = next_json(&mut rx).await;
    assert_eq!(frame["event"], "RoomDeleted");
    assert_eq!(frame["room_id"], "room-1");
}

#[tokio::test]
async fn test_detach_stops_forwarding() {
    let broker = Arc::new(Broker::default());
    broker.create_topic(&room());
    let (tx, mut rx) = mpsc::channel(8);
    let mut client = Client::new(tx);
    client.attach(broker.subscribe(&room(), &alice()).unwrap());

    assert!(client.detach(&room()));
    assert!(!client.detach(&room()));

    // the aborted task drops its subscription, which leaves the topic
    timeout(Duration::from_secs(1), async {
        while broker.is_subscribed(&room(), &alice()) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscription released");

    broker.publish(&room(), Event::RoomDeleted {});
    assert!(
        timeout(Duration::from_millis(50), rx.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_dropping_client_releases_subscriptions() {
    let broker = Arc::new(Broker::default());
    broker.create_topic(&room());
    let (tx, _rx) = mpsc::channel(8);
    let mut client = Client::new(tx);
    client.attach(broker.subscribe(&room(), &alice()).unwrap());

    drop(client);

    timeout(Duration::from_secs(1), async {
        while broker.subscriber_count(&room()) > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscription released");
}
