use serde_json::json;
use tempfile::tempdir;

use super::{MemoryStore, RoomStore, SledStore};
use crate::room::{Room, RoomId, User, UserId};

fn sample_room(id: &str) -> Room {
    let mut room = Room::new(RoomId::new(id), "party", UserId::new("alice")).unwrap();
    room.join(UserId::new("bob")).unwrap();
    room
}

fn exercise_store(store: &dyn RoomStore) {
    let room = sample_room("r1");
    assert!(store.load_room(room.id()).unwrap().is_none());

    store.save_room(&room).unwrap();
    let loaded = store.load_room(room.id()).unwrap().unwrap();
    assert_eq!(loaded, room);
    assert_eq!(
        loaded.members().as_slice(),
        &[UserId::new("alice"), UserId::new("bob")]
    );

    let mut renamed = loaded.clone();
    renamed.rename(&UserId::new("alice"), "afterparty").unwrap();
    store.save_room(&renamed).unwrap();
    assert_eq!(store.load_room(room.id()).unwrap().unwrap().name(), "afterparty");

    store.save_room(&sample_room("r2")).unwrap();
    assert_eq!(store.list_rooms().unwrap().len(), 2);

    assert!(store.delete_room(room.id()).unwrap());
    assert!(!store.delete_room(room.id()).unwrap());
    assert!(store.load_room(room.id()).unwrap().is_none());

    let user = User::new(UserId::new("alice"), "Alice").unwrap();
    assert!(store.load_user(&user.id).unwrap().is_none());
    store.save_user(&user).unwrap();
    assert_eq!(store.load_user(&user.id).unwrap(), Some(user));
}

#[test]
fn test_memory_store_crud() {
    exercise_store(&MemoryStore::new());
}

#[test]
fn test_sled_store_crud() {
    let dir = tempdir().unwrap();
    let store = SledStore::open(dir.path()).unwrap();
    exercise_store(&store);
}

#[test]
fn test_sled_store_survives_reopen() {
    let dir = tempdir().unwrap();
    let mut room = sample_room("r1");
    room.set_playback(&UserId::new("bob"), json!({"media": "movie.mkv", "paused": true}))
        .unwrap();

    {
        let store = SledStore::open(dir.path()).unwrap();
        store.save_room(&room).unwrap();
        store.flush().unwrap();
    }

    let store = SledStore::open(dir.path()).unwrap();
    let loaded = store.load_room(room.id()).unwrap().unwrap();
    assert_eq!(loaded, room);
    assert_eq!(loaded.playback().unwrap()["paused"], true);
}

#[test]
fn test_sled_temporary_store() {
    let store = SledStore::temporary().unwrap();
    assert!(store.list_rooms().unwrap().is_empty());
    store.save_room(&sample_room("r1")).unwrap();
    assert_eq!(store.list_rooms().unwrap().len(), 1);
}

#[test]
fn test_duplicate_members_are_rejected_on_load() {
    let raw = json!({
        "id": "r1",
        "name": "party",
        "owner_id": "alice",
        "members": ["alice", "bob", "alice"]
    });
    assert!(serde_json::from_value::<Room>(raw).is_err());
}
