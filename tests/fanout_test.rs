//! Integration tests for the fanout engine: room targeting, per-connection
//! ordering, typing exclusion, and tolerance of dead consumers.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use switchboard::auth::jwt::JwtVerifier;
use switchboard::events::{ClientEvent, ServerEvent};
use switchboard::model::{Conversation, Identity, MessageKind};
use switchboard::session::{connection_channel, EventStream};
use switchboard::store::memory::{
    MemoryConversationStore, MemoryIdentityStore, MemoryMessageStore,
};
use switchboard::store::ConversationStore;
use switchboard::{CoreConfig, CoreState, Session};

struct Harness {
    core: Arc<CoreState>,
    identities: Arc<MemoryIdentityStore>,
    conversations: Arc<MemoryConversationStore>,
    verifier: Arc<JwtVerifier>,
}

fn harness() -> Harness {
    let identities = Arc::new(MemoryIdentityStore::new());
    let conversations = Arc::new(MemoryConversationStore::new());
    let verifier = Arc::new(JwtVerifier::new(JwtVerifier::generate_secret()));
    let core = CoreState::new(
        CoreConfig::default(),
        identities.clone(),
        conversations.clone(),
        Arc::new(MemoryMessageStore::new()),
        verifier.clone(),
    );
    Harness {
        core,
        identities,
        conversations,
        verifier,
    }
}

async fn connect_user(harness: &Harness, id: &str) -> (Session, EventStream) {
    harness.identities.insert(Identity {
        id: id.to_string(),
        username: id.to_string(),
        email: format!("{id}@example.com"),
        is_online: false,
        last_seen: Utc::now(),
    });
    let token = harness.verifier.issue(id).expect("issue token");
    let (handle, stream) = connection_channel();
    let session = harness
        .core
        .connect(&token, handle)
        .await
        .expect("admission should succeed");
    (session, stream)
}

async fn seed_conversation(harness: &Harness, id: &str, participants: &[&str]) {
    harness
        .conversations
        .create(Conversation {
            id: id.to_string(),
            name: None,
            is_group: participants.len() > 2,
            participants: participants.iter().map(|p| p.to_string()).collect(),
            admin: None,
            last_message: None,
            created_at: Utc::now(),
        })
        .await
        .expect("seed conversation");
}

async fn recv_event(stream: &mut EventStream) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(1), stream.recv())
        .await
        .expect("expected an event within timeout")
        .expect("stream should be open")
}

async fn drain(stream: &mut EventStream) {
    while let Ok(Some(_)) = tokio::time::timeout(Duration::from_millis(100), stream.recv()).await {}
}

async fn assert_silent(stream: &mut EventStream) {
    let result = tokio::time::timeout(Duration::from_millis(200), stream.recv()).await;
    assert!(result.is_err(), "expected no event, got {:?}", result);
}

fn send(chat_id: &str, content: &str) -> ClientEvent {
    ClientEvent::SendMessage {
        chat_id: chat_id.to_string(),
        content: content.to_string(),
        kind: MessageKind::Text,
    }
}

#[tokio::test]
async fn test_publish_reaches_members_and_only_members() {
    let harness = harness();
    seed_conversation(&harness, "c1", &["alice", "bob"]).await;

    let (alice, mut alice_stream) = connect_user(&harness, "alice").await;
    let (_bob, mut bob_stream) = connect_user(&harness, "bob").await;
    let (_mallory, mut mallory_stream) = connect_user(&harness, "mallory").await;
    drain(&mut alice_stream).await;
    drain(&mut bob_stream).await;
    drain(&mut mallory_stream).await;

    alice
        .handle_event(send("c1", "members only"))
        .await
        .expect("send should succeed");

    match recv_event(&mut bob_stream).await {
        ServerEvent::MessageReceived(payload) => {
            assert_eq!(payload.content, "members only");
            assert_eq!(payload.chat, "c1");
        }
        other => panic!("expected message-received, got {:?}", other),
    }
    // Exactly once for a member, never for a non-member.
    assert_silent(&mut bob_stream).await;
    assert_silent(&mut mallory_stream).await;
}

#[tokio::test]
async fn test_sender_also_receives_room_messages() {
    let harness = harness();
    seed_conversation(&harness, "c1", &["alice", "bob"]).await;

    let (alice, mut alice_stream) = connect_user(&harness, "alice").await;
    drain(&mut alice_stream).await;

    alice
        .handle_event(send("c1", "echo"))
        .await
        .expect("send should succeed");

    match recv_event(&mut alice_stream).await {
        ServerEvent::MessageReceived(payload) => assert_eq!(payload.sender.id, "alice"),
        other => panic!("expected message-received, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delivery_order_matches_publish_order_across_rooms() {
    let harness = harness();
    seed_conversation(&harness, "c1", &["alice", "bob"]).await;
    seed_conversation(&harness, "c2", &["alice", "bob"]).await;

    let (alice, mut alice_stream) = connect_user(&harness, "alice").await;
    let (_bob, mut bob_stream) = connect_user(&harness, "bob").await;
    drain(&mut alice_stream).await;
    drain(&mut bob_stream).await;

    alice
        .handle_event(send("c1", "first"))
        .await
        .expect("send should succeed");
    alice
        .handle_event(send("c2", "second"))
        .await
        .expect("send should succeed");
    alice
        .handle_event(send("c1", "third"))
        .await
        .expect("send should succeed");

    let mut contents = Vec::new();
    for _ in 0..3 {
        match recv_event(&mut bob_stream).await {
            ServerEvent::MessageReceived(payload) => contents.push(payload.content),
            other => panic!("expected message-received, got {:?}", other),
        }
    }
    assert_eq!(contents, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_dead_connection_does_not_break_fanout() {
    let harness = harness();
    seed_conversation(&harness, "team", &["alice", "bob", "carol"]).await;

    let (alice, mut alice_stream) = connect_user(&harness, "alice").await;
    let (_bob, bob_stream) = connect_user(&harness, "bob").await;
    let (_carol, mut carol_stream) = connect_user(&harness, "carol").await;
    drain(&mut alice_stream).await;
    drain(&mut carol_stream).await;

    // Bob's transport died without a disconnect signal.
    drop(bob_stream);

    alice
        .handle_event(send("team", "anyone there?"))
        .await
        .expect("send must survive a dead member connection");

    match recv_event(&mut carol_stream).await {
        ServerEvent::MessageReceived(payload) => assert_eq!(payload.content, "anyone there?"),
        other => panic!("expected message-received, got {:?}", other),
    }
}

#[tokio::test]
async fn test_typing_indicator_skips_the_typist() {
    let harness = harness();
    seed_conversation(&harness, "c1", &["alice", "bob"]).await;

    let (alice, mut alice_stream) = connect_user(&harness, "alice").await;
    let (_bob, mut bob_stream) = connect_user(&harness, "bob").await;
    drain(&mut alice_stream).await;
    drain(&mut bob_stream).await;

    alice
        .handle_event(ClientEvent::StartTyping {
            chat_id: "c1".to_string(),
        })
        .await
        .expect("typing should succeed");

    match recv_event(&mut bob_stream).await {
        ServerEvent::TypingStart(payload) => {
            assert_eq!(payload.user_id, "alice");
            assert_eq!(payload.chat_id, "c1");
        }
        other => panic!("expected typing-start, got {:?}", other),
    }
    assert_silent(&mut alice_stream).await;

    alice
        .handle_event(ClientEvent::StopTyping {
            chat_id: "c1".to_string(),
        })
        .await
        .expect("typing should succeed");

    match recv_event(&mut bob_stream).await {
        ServerEvent::TypingStop(payload) => assert_eq!(payload.user_id, "alice"),
        other => panic!("expected typing-stop, got {:?}", other),
    }
}

#[tokio::test]
async fn test_leave_room_stops_delivery() {
    let harness = harness();
    seed_conversation(&harness, "c1", &["alice", "bob"]).await;

    let (alice, mut alice_stream) = connect_user(&harness, "alice").await;
    let (bob, mut bob_stream) = connect_user(&harness, "bob").await;
    drain(&mut alice_stream).await;
    drain(&mut bob_stream).await;

    bob.handle_event(ClientEvent::LeaveRoom {
        chat_id: "c1".to_string(),
    })
    .await
    .expect("leave should succeed");

    alice
        .handle_event(send("c1", "after leave"))
        .await
        .expect("send should succeed");
    assert_silent(&mut bob_stream).await;

    // Rejoining restores delivery; membership is still authoritative.
    bob.handle_event(ClientEvent::JoinRoom {
        chat_id: "c1".to_string(),
    })
    .await
    .expect("rejoin should succeed");

    alice
        .handle_event(send("c1", "after rejoin"))
        .await
        .expect("send should succeed");
    match recv_event(&mut bob_stream).await {
        ServerEvent::MessageReceived(payload) => assert_eq!(payload.content, "after rejoin"),
        other => panic!("expected message-received, got {:?}", other),
    }
}

#[tokio::test]
async fn test_publish_to_identity_reaches_every_device() {
    let harness = harness();

    let (_alice_phone, mut phone_stream) = connect_user(&harness, "alice").await;
    let (_alice_laptop, mut laptop_stream) = connect_user(&harness, "alice").await;
    let (_bob, mut bob_stream) = connect_user(&harness, "bob").await;
    drain(&mut phone_stream).await;
    drain(&mut laptop_stream).await;

    // Direct-to-identity delivery, e.g. "your conversation list changed".
    let event = ServerEvent::MessageRead(switchboard::events::ReadPayload {
        message_id: "m1".to_string(),
        user_id: "alice".to_string(),
    });
    harness.core.fanout.publish_to_identity("alice", &event);

    for stream in [&mut phone_stream, &mut laptop_stream] {
        match recv_event(stream).await {
            ServerEvent::MessageRead(payload) => assert_eq!(payload.message_id, "m1"),
            other => panic!("expected message-read, got {:?}", other),
        }
    }
    assert_silent(&mut bob_stream).await;
}
