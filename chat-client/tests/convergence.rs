//! Multi-participant convergence over a simulated multicast segment.
//!
//! Every test runs on paused Tokio time, so resync intervals elapse
//! instantly once all tasks are idle.

use std::time::Duration;

use chat_client::{
    ChatSession, MemoryHub, MemoryTransport, SessionEvent, SessionOptions, Transport,
};
use chat_core::ResyncSchedule;
use chat_types::MemberName;
use tokio::sync::mpsc::UnboundedReceiver;

struct Peer {
    id: usize,
    session: ChatSession<MemoryTransport>,
    events: UnboundedReceiver<SessionEvent>,
}

fn options() -> SessionOptions {
    SessionOptions {
        resync: ResyncSchedule::new(Duration::from_secs(1)),
        leave_grace: Duration::from_millis(100),
        member_ttl_ticks: 3,
        loopback: true,
    }
}

fn peer(hub: &MemoryHub, name: &str) -> Peer {
    let transport = hub.endpoint();
    let id = transport.id();
    let (session, events) =
        ChatSession::start(MemberName::new(name).unwrap(), transport, options());
    Peer {
        id,
        session,
        events,
    }
}

async fn sorted_members(peer: &Peer) -> Vec<String> {
    let mut members: Vec<String> = peer
        .session
        .members()
        .await
        .into_iter()
        .map(MemberName::into_string)
        .collect();
    members.sort();
    members
}

/// Wait (in virtual time) until every peer sees exactly `expected`.
async fn converge(peers: &[&Peer], expected: &[&str]) {
    let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    expected.sort();

    let result = tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            let mut all_match = true;
            for peer in peers {
                if sorted_members(peer).await != expected {
                    all_match = false;
                    break;
                }
            }
            if all_match {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;

    if result.is_err() {
        let mut views = Vec::new();
        for peer in peers {
            views.push(sorted_members(peer).await);
        }
        panic!("peers did not converge on {:?}: {:?}", expected, views);
    }
}

/// Wait for a chat event on `peer`.
async fn next_chat(peer: &mut Peer) -> (String, String) {
    let wait = async {
        while let Some(event) = peer.events.recv().await {
            if let SessionEvent::Chat { sender, text } = event {
                return Some((sender.into_string(), text));
            }
        }
        None
    };
    tokio::time::timeout(Duration::from_secs(10), wait)
        .await
        .expect("timed out waiting for chat")
        .expect("event stream ended")
}

// ===========================================
// Joining
// ===========================================

#[tokio::test(start_paused = true)]
async fn sequential_joins_converge() {
    let hub = MemoryHub::new();
    let alice = peer(&hub, "alice");
    let bob = peer(&hub, "bob");
    let carol = peer(&hub, "carol");

    alice.session.join().await.unwrap();
    bob.session.join().await.unwrap();
    carol.session.join().await.unwrap();

    converge(&[&alice, &bob, &carol], &["alice", "bob", "carol"]).await;
}

#[tokio::test(start_paused = true)]
async fn listener_learns_members_without_joining() {
    let hub = MemoryHub::new();
    let alice = peer(&hub, "alice");
    let bob = peer(&hub, "bob");
    let observer = peer(&hub, "observer");

    alice.session.join().await.unwrap();
    bob.session.join().await.unwrap();

    converge(&[&alice, &bob, &observer], &["alice", "bob"]).await;
    assert!(!observer.session.is_joined().await);
}

#[tokio::test(start_paused = true)]
async fn late_joiner_receives_full_set() {
    let hub = MemoryHub::new();
    let alice = peer(&hub, "alice");
    let bob = peer(&hub, "bob");
    alice.session.join().await.unwrap();
    bob.session.join().await.unwrap();
    converge(&[&alice, &bob], &["alice", "bob"]).await;

    // A process started after the others, so it missed every earlier datagram
    let dave = peer(&hub, "dave");
    dave.session.join().await.unwrap();

    converge(&[&alice, &bob, &dave], &["alice", "bob", "dave"]).await;
}

// ===========================================
// Loss
// ===========================================

#[tokio::test(start_paused = true)]
async fn lost_datagrams_are_healed_by_resync() {
    let hub = MemoryHub::new();
    let alice = peer(&hub, "alice");
    let bob = peer(&hub, "bob");
    alice.session.join().await.unwrap();
    bob.session.join().await.unwrap();
    converge(&[&alice, &bob], &["alice", "bob"]).await;

    // Carol is deaf while she joins: she misses every snapshot sent to her
    let carol = peer(&hub, "carol");
    let carol_id = carol.id;
    hub.set_filter(move |d| d.to != carol_id);
    carol.session.join().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(sorted_members(&carol).await, vec!["carol"]);

    hub.clear_filter();
    converge(&[&alice, &bob, &carol], &["alice", "bob", "carol"]).await;
}

#[tokio::test(start_paused = true)]
async fn lost_departure_is_expired() {
    let hub = MemoryHub::new();
    let alice = peer(&hub, "alice");
    let bob = peer(&hub, "bob");
    let carol = peer(&hub, "carol");
    for p in [&alice, &bob, &carol] {
        p.session.join().await.unwrap();
    }
    converge(&[&alice, &bob, &carol], &["alice", "bob", "carol"]).await;

    // Everything bob sends from now on is lost, including his DISCONNECTED
    let bob_id = bob.id;
    hub.set_filter(move |d| d.from != bob_id);
    bob.session.leave().await.unwrap();

    converge(&[&alice, &carol], &["alice", "carol"]).await;
}

// ===========================================
// Leaving
// ===========================================

#[tokio::test(start_paused = true)]
async fn departure_is_seen_by_everyone() {
    let hub = MemoryHub::new();
    let alice = peer(&hub, "alice");
    let bob = peer(&hub, "bob");
    let carol = peer(&hub, "carol");
    for p in [&alice, &bob, &carol] {
        p.session.join().await.unwrap();
    }
    converge(&[&alice, &bob, &carol], &["alice", "bob", "carol"]).await;

    bob.session.leave().await.unwrap();

    assert!(!bob.session.transport().is_open());
    assert_eq!(hub.endpoint_count(), 2);
    converge(&[&alice, &carol], &["alice", "carol"]).await;
}

#[tokio::test(start_paused = true)]
async fn rejoin_after_leave_with_new_session() {
    let hub = MemoryHub::new();
    let alice = peer(&hub, "alice");
    let bob = peer(&hub, "bob");
    alice.session.join().await.unwrap();
    bob.session.join().await.unwrap();
    converge(&[&alice, &bob], &["alice", "bob"]).await;

    bob.session.leave().await.unwrap();
    converge(&[&alice], &["alice"]).await;

    let bob_again = peer(&hub, "bob");
    bob_again.session.join().await.unwrap();
    converge(&[&alice, &bob_again], &["alice", "bob"]).await;
}

// ===========================================
// Chat
// ===========================================

#[tokio::test(start_paused = true)]
async fn chat_reaches_every_peer_including_sender() {
    let hub = MemoryHub::new();
    let mut alice = peer(&hub, "alice");
    let mut bob = peer(&hub, "bob");
    alice.session.join().await.unwrap();
    bob.session.join().await.unwrap();

    alice.session.send_chat("hello bob").await.unwrap();

    assert_eq!(
        next_chat(&mut bob).await,
        ("alice".to_string(), "hello bob".to_string())
    );
    assert_eq!(
        next_chat(&mut alice).await,
        ("alice".to_string(), "hello bob".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn membership_events_report_changes() {
    let hub = MemoryHub::new();
    let mut alice = peer(&hub, "alice");
    let bob = peer(&hub, "bob");
    alice.session.join().await.unwrap();
    bob.session.join().await.unwrap();
    converge(&[&alice, &bob], &["alice", "bob"]).await;

    let mut saw_bob_join = false;
    while let Ok(event) = alice.events.try_recv() {
        if let SessionEvent::MembershipChanged { joined, .. } = event {
            if joined.iter().any(|m| m == "bob") {
                saw_bob_join = true;
            }
        }
    }
    assert!(saw_bob_join);
}
