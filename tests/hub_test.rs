//! Tests for the connection lifecycle and move relay.

use serde_json::json;
use strictly_chess::{
    ConnectionId, ConnectionPhase, Denial, Hub, HubEvent, HubOptions, MoveOutcome, MoveRejection,
    MoveRequest, Role, START_FEN, ServerMessage, Session,
};
use tokio::sync::mpsc;

/// Receiving side of a fake connection.
struct Client {
    id: ConnectionId,
    inbox: mpsc::Receiver<ServerMessage>,
}

impl Client {
    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.inbox.try_recv() {
            messages.push(message);
        }
        messages
    }
}

fn connect(hub: &mut Hub, id: ConnectionId) -> Client {
    let (outbox, inbox) = mpsc::channel(32);
    hub.handle(HubEvent::Connected { conn: id, outbox });
    Client { id, inbox }
}

fn send_move(hub: &mut Hub, client: &Client, from: &str, to: &str) -> MoveOutcome {
    hub.on_move(client.id, &MoveRequest::new(from, to))
}

fn board_states(messages: &[ServerMessage]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| match m {
            ServerMessage::BoardState(fen) => Some(fen.clone()),
            _ => None,
        })
        .collect()
}

fn new_hub() -> Hub {
    Hub::new(Session::standard(), HubOptions::default())
}

#[test]
fn test_join_sends_role_then_board() {
    let mut hub = new_hub();
    let mut a = connect(&mut hub, 1);
    let mut b = connect(&mut hub, 2);
    let mut c = connect(&mut hub, 3);

    assert_eq!(
        a.drain(),
        vec![ServerMessage::PlayerRole(Role::White), ServerMessage::BoardState(START_FEN.into())]
    );
    assert_eq!(
        b.drain(),
        vec![ServerMessage::PlayerRole(Role::Black), ServerMessage::BoardState(START_FEN.into())]
    );
    assert_eq!(
        c.drain(),
        vec![ServerMessage::SpectatorRole, ServerMessage::BoardState(START_FEN.into())]
    );
}

#[test]
fn test_full_scenario() {
    let mut hub = new_hub();
    let mut a = connect(&mut hub, 1);
    let mut b = connect(&mut hub, 2);
    let mut c = connect(&mut hub, 3);
    a.drain();
    b.drain();
    c.drain();

    // White opens; everyone sees the move and the same position.
    assert!(matches!(send_move(&mut hub, &a, "e2", "e4"), MoveOutcome::Accepted(_)));
    let (ma, mb, mc) = (a.drain(), b.drain(), c.drain());
    assert_eq!(ma[0], ServerMessage::Move(MoveRequest::new("e2", "e4")));
    assert_eq!(ma, mb);
    assert_eq!(mb, mc);
    assert_eq!(board_states(&ma).len(), 1);

    // Black replies.
    assert!(matches!(send_move(&mut hub, &b, "e7", "e5"), MoveOutcome::Accepted(_)));
    let after_reply = board_states(&c.drain());
    assert_eq!(after_reply, board_states(&a.drain()));
    assert_eq!(after_reply, board_states(&b.drain()));

    // White moves, then immediately tries again out of turn.
    assert!(matches!(send_move(&mut hub, &a, "g1", "f3"), MoveOutcome::Accepted(_)));
    a.drain();
    b.drain();
    c.drain();
    let before = hub.session().board_state();
    assert!(matches!(send_move(&mut hub, &a, "d2", "d4"), MoveOutcome::Denied(_)));
    assert!(a.drain().is_empty());
    assert!(b.drain().is_empty());
    assert!(c.drain().is_empty());
    assert_eq!(hub.session().board_state(), before);

    // White leaves; nobody is told.
    assert_eq!(hub.on_disconnect(a.id), ConnectionPhase::Disconnected);
    assert!(b.drain().is_empty());
    assert!(c.drain().is_empty());

    // The next new connection takes the white seat and the current position.
    let mut d = connect(&mut hub, 4);
    assert_eq!(
        d.drain(),
        vec![ServerMessage::PlayerRole(Role::White), ServerMessage::BoardState(before)]
    );
    assert!(c.drain().is_empty());
}

#[test]
fn test_late_joiner_gets_current_position() {
    let mut hub = new_hub();
    let a = connect(&mut hub, 1);
    let b = connect(&mut hub, 2);
    send_move(&mut hub, &a, "d2", "d4");
    send_move(&mut hub, &b, "d7", "d5");
    send_move(&mut hub, &a, "c2", "c4");

    let mut late = connect(&mut hub, 3);
    let messages = late.drain();
    assert_eq!(messages[0], ServerMessage::SpectatorRole);
    assert_eq!(board_states(&messages), vec![hub.session().board_state()]);
}

#[test]
fn test_observer_moves_are_dropped_silently() {
    let mut hub = new_hub();
    let mut a = connect(&mut hub, 1);
    let _b = connect(&mut hub, 2);
    let mut c = connect(&mut hub, 3);
    a.drain();
    c.drain();

    assert!(matches!(send_move(&mut hub, &c, "e2", "e4"), MoveOutcome::Denied(_)));
    assert!(a.drain().is_empty());
    assert!(c.drain().is_empty());
    assert_eq!(hub.session().board_state(), START_FEN);
}

#[test]
fn test_illegal_move_produces_no_broadcast() {
    let mut hub = new_hub();
    let mut a = connect(&mut hub, 1);
    let mut b = connect(&mut hub, 2);
    a.drain();
    b.drain();

    assert!(matches!(send_move(&mut hub, &a, "e2", "e6"), MoveOutcome::Rejected(_)));
    assert!(a.drain().is_empty());
    assert!(b.drain().is_empty());
}

#[test]
fn test_rejection_notice_goes_to_sender_only() {
    let mut hub = Hub::new(
        Session::standard(),
        HubOptions {
            notify_rejections: true,
        },
    );
    let mut a = connect(&mut hub, 1);
    let mut b = connect(&mut hub, 2);
    a.drain();
    b.drain();

    send_move(&mut hub, &b, "e7", "e5");
    let notices = b.drain();
    assert_eq!(notices.len(), 1);
    match &notices[0] {
        ServerMessage::InvalidMove(invalid) => {
            assert_eq!(invalid.request, json!({"from": "e7", "to": "e5"}));
            assert!(invalid.reason.contains("Not your turn"));
        }
        other => panic!("Expected invalidMove, got {:?}", other),
    }
    assert!(a.drain().is_empty());
}

#[test]
fn test_observer_disconnect_keeps_seats() {
    let mut hub = new_hub();
    connect(&mut hub, 1);
    connect(&mut hub, 2);
    connect(&mut hub, 3);

    hub.handle(HubEvent::Disconnected { conn: 3 });
    assert_eq!(hub.session().seated(), 2);
    assert_eq!(hub.connections(), 2);

    // A connection that was never seen is a no-op.
    hub.handle(HubEvent::Disconnected { conn: 77 });
    assert_eq!(hub.session().seated(), 2);
}

#[test]
fn test_full_outbox_does_not_block_others() {
    let mut hub = new_hub();
    let (slow_outbox, mut slow_inbox) = mpsc::channel(2);
    hub.handle(HubEvent::Connected { conn: 1, outbox: slow_outbox });
    let mut b = connect(&mut hub, 2);
    let mut c = connect(&mut hub, 3);
    b.drain();
    c.drain();

    // The slow client's queue is already full with its join messages.
    let outcome = hub.on_move(1, &MoveRequest::new("e2", "e4"));
    assert!(matches!(outcome, MoveOutcome::Accepted(_)));

    assert_eq!(b.drain().len(), 2);
    assert_eq!(c.drain().len(), 2);
    assert_eq!(slow_inbox.try_recv().ok(), Some(ServerMessage::PlayerRole(Role::White)));
    assert!(matches!(slow_inbox.try_recv().ok(), Some(ServerMessage::BoardState(_))));
    assert!(slow_inbox.try_recv().is_err());
}

#[test]
fn test_move_and_board_arrive_together_or_not_at_all() {
    let mut hub = new_hub();
    let (slow_outbox, mut slow_inbox) = mpsc::channel(3);
    hub.handle(HubEvent::Connected { conn: 1, outbox: slow_outbox });
    let mut b = connect(&mut hub, 2);
    b.drain();

    // Two join messages queued leaves one free slot, not enough for the pair.
    hub.on_move(1, &MoveRequest::new("e2", "e4"));
    assert_eq!(b.drain().len(), 2);
    let mut queued = Vec::new();
    while let Ok(message) = slow_inbox.try_recv() {
        queued.push(message);
    }
    assert_eq!(
        queued,
        vec![ServerMessage::PlayerRole(Role::White), ServerMessage::BoardState(START_FEN.into())]
    );

    // Once drained, the next move arrives whole.
    hub.on_move(2, &MoveRequest::new("e7", "e5"));
    let current = hub.session().board_state();
    assert_eq!(
        slow_inbox.try_recv().ok(),
        Some(ServerMessage::Move(MoveRequest::new("e7", "e5")))
    );
    assert_eq!(slow_inbox.try_recv().ok(), Some(ServerMessage::BoardState(current)));
    assert!(slow_inbox.try_recv().is_err());
}

#[test]
fn test_outbox_too_small_for_greeting_gets_nothing() {
    let mut hub = new_hub();
    let (tiny_outbox, mut tiny_inbox) = mpsc::channel(1);
    let phase = hub.on_connect(1, tiny_outbox);

    assert_eq!(phase, ConnectionPhase::RoleAssigned(Role::White));
    assert!(tiny_inbox.try_recv().is_err());
}

#[test]
fn test_malformed_move_takes_the_rejection_path() {
    let mut hub = Hub::new(
        Session::standard(),
        HubOptions {
            notify_rejections: true,
        },
    );
    let mut a = connect(&mut hub, 1);
    let mut b = connect(&mut hub, 2);
    let mut c = connect(&mut hub, 3);
    a.drain();
    b.drain();
    c.drain();

    let data = json!({"from": 5, "to": "e4"});
    let outcome = hub.on_malformed_move(a.id, data.clone(), "invalid type".into());
    assert!(matches!(outcome, MoveOutcome::Rejected(MoveRejection::MalformedPayload(_))));
    let notices = a.drain();
    assert_eq!(notices.len(), 1);
    match &notices[0] {
        ServerMessage::InvalidMove(invalid) => {
            assert_eq!(invalid.request, data);
            assert!(invalid.reason.contains("Malformed move payload"));
        }
        other => panic!("Expected invalidMove, got {:?}", other),
    }
    assert!(b.drain().is_empty());
    assert!(c.drain().is_empty());
    assert_eq!(hub.session().board_state(), START_FEN);

    // The turn gate still answers first.
    hub.handle(HubEvent::MalformedMove {
        conn: c.id,
        data: json!({"from": "e2"}),
        error: "missing field `to`".into(),
    });
    match c.drain().as_slice() {
        [ServerMessage::InvalidMove(invalid)] => {
            assert_eq!(invalid.reason, Denial::Observer.to_string())
        }
        other => panic!("Expected one invalidMove, got {:?}", other),
    }
    assert!(a.drain().is_empty());
}

#[test]
fn test_closed_outbox_is_tolerated() {
    let mut hub = new_hub();
    let a = connect(&mut hub, 1);
    let mut b = connect(&mut hub, 2);
    let a_id = a.id;
    drop(a);
    b.drain();

    // White's transport vanished without a disconnect event yet.
    let outcome = hub.on_move(a_id, &MoveRequest::new("e2", "e4"));
    assert!(matches!(outcome, MoveOutcome::Accepted(_)));
    assert_eq!(b.drain().len(), 2);
}

#[tokio::test]
async fn test_spawned_hub_processes_events_in_order() {
    let hub = new_hub();
    let (handle, task) = hub.spawn(16);

    let (white_outbox, mut white) = mpsc::channel(16);
    let (black_outbox, mut black) = mpsc::channel(16);
    let w = handle.next_connection_id();
    let bl = handle.next_connection_id();
    assert_ne!(w, bl);

    assert!(handle.send(HubEvent::Connected { conn: w, outbox: white_outbox }).await);
    assert!(handle.send(HubEvent::Connected { conn: bl, outbox: black_outbox }).await);
    for (conn, from, to) in [(w, "e2", "e4"), (bl, "c7", "c5"), (w, "g1", "f3")] {
        let request = MoveRequest::new(from, to);
        assert!(handle.send(HubEvent::Move { conn, request }).await);
    }
    drop(handle);
    task.await.expect("Hub task panicked");

    let mut seen = Vec::new();
    while let Some(message) = black.recv().await {
        seen.push(message);
    }
    let moves: Vec<_> = seen
        .iter()
        .filter_map(|m| match m {
            ServerMessage::Move(request) => Some(request.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(moves, vec!["e2e4", "c7c5", "g1f3"]);

    // Hub dropped every outbox on exit, so white's stream ends too.
    let mut white_count = 0;
    while white.recv().await.is_some() {
        white_count += 1;
    }
    assert_eq!(white_count, seen.len());
}
