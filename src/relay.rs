//! Fan-out of server messages to connection outboxes.

use crate::games::chess::AppliedMove;
use crate::protocol::ServerMessage;
use crate::session::ConnectionId;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, instrument, warn};

/// Sending half of a connection's outgoing queue.
pub type Outbox = mpsc::Sender<ServerMessage>;

/// Delivers messages to every registered connection.
///
/// Delivery never waits: a full or closed outbox loses the message and the
/// remaining recipients are still served.
#[derive(Debug, Default)]
pub struct Broadcaster {
    outboxes: BTreeMap<ConnectionId, Outbox>,
}

impl Broadcaster {
    /// Creates an empty broadcaster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a recipient.
    pub fn register(&mut self, conn: ConnectionId, outbox: Outbox) {
        self.outboxes.insert(conn, outbox);
    }

    /// Removes a recipient, dropping its outbox.
    pub fn unregister(&mut self, conn: ConnectionId) -> bool {
        self.outboxes.remove(&conn).is_some()
    }

    /// Whether `conn` is registered.
    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.outboxes.contains_key(&conn)
    }

    /// Number of registered recipients.
    pub fn len(&self) -> usize {
        self.outboxes.len()
    }

    /// True when nobody is registered.
    pub fn is_empty(&self) -> bool {
        self.outboxes.is_empty()
    }

    /// Sends to one connection. Returns whether the message was queued.
    #[instrument(skip(self, message))]
    pub fn unicast(&self, conn: ConnectionId, message: ServerMessage) -> bool {
        match self.outboxes.get(&conn) {
            Some(outbox) => deliver(conn, outbox, message),
            None => {
                debug!(conn, "Unicast to unknown connection");
                false
            }
        }
    }

    /// Sends two messages to one connection, both or neither.
    #[instrument(skip(self, first, second))]
    pub fn unicast_pair(
        &self,
        conn: ConnectionId,
        first: ServerMessage,
        second: ServerMessage,
    ) -> bool {
        match self.outboxes.get(&conn) {
            Some(outbox) => deliver_pair(conn, outbox, first, second),
            None => {
                debug!(conn, "Unicast to unknown connection");
                false
            }
        }
    }

    /// Sends two messages to every connection, each recipient getting both
    /// or neither. Returns how many got both.
    #[instrument(skip(self, first, second), fields(recipients = self.outboxes.len()))]
    pub fn broadcast_pair(&self, first: &ServerMessage, second: &ServerMessage) -> usize {
        self.outboxes
            .iter()
            .filter(|(conn, outbox)| deliver_pair(**conn, outbox, first.clone(), second.clone()))
            .count()
    }

    /// Announces an accepted move: the move first, then the new position.
    ///
    /// A recipient without room for both gets neither.
    #[instrument(skip(self, applied), fields(from = %applied.from, to = %applied.to))]
    pub fn on_accepted(&self, applied: &AppliedMove) -> usize {
        let synced = self.broadcast_pair(
            &ServerMessage::Move(applied.to_request()),
            &ServerMessage::BoardState(applied.board_state.clone()),
        );
        debug!(synced, recipients = self.outboxes.len(), "Accepted move relayed");
        synced
    }
}

fn deliver(conn: ConnectionId, outbox: &Outbox, message: ServerMessage) -> bool {
    match outbox.try_send(message) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(conn, "Outbox full, message dropped");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(conn, "Outbox closed, message dropped");
            false
        }
    }
}

fn deliver_pair(
    conn: ConnectionId,
    outbox: &Outbox,
    first: ServerMessage,
    second: ServerMessage,
) -> bool {
    if outbox.max_capacity() < 2 {
        warn!(conn, capacity = outbox.max_capacity(), "Outbox cannot hold a message pair");
        return false;
    }
    match outbox.try_reserve_many(2) {
        Ok(permits) => {
            permits
                .zip([first, second])
                .for_each(|(permit, message)| permit.send(message));
            true
        }
        Err(TrySendError::Full(())) => {
            warn!(conn, "Outbox lacks room for both messages, pair dropped");
            false
        }
        Err(TrySendError::Closed(())) => {
            debug!(conn, "Outbox closed, pair dropped");
            false
        }
    }
}
