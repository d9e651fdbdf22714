//! Connection lifecycle and the single acceptance path.
//!
//! Every connect, disconnect and move is a [`HubEvent`]. One [`Hub`] task
//! owns the [`Session`] and handles events one at a time in arrival order,
//! which is what keeps turn order and broadcast order consistent without
//! locks.

use crate::games::chess::{Assignment, ChessRules, MoveRejection, MoveRequest, Role, RulesAdapter};
use crate::protocol::{InvalidMove, ServerMessage};
use crate::relay::{Broadcaster, Outbox};
use crate::session::{Authorization, ConnectionId, MoveOutcome, Session};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Something that happened on a connection.
#[derive(Debug)]
pub enum HubEvent {
    /// Transport opened; `outbox` receives everything sent to it.
    Connected {
        /// New connection.
        conn: ConnectionId,
        /// Outgoing queue.
        outbox: Outbox,
    },
    /// Transport closed.
    Disconnected {
        /// Closed connection.
        conn: ConnectionId,
    },
    /// Client submitted a move.
    Move {
        /// Sender.
        conn: ConnectionId,
        /// Request as received.
        request: MoveRequest,
    },
    /// Client sent a `move` whose payload is not a move request.
    MalformedMove {
        /// Sender.
        conn: ConnectionId,
        /// Payload as received.
        data: Value,
        /// Decoder message.
        error: String,
    },
}

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Seated as a player.
    RoleAssigned(Role),
    /// Watching without a seat.
    Observer,
    /// Transport closed; terminal.
    Disconnected,
}

impl From<Assignment> for ConnectionPhase {
    fn from(assignment: Assignment) -> Self {
        match assignment {
            Assignment::Player(role) => ConnectionPhase::RoleAssigned(role),
            Assignment::Observer => ConnectionPhase::Observer,
        }
    }
}

/// Options for the acceptance path.
#[derive(Debug, Clone, Copy, Default)]
pub struct HubOptions {
    /// Tell the sender (and only the sender) when its move is dropped.
    pub notify_rejections: bool,
}

/// Owner of the session and of every connection's outbox.
#[derive(Debug)]
pub struct Hub<R: RulesAdapter = ChessRules> {
    session: Session<R>,
    relay: Broadcaster,
    options: HubOptions,
}

impl<R: RulesAdapter> Hub<R> {
    /// Creates a hub that takes ownership of `session`.
    pub fn new(session: Session<R>, options: HubOptions) -> Self {
        Self {
            session,
            relay: Broadcaster::new(),
            options,
        }
    }

    /// Read access to the session.
    pub fn session(&self) -> &Session<R> {
        &self.session
    }

    /// Number of live connections.
    pub fn connections(&self) -> usize {
        self.relay.len()
    }

    /// Handles one event to completion.
    pub fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::Connected { conn, outbox } => {
                self.on_connect(conn, outbox);
            }
            HubEvent::Disconnected { conn } => {
                self.on_disconnect(conn);
            }
            HubEvent::Move { conn, request } => {
                self.on_move(conn, &request);
            }
            HubEvent::MalformedMove { conn, data, error } => {
                self.on_malformed_move(conn, data, error);
            }
        }
    }

    /// Seats or admits the connection, then sends it its role and the
    /// current position.
    #[instrument(skip(self, outbox))]
    pub fn on_connect(&mut self, conn: ConnectionId, outbox: Outbox) -> ConnectionPhase {
        self.relay.register(conn, outbox);
        let assignment = self.session.assign_role(conn);

        let greeting = match assignment {
            Assignment::Player(role) => ServerMessage::PlayerRole(role),
            Assignment::Observer => ServerMessage::SpectatorRole,
        };
        let board = ServerMessage::BoardState(self.session.board_state());
        let greeted = self.relay.unicast_pair(conn, greeting, board);

        info!(
            conn,
            %assignment,
            greeted,
            connections = self.relay.len(),
            "Connection joined"
        );
        assignment.into()
    }

    /// Frees the connection's seat and forgets its outbox.
    ///
    /// Other connections are not told that a seat opened.
    #[instrument(skip(self))]
    pub fn on_disconnect(&mut self, conn: ConnectionId) -> ConnectionPhase {
        let known = self.relay.unregister(conn);
        let freed = self.session.release_role(conn);
        info!(
            conn,
            known,
            freed = ?freed,
            connections = self.relay.len(),
            "Connection left"
        );
        ConnectionPhase::Disconnected
    }

    /// Gates, applies and relays a move.
    #[instrument(skip(self, request), fields(request = %request))]
    pub fn on_move(&mut self, conn: ConnectionId, request: &MoveRequest) -> MoveOutcome {
        if !self.relay.contains(conn) {
            debug!(conn, "Move from a connection that is not live");
        }

        let outcome = self.session.submit(conn, request);
        match &outcome {
            MoveOutcome::Accepted(applied) => {
                self.relay.on_accepted(applied);
            }
            MoveOutcome::Denied(_) | MoveOutcome::Rejected(_) => {
                let echoed = serde_json::to_value(request).unwrap_or(Value::Null);
                self.notify_sender(conn, echoed, &outcome);
            }
        }
        outcome
    }

    /// Drops a `move` whose payload never decoded, the way an illegal move
    /// is dropped.
    #[instrument(skip(self, data))]
    pub fn on_malformed_move(
        &mut self,
        conn: ConnectionId,
        data: Value,
        error: String,
    ) -> MoveOutcome {
        let outcome = match self.session.check_turn(conn) {
            Authorization::Denied(denial) => MoveOutcome::Denied(denial),
            Authorization::Allowed(_) => {
                MoveOutcome::Rejected(MoveRejection::MalformedPayload(error))
            }
        };
        warn!(conn, %data, ?outcome, "Malformed move dropped");
        self.notify_sender(conn, data, &outcome);
        outcome
    }

    fn notify_sender(&self, conn: ConnectionId, request: Value, outcome: &MoveOutcome) {
        if !self.options.notify_rejections {
            return;
        }
        let reason = match outcome {
            MoveOutcome::Denied(denial) => denial.to_string(),
            MoveOutcome::Rejected(rejection) => rejection.to_string(),
            MoveOutcome::Accepted(_) => return,
        };
        self.relay
            .unicast(conn, ServerMessage::InvalidMove(InvalidMove::new(request, reason)));
    }

    /// Processes events until every sender is dropped.
    pub async fn run(mut self, mut events: mpsc::Receiver<HubEvent>) {
        info!("Hub accepting events");
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        info!(connections = self.relay.len(), "Hub stopped");
    }

    /// Spawns the hub on the runtime and returns a handle for feeding it.
    pub fn spawn(self, capacity: usize) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(self.run(rx));
        (HubHandle::new(tx), task)
    }
}

/// Cloneable entry point into a running hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    events: mpsc::Sender<HubEvent>,
    next_id: Arc<AtomicU64>,
}

impl HubHandle {
    /// Wraps an event sender.
    pub fn new(events: mpsc::Sender<HubEvent>) -> Self {
        Self {
            events,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocates a fresh connection id. Ids are never reused.
    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Queues an event, waiting for room. Returns false once the hub is gone.
    pub async fn send(&self, event: HubEvent) -> bool {
        match self.events.send(event).await {
            Ok(()) => true,
            Err(_) => {
                warn!("Hub is no longer running");
                false
            }
        }
    }
}
