//! Seat registry and turn gate for the single chess session.

use crate::games::chess::{
    AppliedMove, Assignment, ChessRules, MoveRejection, MoveRequest, Role, RulesAdapter,
};
use strum::IntoEnumIterator;
use tracing::{debug, info, instrument, warn};

/// Transport-level identity of a connection.
pub type ConnectionId = u64;

/// Why the turn gate refused a sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Denial {
    /// Sender holds no seat.
    #[display("Observers cannot move")]
    Observer,

    /// Sender holds a seat but the other side is to move.
    #[display("Not your turn: {} to move, you are {}", turn_owner, role)]
    NotYourTurn {
        /// Sender's seat.
        role: Role,
        /// Seat currently to move.
        turn_owner: Role,
    },
}

impl std::error::Error for Denial {}

/// Verdict of the turn gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// Sender owns the turn.
    Allowed(Role),
    /// Sender may not move right now.
    Denied(Denial),
}

/// Result of submitting a move to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The move was applied; canonical state advanced.
    Accepted(AppliedMove),
    /// Turn gate refused the sender.
    Denied(Denial),
    /// Rules adapter refused the move.
    Rejected(MoveRejection),
}

/// The chess session: two seats and the canonical position.
///
/// The turn owner is always read from the canonical state and never stored.
#[derive(Debug, Clone)]
pub struct Session<R: RulesAdapter = ChessRules> {
    white: Option<ConnectionId>,
    black: Option<ConnectionId>,
    canonical: R,
}

impl Session<ChessRules> {
    /// Creates a session at the standard starting position.
    pub fn standard() -> Self {
        Self::new(ChessRules::new())
    }
}

impl<R: RulesAdapter> Session<R> {
    /// Creates a session with both seats empty.
    #[instrument(skip(canonical))]
    pub fn new(canonical: R) -> Self {
        info!(board_state = %canonical.serialize(), "Creating chess session");
        Self {
            white: None,
            black: None,
            canonical,
        }
    }

    /// Seats a connection in the first free slot, white before black.
    ///
    /// A connection that already holds a seat keeps it.
    #[instrument(skip(self))]
    pub fn assign_role(&mut self, conn: ConnectionId) -> Assignment {
        if let Assignment::Player(role) = self.role_of(conn) {
            debug!(conn, %role, "Connection already seated");
            return Assignment::Player(role);
        }

        if self.white.is_none() {
            info!(conn, role = "white", "Seating connection");
            self.white = Some(conn);
            Assignment::Player(Role::White)
        } else if self.black.is_none() {
            info!(conn, role = "black", "Seating connection");
            self.black = Some(conn);
            Assignment::Player(Role::Black)
        } else {
            info!(conn, "Both seats taken, connection observes");
            Assignment::Observer
        }
    }

    /// Frees the seat held by `conn`, if any. Returns the freed seat.
    #[instrument(skip(self))]
    pub fn release_role(&mut self, conn: ConnectionId) -> Option<Role> {
        let freed = match self.role_of(conn) {
            Assignment::Player(Role::White) => {
                self.white = None;
                Some(Role::White)
            }
            Assignment::Player(Role::Black) => {
                self.black = None;
                Some(Role::Black)
            }
            Assignment::Observer => None,
        };
        match freed {
            Some(role) => info!(conn, %role, "Seat released"),
            None => debug!(conn, "Connection held no seat"),
        }
        freed
    }

    /// Looks up the seat held by `conn`.
    pub fn role_of(&self, conn: ConnectionId) -> Assignment {
        if self.white == Some(conn) {
            Assignment::Player(Role::White)
        } else if self.black == Some(conn) {
            Assignment::Player(Role::Black)
        } else {
            Assignment::Observer
        }
    }

    /// Connection seated in `role`, if any.
    pub fn holder(&self, role: Role) -> Option<ConnectionId> {
        match role {
            Role::White => self.white,
            Role::Black => self.black,
        }
    }

    /// Number of occupied seats (0, 1 or 2).
    pub fn seated(&self) -> usize {
        Role::iter().filter(|role| self.holder(*role).is_some()).count()
    }

    /// Seat whose move is legal, read from the canonical state.
    pub fn turn_owner(&self) -> Role {
        self.canonical.side_to_move()
    }

    /// Serialized canonical state.
    pub fn board_state(&self) -> String {
        self.canonical.serialize()
    }

    /// Read access to the canonical state.
    pub fn canonical(&self) -> &R {
        &self.canonical
    }

    /// Decides whether `conn` may move now. Does not check legality.
    #[instrument(skip(self, request), fields(request = %request))]
    pub fn authorize(&self, conn: ConnectionId, request: &MoveRequest) -> Authorization {
        self.check_turn(conn)
    }

    /// Turn gate without a request, for payloads that never decoded.
    pub fn check_turn(&self, conn: ConnectionId) -> Authorization {
        let role = match self.role_of(conn) {
            Assignment::Player(role) => role,
            Assignment::Observer => {
                debug!(conn, "Observer attempted a move");
                return Authorization::Denied(Denial::Observer);
            }
        };

        let turn_owner = self.turn_owner();
        if role != turn_owner {
            debug!(conn, %role, %turn_owner, "Move out of turn");
            return Authorization::Denied(Denial::NotYourTurn { role, turn_owner });
        }

        Authorization::Allowed(role)
    }

    /// Runs a request through the turn gate and the rules adapter.
    ///
    /// The canonical state changes only on [`MoveOutcome::Accepted`].
    #[instrument(skip(self, request), fields(request = %request))]
    pub fn submit(&mut self, conn: ConnectionId, request: &MoveRequest) -> MoveOutcome {
        let role = match self.authorize(conn, request) {
            Authorization::Allowed(role) => role,
            Authorization::Denied(denial) => {
                warn!(conn, %denial, "Move denied");
                return MoveOutcome::Denied(denial);
            }
        };

        match self.canonical.apply(request) {
            Ok((next, applied)) => {
                self.canonical = next;
                info!(
                    conn,
                    %role,
                    from = %applied.from,
                    to = %applied.to,
                    turn_owner = %self.turn_owner(),
                    "Move accepted"
                );
                MoveOutcome::Accepted(applied)
            }
            Err(rejection) => {
                warn!(conn, %role, %rejection, "Move rejected by rules");
                MoveOutcome::Rejected(rejection)
            }
        }
    }
}

impl Default for Session<ChessRules> {
    fn default() -> Self {
        Self::standard()
    }
}
