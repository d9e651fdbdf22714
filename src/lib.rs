//! Strictly Chess - a two-seat chess session server
//!
//! Pairs the first two WebSocket connections into white and black, relays
//! turn-checked moves between them, and keeps any number of observers in
//! sync with the authoritative position.
//!
//! # Architecture
//!
//! - **Session**: seat registry and turn gate over the canonical position
//! - **Rules**: legality and FEN serialization (`shakmaty`)
//! - **Relay**: fan-out of accepted moves to every connection
//! - **Hub**: single task that processes connect, disconnect and move events in order
//! - **Server**: axum routes and the `/ws` socket handler
//! - **Client**: read-only projection and a terminal watcher
//!
//! # Example
//!
//! ```
//! use strictly_chess::{MoveOutcome, MoveRequest, Role, Session};
//!
//! let mut session = Session::standard();
//! session.assign_role(1);
//! session.assign_role(2);
//!
//! let outcome = session.submit(1, &MoveRequest::new("e2", "e4"));
//! assert!(matches!(outcome, MoveOutcome::Accepted(_)));
//! assert_eq!(session.turn_owner(), Role::Black);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod client;
mod config;
mod games;
mod hub;
mod protocol;
mod relay;
mod server;
mod session;

// Crate-level exports - Configuration
pub use config::{ConfigError, MIN_OUTBOX_CAPACITY, ServerConfig};

// Crate-level exports - Chess rules and domain types
pub use games::chess::{
    AppliedMove, Assignment, ChessRules, MoveRejection, MoveRequest, Piece, PieceKind, Role,
    RulesAdapter, RulesError, START_FEN, Square,
};

// Crate-level exports - Session registry and turn gate
pub use session::{Authorization, ConnectionId, Denial, MoveOutcome, Session};

// Crate-level exports - Relay and acceptance path
pub use hub::{ConnectionPhase, Hub, HubEvent, HubHandle, HubOptions};
pub use relay::{Broadcaster, Outbox};

// Crate-level exports - Wire protocol
pub use protocol::{ClientMessage, FrameError, InvalidMove, ServerMessage, decode_client_frame};

// Crate-level exports - Server
pub use server::{AppState, router, run_http_server, serve, spawn_hub};

// Crate-level exports - Client
pub use client::{Projection, ProjectionUpdate, parse_move_input, run_watch};
