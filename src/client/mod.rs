//! Client side of the session protocol.

mod projection;
mod watch;

pub use projection::{Projection, ProjectionUpdate};
pub use watch::{parse_move_input, run_watch};
