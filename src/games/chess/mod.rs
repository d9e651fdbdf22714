mod rules;
mod types;

pub use rules::{ChessRules, Piece, RulesAdapter, RulesError, START_FEN};
pub use types::{AppliedMove, Assignment, MoveRejection, MoveRequest, PieceKind, Role, Square};
