//! Client-side mirror of the session.
//!
//! The mirror is rebuilt from every `boardState` snapshot and never patched
//! incrementally. Move permission here is advisory; the server's turn gate
//! decides.

use crate::games::chess::{
    Assignment, ChessRules, MoveRequest, Piece, PieceKind, Role, RulesError, Square,
};
use crate::protocol::ServerMessage;
use tracing::{debug, instrument};

/// What a projection did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionUpdate {
    /// Local role was set.
    Role(Assignment),
    /// Board was rebuilt from a snapshot.
    Board,
    /// A move was recorded for display.
    LastMove(MoveRequest),
    /// Our own move was dropped by the server.
    Rejected(String),
}

/// Read-only local copy of the game as one client sees it.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    assignment: Option<Assignment>,
    board: ChessRules,
    fen: Option<String>,
    last_move: Option<MoveRequest>,
}

impl Projection {
    /// Starts with no role and the standard position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one server message into the projection.
    #[instrument(skip(self))]
    pub fn apply(&mut self, message: &ServerMessage) -> Result<ProjectionUpdate, RulesError> {
        let update = match message {
            ServerMessage::PlayerRole(role) => {
                self.assignment = Some(Assignment::Player(*role));
                ProjectionUpdate::Role(Assignment::Player(*role))
            }
            ServerMessage::SpectatorRole => {
                self.assignment = Some(Assignment::Observer);
                ProjectionUpdate::Role(Assignment::Observer)
            }
            ServerMessage::BoardState(fen) => {
                self.board = ChessRules::from_fen(fen)?;
                self.fen = Some(fen.clone());
                ProjectionUpdate::Board
            }
            ServerMessage::Move(request) => {
                self.last_move = Some(request.clone());
                ProjectionUpdate::LastMove(request.clone())
            }
            ServerMessage::InvalidMove(invalid) => {
                ProjectionUpdate::Rejected(invalid.reason.clone())
            }
        };
        debug!(?update, "Projection updated");
        Ok(update)
    }

    /// Role received from the server, if any yet.
    pub fn assignment(&self) -> Option<Assignment> {
        self.assignment
    }

    /// Last snapshot applied, verbatim.
    pub fn fen(&self) -> Option<&str> {
        self.fen.as_deref()
    }

    /// Last move announced by the server.
    pub fn last_move(&self) -> Option<&MoveRequest> {
        self.last_move.as_ref()
    }

    /// Piece on a square of the mirror.
    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.board.piece_at(square)
    }

    /// Whether the local user may pick up the piece on `square`.
    ///
    /// True only for a seated client and a piece of its own color.
    pub fn can_drag(&self, square: Square) -> bool {
        let Some(role) = self.assignment.and_then(Assignment::role) else {
            return false;
        };
        self.piece_at(square).is_some_and(|piece| piece.owner == role)
    }

    /// Black views the board from its own side.
    pub fn is_flipped(&self) -> bool {
        matches!(self.assignment, Some(Assignment::Player(Role::Black)))
    }

    /// Builds the outgoing request for a drag from `from` to `to`.
    ///
    /// Always asks for a queen; the server ignores it for non-promotions.
    pub fn move_request(&self, from: Square, to: Square) -> MoveRequest {
        MoveRequest::new(from.to_string(), to.to_string())
            .with_promotion(PieceKind::Queen.to_string())
    }

    /// Text rendering with rank and file labels, oriented for the local role.
    pub fn render(&self) -> String {
        let rows: Vec<usize> = if self.is_flipped() {
            (0..8).rev().collect()
        } else {
            (0..8).collect()
        };
        let columns: Vec<usize> = if self.is_flipped() {
            (0..8).rev().collect()
        } else {
            (0..8).collect()
        };

        let mut out = String::new();
        for &row in &rows {
            out.push_str(&format!("{} ", 8 - row));
            for &column in &columns {
                let cell = Square::from_row_column(row, column)
                    .and_then(|square| self.piece_at(square))
                    .map(Piece::glyph)
                    .unwrap_or(if (row + column) % 2 == 0 { '·' } else { ' ' });
                out.push(cell);
                out.push(' ');
            }
            out.push('\n');
        }
        out.push_str("  ");
        for &column in &columns {
            out.push((b'a' + column as u8) as char);
            out.push(' ');
        }
        out.push('\n');
        out
    }
}
