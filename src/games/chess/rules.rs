//! Rules adapter: legality and FEN serialization backed by `shakmaty`.

use super::types::{AppliedMove, MoveRejection, MoveRequest, PieceKind, Role, Square};
use derive_more::{Display, Error};
use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position};
use tracing::{debug, instrument};

/// FEN of the standard starting position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Validates and applies moves against an opaque canonical state.
///
/// Implementations are immutable values: `apply` returns the successor
/// state and leaves `self` untouched.
pub trait RulesAdapter: Clone + Send + 'static {
    /// Side whose move is currently legal.
    fn side_to_move(&self) -> Role;

    /// Applies a move request, returning the new state and the applied move.
    fn apply(&self, request: &MoveRequest) -> Result<(Self, AppliedMove), MoveRejection>;

    /// Portable, order-independent serialization of the state.
    fn serialize(&self) -> String;
}

/// A piece as seen by a board view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    /// Owning seat.
    pub owner: Role,
    /// FEN letter (uppercase for white).
    pub symbol: char,
}

impl Piece {
    /// Unicode glyph for rendering.
    pub fn glyph(self) -> char {
        match self.symbol {
            'K' => '♔',
            'Q' => '♕',
            'R' => '♖',
            'B' => '♗',
            'N' => '♘',
            'P' => '♙',
            'k' => '♚',
            'q' => '♛',
            'r' => '♜',
            'b' => '♝',
            'n' => '♞',
            'p' => '♟',
            other => other,
        }
    }
}

/// Standard chess rules.
#[derive(Debug, Clone, Default)]
pub struct ChessRules {
    position: Chess,
}

impl ChessRules {
    /// Creates the standard starting position.
    #[instrument]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a position from FEN.
    #[instrument]
    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        let parsed: Fen = fen
            .parse()
            .map_err(|e| RulesError::new(format!("Invalid FEN {:?}: {}", fen, e)))?;
        let position: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| RulesError::new(format!("Illegal position {:?}: {}", fen, e)))?;
        debug!(fen, "Loaded position from FEN");
        Ok(Self { position })
    }

    /// Returns the piece on a square, if any.
    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.position
            .board()
            .piece_at(square.into())
            .map(|piece| Piece {
                owner: piece.color.into(),
                symbol: piece.char(),
            })
    }

    /// True when the side to move has no legal moves.
    pub fn is_finished(&self) -> bool {
        self.position.legal_moves().is_empty()
    }
}

impl RulesAdapter for ChessRules {
    fn side_to_move(&self) -> Role {
        self.position.turn().into()
    }

    #[instrument(skip(self), fields(request = %request))]
    fn apply(&self, request: &MoveRequest) -> Result<(Self, AppliedMove), MoveRejection> {
        let from = Square::parse(&request.from)?;
        let to = Square::parse(&request.to)?;
        let promotion = request
            .promotion
            .as_deref()
            .map(PieceKind::parse)
            .transpose()?;

        let legal = self.position.legal_moves();
        if legal.is_empty() {
            return Err(MoveRejection::GameOver);
        }

        // Promotion only has to match when the move actually promotes,
        // so clients may attach a default promotion to every move.
        let wanted_from = shakmaty::Square::from(from);
        let wanted_to = shakmaty::Square::from(to);
        let wanted_promotion = promotion.map(shakmaty::Role::from);
        let chosen = legal
            .iter()
            .find(|m| match m.to_uci(CastlingMode::Standard) {
                UciMove::Normal {
                    from,
                    to,
                    promotion,
                } => {
                    from == wanted_from
                        && to == wanted_to
                        && (promotion.is_none() || promotion == wanted_promotion)
                }
                _ => false,
            })
            .ok_or_else(|| MoveRejection::Illegal(request.to_string()))?;

        let mover = self.side_to_move();
        let applied_promotion = chosen.promotion().and_then(PieceKind::from_role);
        let mut position = self.position.clone();
        position.play_unchecked(chosen);
        let next = Self { position };

        let applied = AppliedMove {
            from,
            to,
            promotion: applied_promotion,
            mover,
            board_state: next.serialize(),
        };
        debug!(board_state = %applied.board_state, "Move applied");
        Ok((next, applied))
    }

    fn serialize(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }
}

/// Error loading a position.
#[derive(Debug, Clone, Display, Error)]
#[display("Rules error: {} at {}:{}", message, file, line)]
pub struct RulesError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl RulesError {
    /// Creates a new rules error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
