//! Core domain types for chess sessions.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One of the two playing seats.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    strum::EnumIter,
)]
pub enum Role {
    /// White moves first.
    #[serde(rename = "w")]
    #[display("white")]
    White,
    /// Black.
    #[serde(rename = "b")]
    #[display("black")]
    Black,
}

impl Role {
    /// Returns the opposing seat.
    pub fn opponent(self) -> Self {
        match self {
            Role::White => Role::Black,
            Role::Black => Role::White,
        }
    }

    /// Wire code used in FEN and in `playerRole` payloads.
    pub fn code(self) -> char {
        match self {
            Role::White => 'w',
            Role::Black => 'b',
        }
    }
}

impl From<shakmaty::Color> for Role {
    fn from(color: shakmaty::Color) -> Self {
        match color {
            shakmaty::Color::White => Role::White,
            shakmaty::Color::Black => Role::Black,
        }
    }
}

/// What a connection was given when it joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Assignment {
    /// Holds a seat.
    #[display("player({})", _0)]
    Player(Role),
    /// No seat; receives broadcasts only.
    #[display("observer")]
    Observer,
}

impl Assignment {
    /// Returns the seat, if any.
    pub fn role(self) -> Option<Role> {
        match self {
            Assignment::Player(role) => Some(role),
            Assignment::Observer => None,
        }
    }
}

/// A board square in algebraic notation (`a1`..`h8`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    /// Creates a square from zero-based file and rank indices.
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        (file < 8 && rank < 8).then_some(Self { file, rank })
    }

    /// Maps a rendered grid cell to a square.
    ///
    /// Row 0 is rank 8 and column 0 is the a-file, independent of board
    /// orientation.
    pub fn from_row_column(row: usize, column: usize) -> Option<Self> {
        if row >= 8 || column >= 8 {
            return None;
        }
        Self::new(column as u8, 7 - row as u8)
    }

    /// Parses algebraic notation.
    pub fn parse(s: &str) -> Result<Self, MoveRejection> {
        let malformed = || MoveRejection::MalformedSquare(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(malformed());
        }
        let file = bytes[0].wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        Self::new(file, rank).ok_or_else(malformed)
    }

    /// Zero-based file index (a = 0).
    pub fn file(self) -> u8 {
        self.file
    }

    /// Zero-based rank index (rank 1 = 0).
    pub fn rank(self) -> u8 {
        self.rank
    }
}

impl std::fmt::Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", (b'a' + self.file) as char, self.rank + 1)
    }
}

impl FromStr for Square {
    type Err = MoveRejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Square> for shakmaty::Square {
    fn from(square: Square) -> Self {
        shakmaty::Square::from_coords(
            shakmaty::File::new(u32::from(square.file)),
            shakmaty::Rank::new(u32::from(square.rank)),
        )
    }
}

/// Piece a pawn may promote to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, strum::EnumIter)]
pub enum PieceKind {
    /// Queen (`q`).
    #[display("q")]
    Queen,
    /// Rook (`r`).
    #[display("r")]
    Rook,
    /// Bishop (`b`).
    #[display("b")]
    Bishop,
    /// Knight (`n`).
    #[display("n")]
    Knight,
}

impl PieceKind {
    /// Parses a promotion code, case-insensitively.
    pub fn parse(s: &str) -> Result<Self, MoveRejection> {
        match s.to_ascii_lowercase().as_str() {
            "q" => Ok(PieceKind::Queen),
            "r" => Ok(PieceKind::Rook),
            "b" => Ok(PieceKind::Bishop),
            "n" => Ok(PieceKind::Knight),
            _ => Err(MoveRejection::MalformedPromotion(s.to_string())),
        }
    }

    pub(crate) fn from_role(role: shakmaty::Role) -> Option<Self> {
        match role {
            shakmaty::Role::Queen => Some(PieceKind::Queen),
            shakmaty::Role::Rook => Some(PieceKind::Rook),
            shakmaty::Role::Bishop => Some(PieceKind::Bishop),
            shakmaty::Role::Knight => Some(PieceKind::Knight),
            _ => None,
        }
    }
}

impl From<PieceKind> for shakmaty::Role {
    fn from(kind: PieceKind) -> Self {
        match kind {
            PieceKind::Queen => shakmaty::Role::Queen,
            PieceKind::Rook => shakmaty::Role::Rook,
            PieceKind::Bishop => shakmaty::Role::Bishop,
            PieceKind::Knight => shakmaty::Role::Knight,
        }
    }
}

/// A move as submitted by a client, not yet checked against turn or legality.
///
/// Fields stay as raw strings so that malformed payloads flow through the
/// rules adapter and are rejected there, rather than failing at decode time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveRequest {
    /// Source square, e.g. `e2`.
    pub from: String,
    /// Destination square, e.g. `e4`.
    pub to: String,
    /// Promotion piece code (`q`, `r`, `b`, `n`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

impl MoveRequest {
    /// Creates a request without promotion.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            promotion: None,
        }
    }

    /// Attaches a promotion code.
    pub fn with_promotion(mut self, promotion: impl Into<String>) -> Self {
        self.promotion = Some(promotion.into());
        self
    }
}

impl std::fmt::Display for MoveRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(promotion) = &self.promotion {
            write!(f, "={}", promotion)?;
        }
        Ok(())
    }
}

/// A move the rules adapter accepted, paired with the resulting position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    /// Source square.
    pub from: Square,
    /// Destination square (the king's square for castling).
    pub to: Square,
    /// Promotion piece, present only for promotions.
    pub promotion: Option<PieceKind>,
    /// Seat that made the move.
    pub mover: Role,
    /// Canonical position after the move, as FEN.
    pub board_state: String,
}

impl AppliedMove {
    /// Wire form of the move, normalized (promotion only when it applied).
    pub fn to_request(&self) -> MoveRequest {
        MoveRequest {
            from: self.from.to_string(),
            to: self.to.to_string(),
            promotion: self.promotion.map(|p| p.to_string()),
        }
    }
}

/// Why the rules adapter refused a move.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum MoveRejection {
    /// A square field was not `[a-h][1-8]`.
    #[display("Malformed square {:?}", _0)]
    MalformedSquare(String),

    /// The promotion field was not one of `q r b n`.
    #[display("Malformed promotion {:?}", _0)]
    MalformedPromotion(String),

    /// Well-formed but not legal in the current position.
    #[display("Illegal move {}", _0)]
    Illegal(String),

    /// The `move` payload did not have the request shape.
    #[display("Malformed move payload: {}", _0)]
    MalformedPayload(String),

    /// The side to move has no legal moves left.
    #[display("Game is already over")]
    GameOver,
}

impl std::error::Error for MoveRejection {}
