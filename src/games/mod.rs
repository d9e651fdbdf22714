//! Game rule implementations.

pub mod chess;
