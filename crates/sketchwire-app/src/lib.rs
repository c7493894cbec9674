//! sketchwire application
//!
//! Ties the canvas model, the raster renderer and the relay connection into
//! a [`Board`], plus offline journal replay.

mod board;
pub mod replay;

pub use board::{Board, BoardError, BoardResult};
pub use replay::{read_journal, replay_journal};
