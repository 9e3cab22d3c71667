//! Client side of the board: a local, display-ordered copy of one project
//! that applies moves optimistically and reconciles them with the server.

pub mod api;
pub mod manager;
pub mod state;

pub use api::{BoardApi, HttpBoardApi};
pub use manager::{BoardManager, LoadState, MoveOutcome, PendingMove};
pub use state::{BoardState, Move};
