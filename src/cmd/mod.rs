//! CLI command implementations.
//!
//! | Module   | Commands handled              |
//! |----------|-------------------------------|
//! | `serve`  | `Serve`, `Init`               |
//! | `board`  | `Projects`, `Show`, `Move`    |

pub mod board;
pub mod serve;

pub use board::{cmd_move, cmd_projects, cmd_show};
pub use serve::{cmd_init, cmd_serve};
