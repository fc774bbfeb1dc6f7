//! Live status table.
//!
//! Purely observational: reads feed snapshots through `watch` channels and
//! never touches the poll controller.
//!
//! - `table` - [`StatusBoard`] and the table widget
//! - `loop_runner` - the redraw loop

mod loop_runner;
mod table;

pub use loop_runner::run;
pub use table::{build_table, StatusBoard};
