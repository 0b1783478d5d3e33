//! MySQL adapters for the sqlvet audit engine.
//!
//! - [`MySqlExecutor`]: a [`LiveExecutor`](sqlvet_session::LiveExecutor) over
//!   one dedicated `sqlx` connection, so `USE` and the connection id stay
//!   stable for the whole session.
//! - [`GhostTool`]: an [`OnlineDdlTool`](sqlvet_runtime::OnlineDdlTool) that
//!   runs the `gh-ost` binary.

pub mod executor;
pub mod ghost;

pub use executor::MySqlExecutor;
pub use ghost::{GhostConnection, GhostTool};
