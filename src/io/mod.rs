//! I/O for checkpoint state and replay reports

pub mod json;
pub mod state;

pub use json::{read_replay_report, write_replay_report, ReplayReport, StepRecord};
pub use state::StateBuffer;
