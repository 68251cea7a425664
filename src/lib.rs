//! Host side of the Q9 keypad engine: platform key capture, the event
//! channel between the capture and composition contexts, output injection
//! and the lifecycle controller tying them to a `ComposeSession`.

pub mod capture;
pub mod channel;
pub mod controller;
pub mod output;
pub mod presenter;
pub mod trace_init;

pub use controller::{CaptureStatus, Controller};
pub use trace_init::init_tracing;

pub use q9_core::{dict, key, script, settings};
pub use q9_session::{ComposeSession, KeyResponse, Snapshot, Visibility};
