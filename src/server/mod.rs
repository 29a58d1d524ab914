//! The single-threaded readiness loop.
//!
//! - **`event_loop`**: owns the listener, the poller and the connection table
//! - **`table`**: open connections keyed by poll token
//! - **`listener`**: binding and bounded accept bursts
//! - **`clock`**: monotonic time source for idle timers

pub mod clock;
pub mod event_loop;
pub mod listener;
pub mod table;

pub use clock::{Clock, ManualClock, SystemClock};
pub use event_loop::{Flow, Server, ShutdownHandle};
