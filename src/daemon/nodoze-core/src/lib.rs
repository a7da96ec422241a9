//! nodoze Core - time windows and block I/O counter bookkeeping
//!
//! This crate holds the OS-independent pieces of nodoze: wall-clock
//! time-of-day values with wrapping range tests, and the per-field delta
//! rule applied to cumulative kernel I/O counters.
//! Follows the Single Responsibility Principle - no filesystem access here.

pub mod io;
pub mod time;

pub use io::{CounterStep, IoCounters, IoDelta, IoSnapshot, IoSource};
pub use time::{TimeError, TimeOfDay, TimeRange};
