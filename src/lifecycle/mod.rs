//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → background loops exit → stop accepting → drain (bounded) → exit
//! ```
//!
//! # Design Decisions
//! - One broadcast channel for the whole process
//! - Subscribers register before their task is spawned
//! - Draining has a deadline: remaining connections are dropped after it

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
