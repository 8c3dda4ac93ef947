//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer
//!     → Probe every backend concurrently (GET {address}{endpoint})
//!     → 200 marks alive, anything else marks dead
//!     → Routing reads the flag on the next selection
//! ```
//!
//! # Design Decisions
//! - No hysteresis: one probe flips the flag either way
//! - Health state is per-backend, not per-pool
//! - A failing probe never stops the loop

pub mod active;

pub use active::HealthMonitor;
