//! Deterministic simulation harness for the BluLok client.
//!
//! Everything a real phone and a real lock would do, simulated:
//!
//! - [`SimRadio`] and [`SimLock`]: accessories that answer radio commands,
//!   with switchable faults
//! - [`World`]: the App and session wired to a [`SimRadio`] in one
//!   synchronous loop, driven by [`Operation`]s
//! - [`SimDriver`] and [`MemoryAssets`]: runtime driver and frame source for
//!   async tests under paused tokio time
//! - [`invariants`]: properties checked after every step
//!
//! The same seed always reproduces the same run.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod assets;
pub mod invariants;
mod operation;
mod sim_driver;
mod sim_lock;
mod world;

pub use assets::{MemoryAssets, RemoteBehavior};
pub use invariants::{Invariant, InvariantKind, InvariantRegistry, SystemSnapshot, Violation};
pub use operation::{FaultKind, LockIndex, Operation};
pub use sim_driver::{SimDriver, SimDriverError, SimHandle};
pub use sim_lock::{Faults, LINK_LOST_TEXT, REFUSED_TEXT, SimLock, SimRadio};
pub use world::World;
