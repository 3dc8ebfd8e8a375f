//! Control-loop runtime.
//!
//! - `scheduler`: fixed-period loop driving a [`Tick`].
//! - `handoff`: latest-wins command slot between an operator thread and the loop.

pub mod handoff;
pub mod scheduler;

pub use handoff::{Command, CommandSlot, Snapshot};
pub use scheduler::{DEFAULT_FREQUENCY_HZ, LoopReport, Scheduler, Tick};
