//! The scheduler (spec §4.F, §4.G, §6): a cooperative multi-thread
//! bytecode interpreter running over `fble-value`'s runtime heap,
//! driven by compiled `fble-compiler::bytecode` and reporting into
//! `fble-profile`'s call graph.

mod frame;
mod ids;
pub mod io;
mod scheduler;

pub use ids::ThreadId;
pub use io::{ChannelIoHost, IoHost, NullIoHost, PortSlot};
pub use scheduler::{RunResult, Scheduler};
