//! Process-group bootstrap and transport primitives (C1) for the shuffle
//! runtime: rank/size/barrier/collective wrappers, plus the one-sided,
//! symmetric-heap, and distributed-array primitives the transport
//! strategies in the `shuffle` crate are built from.

pub mod distributed_array;
pub mod error;
mod group;
mod initialize;
pub mod pt2pt;
pub mod rma;
pub mod symmetric;

pub use error::CommError;
pub use group::{ProcessGroup, ReduceOp};
pub use initialize::{initialize, Config, WorkerGuards};
pub use pt2pt::SendHandle;
