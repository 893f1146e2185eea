//! The strategy contract (C6) and the six interchangeable transport
//! implementations (C7-C12) dispatched from it, per §4.2-§4.8.
//!
//! A strategy is selected once, at `Instance` construction, from the
//! `runtime.implementation` configuration key (§9 "Polymorphism over
//! strategies": a tagged variant, never re-dispatched per call). Each
//! variant owns the worker's local `inbuf`/`outbuf` scratch and the
//! transport-specific resources (windows, symmetric heap segments,
//! distributed arrays, ...) for the life of the instance.

#[cfg(feature = "strategy-alltoall")]
pub mod alltoall;
#[cfg(feature = "strategy-ga")]
pub mod ga;
#[cfg(feature = "strategy-ga-gs")]
pub mod ga_gs;
#[cfg(feature = "strategy-pt2pt")]
pub mod pt2pt;
#[cfg(feature = "strategy-rma")]
pub mod rma;
#[cfg(feature = "strategy-shmem")]
pub mod shmem;

use shuffle_communication::ProcessGroup;

use crate::error::RuntimeError;
use crate::job::Job;
use crate::record::{ElementType, RoutingTable};

/// Three collective operations every transport implements identically in
/// shape (§4.2): deliver inputs, run compute, retrieve outputs.
pub trait Strategy: Send {
    /// Delivers every valid `i_table` entry's record from `i_buf` into this
    /// worker's `inbuf` at the requested slot.
    fn pre_comm(
        &mut self,
        group: &ProcessGroup,
        i_buf: &[u8],
        cnt_in: usize,
        i_type: ElementType,
        i_table: &RoutingTable,
    ) -> Result<(), RuntimeError>;

    /// Invokes the job's compute callback on worker ranks; a no-op on
    /// non-worker ranks.
    fn exec_job(&mut self, job: Option<&mut dyn Job>);

    /// Retrieves every valid `o_table` entry's record from the owning
    /// worker's `outbuf` into `o_buf` at the caller's column-major position.
    fn post_comm(
        &mut self,
        group: &ProcessGroup,
        o_buf: &mut [u8],
        cnt_out: usize,
        o_type: ElementType,
        o_table: &RoutingTable,
    ) -> Result<(), RuntimeError>;
}

/// Runs the compute callback if present, shared by every strategy's
/// `exec_job` (§4.9: "the only implicit state machine is the per-call phase
/// sequence gather -> compute -> scatter").
pub(crate) fn invoke(job: Option<&mut dyn Job>, inbuf: &[u8], outbuf: &mut [u8]) {
    if let Some(job) = job {
        job.exec(inbuf, outbuf);
    }
}

/// The dispatch tag (§9 "Polymorphism over strategies"): exactly one
/// variant is constructed at `Instance::new` time and never swapped.
pub enum StrategyKind {
    #[cfg(feature = "strategy-alltoall")]
    AllToAll(alltoall::AllToAll),
    #[cfg(feature = "strategy-pt2pt")]
    Pt2Pt(pt2pt::PointToPoint),
    #[cfg(feature = "strategy-rma")]
    Rma(rma::Rma),
    #[cfg(feature = "strategy-shmem")]
    Shmem(shmem::Shmem),
    #[cfg(feature = "strategy-ga")]
    Ga(ga::Ga),
    #[cfg(feature = "strategy-ga-gs")]
    GaGs(ga_gs::GaGs),
}

impl Strategy for StrategyKind {
    fn pre_comm(
        &mut self,
        group: &ProcessGroup,
        i_buf: &[u8],
        cnt_in: usize,
        i_type: ElementType,
        i_table: &RoutingTable,
    ) -> Result<(), RuntimeError> {
        match self {
            #[cfg(feature = "strategy-alltoall")]
            StrategyKind::AllToAll(s) => s.pre_comm(group, i_buf, cnt_in, i_type, i_table),
            #[cfg(feature = "strategy-pt2pt")]
            StrategyKind::Pt2Pt(s) => s.pre_comm(group, i_buf, cnt_in, i_type, i_table),
            #[cfg(feature = "strategy-rma")]
            StrategyKind::Rma(s) => s.pre_comm(group, i_buf, cnt_in, i_type, i_table),
            #[cfg(feature = "strategy-shmem")]
            StrategyKind::Shmem(s) => s.pre_comm(group, i_buf, cnt_in, i_type, i_table),
            #[cfg(feature = "strategy-ga")]
            StrategyKind::Ga(s) => s.pre_comm(group, i_buf, cnt_in, i_type, i_table),
            #[cfg(feature = "strategy-ga-gs")]
            StrategyKind::GaGs(s) => s.pre_comm(group, i_buf, cnt_in, i_type, i_table),
        }
    }

    fn exec_job(&mut self, job: Option<&mut dyn Job>) {
        match self {
            #[cfg(feature = "strategy-alltoall")]
            StrategyKind::AllToAll(s) => s.exec_job(job),
            #[cfg(feature = "strategy-pt2pt")]
            StrategyKind::Pt2Pt(s) => s.exec_job(job),
            #[cfg(feature = "strategy-rma")]
            StrategyKind::Rma(s) => s.exec_job(job),
            #[cfg(feature = "strategy-shmem")]
            StrategyKind::Shmem(s) => s.exec_job(job),
            #[cfg(feature = "strategy-ga")]
            StrategyKind::Ga(s) => s.exec_job(job),
            #[cfg(feature = "strategy-ga-gs")]
            StrategyKind::GaGs(s) => s.exec_job(job),
        }
    }

    fn post_comm(
        &mut self,
        group: &ProcessGroup,
        o_buf: &mut [u8],
        cnt_out: usize,
        o_type: ElementType,
        o_table: &RoutingTable,
    ) -> Result<(), RuntimeError> {
        match self {
            #[cfg(feature = "strategy-alltoall")]
            StrategyKind::AllToAll(s) => s.post_comm(group, o_buf, cnt_out, o_type, o_table),
            #[cfg(feature = "strategy-pt2pt")]
            StrategyKind::Pt2Pt(s) => s.post_comm(group, o_buf, cnt_out, o_type, o_table),
            #[cfg(feature = "strategy-rma")]
            StrategyKind::Rma(s) => s.post_comm(group, o_buf, cnt_out, o_type, o_table),
            #[cfg(feature = "strategy-shmem")]
            StrategyKind::Shmem(s) => s.post_comm(group, o_buf, cnt_out, o_type, o_table),
            #[cfg(feature = "strategy-ga")]
            StrategyKind::Ga(s) => s.post_comm(group, o_buf, cnt_out, o_type, o_table),
            #[cfg(feature = "strategy-ga-gs")]
            StrategyKind::GaGs(s) => s.post_comm(group, o_buf, cnt_out, o_type, o_table),
        }
    }
}

/// Per-worker shape agreed at construction time: every rank learns every
/// worker's `(i_n, o_n)` so addressing strategies (C11/C12) can build a
/// global address space without a worker needing to be present to answer.
pub struct WorkerShapes {
    pub i_n: Vec<usize>,
    pub o_n: Vec<usize>,
}

/// Dispatches `name` (the `runtime.implementation` configuration value) to
/// one of the six strategies, gated behind the matching Cargo feature,
/// mirroring the original's `MEXICO_HAVE_{GA,SHMEM,MPI}` preprocessor gates
/// (§7, §9).
#[allow(unused_variables)]
pub fn build(
    name: &str,
    hints: &str,
    group: &ProcessGroup,
    workers: &[usize],
    shapes: &WorkerShapes,
    i_type: ElementType,
    o_type: ElementType,
) -> Result<StrategyKind, RuntimeError> {
    match name {
        #[cfg(feature = "strategy-alltoall")]
        "MPI Alltoall" => Ok(StrategyKind::AllToAll(alltoall::AllToAll::new(
            group, workers, shapes, i_type, o_type, hints,
        ))),
        #[cfg(feature = "strategy-pt2pt")]
        "MPI Pt2Pt" => Ok(StrategyKind::Pt2Pt(pt2pt::PointToPoint::new(
            group, workers, shapes, i_type, o_type,
        ))),
        #[cfg(feature = "strategy-rma")]
        "MPI RMA" => Ok(StrategyKind::Rma(rma::Rma::new(
            group, workers, shapes, i_type, o_type, hints,
        ))),
        #[cfg(feature = "strategy-shmem")]
        "SHMEM" => Ok(StrategyKind::Shmem(shmem::Shmem::new(
            group, workers, shapes, i_type, o_type, hints,
        ))),
        #[cfg(feature = "strategy-ga")]
        "GA" => Ok(StrategyKind::Ga(ga::Ga::new(
            group, workers, shapes, i_type, o_type, hints,
        ))),
        #[cfg(feature = "strategy-ga-gs")]
        "GA gs" => Ok(StrategyKind::GaGs(ga_gs::GaGs::new(
            group, workers, shapes, i_type, o_type, hints,
        ))),
        other => Err(RuntimeError::Config(format!(
            "unknown or disabled runtime.implementation: {other:?}"
        ))),
    }
}

/// Substring hint matching, mirroring `MEXICO_READ_HINT` in
/// `runtime_impl.hpp`: a tuning flag is on iff its token appears anywhere in
/// the free-form `hints` string.
pub(crate) fn hint(hints: &str, token: &str) -> bool {
    hints.contains(token)
}
