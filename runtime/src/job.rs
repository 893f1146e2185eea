//! The job contract (C4): the four immutable descriptors and the
//! user-supplied compute callback invoked on worker ranks (§3 "Job
//! descriptor", §4.1).

use crate::record::ElementType;

/// A user-supplied per-worker compute step, mirroring `mexico::Job` in the
/// original (`job.hpp`): a declared input/output shape plus an `exec`
/// callback over the worker's local buffers.
///
/// `i_n`/`o_n`/`i_type`/`o_type` are fixed for the life of the `Instance`
/// that owns this job; they may differ across worker ranks (an irregular
/// partition), but must stay constant call-to-call on a given rank.
pub trait Job: Send {
    /// Local input buffer capacity, in scalar `i_type` elements — not
    /// records. A routing offset `s` addresses record `s`, `cnt_in`
    /// elements wide, so valid offsets satisfy `(s + 1) * cnt_in <= i_n()`
    /// (the original's `examples/binning.cpp` sets `i_N = 3*num_particles`
    /// for 3-float records, never `num_particles`).
    fn i_n(&self) -> usize;
    /// Element type of the input buffer's records.
    fn i_type(&self) -> ElementType;
    /// Local output buffer capacity, in scalar `o_type` elements; see
    /// `i_n`.
    fn o_n(&self) -> usize;
    /// Element type of the output buffer's records.
    fn o_type(&self) -> ElementType;

    /// Declared-but-inert per §9's open question: no strategy in the
    /// original sources consults `no_comm`, so no strategy here does
    /// either. Kept on the trait only so a caller can express the hint
    /// without the trait needing to change if a consumer is ever added.
    fn no_comm(&self) -> bool {
        false
    }

    /// Whether `no_comm` may be overridden by configuration. The original
    /// defaults this to true (`job.hpp`: "Allow overwriting the no_comm
    /// hint ... The default is: yes").
    fn no_comm_overwriteable(&self) -> bool {
        true
    }

    /// Runs the compute step over this worker's input and output buffers.
    /// `inbuf` holds exactly `i_n() * extent(i_type())` bytes; `outbuf` is
    /// exactly `o_n() * extent(o_type())` bytes and must be fully written
    /// (or left as the caller wants it observed, if genuinely untouched
    /// positions are intended) by the time this returns.
    fn exec(&mut self, inbuf: &[u8], outbuf: &mut [u8]);
}
