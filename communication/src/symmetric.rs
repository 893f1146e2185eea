//! Symmetric shared memory (C10): a heap allocation with an identical size
//! on every rank, as SHMEM's `shmalloc` requires, plus barrier-framed
//! remote put/get.
//!
//! Allocation is collective: callers reconcile their requested size via
//! `ProcessGroup::allreduce_i64(.., ReduceOp::Max)` *before* constructing a
//! `SymmetricHeap`, exactly as `runtime_impl_shmem.cpp`'s constructor does
//! (`comm->allreduce(MPI_IN_PLACE, &i_size, 1, MPI_LONG, MPI_MAX)`), so the
//! size passed here is already the agreed maximum.

use std::cell::UnsafeCell;

struct HeapBuf(UnsafeCell<Vec<u8>>);
unsafe impl Sync for HeapBuf {}

pub struct SymmetricHeap {
    bufs: Vec<HeapBuf>,
}

impl SymmetricHeap {
    /// Allocates `size` bytes on every one of `nprocs` ranks. `size` must
    /// already be the cross-rank maximum.
    pub fn new(nprocs: usize, size: usize) -> Self {
        SymmetricHeap {
            bufs: (0..nprocs).map(|_| HeapBuf(UnsafeCell::new(vec![0u8; size]))).collect(),
        }
    }

    pub fn putmem(&self, target: usize, byte_offset: usize, data: &[u8]) {
        let buf = unsafe { &mut *self.bufs[target].0.get() };
        buf[byte_offset..byte_offset + data.len()].copy_from_slice(data);
    }

    pub fn getmem(&self, source: usize, byte_offset: usize, out: &mut [u8]) {
        let buf = unsafe { &*self.bufs[source].0.get() };
        out.copy_from_slice(&buf[byte_offset..byte_offset + out.len()]);
    }

    pub fn local_mut(&self, rank: usize) -> &mut [u8] {
        unsafe { &mut *self.bufs[rank].0.get() }
    }
}
