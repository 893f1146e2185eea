//! Distributed arrays (C11/C12): one global 1-D address space, built by
//! concatenating every worker's local capacity in rank order. Addressing and
//! the irregular-distribution residency pinning match
//! `runtime_impl_ga_common.cpp`; the two access patterns (bulk put/get vs.
//! native scatter/gather) are layered on top of the same storage.
//!
//! `element_size` is the byte extent of one scalar element of the array's
//! declared type (the original's GA datatype, `MT_INT`/`MT_REAL`/...); bulk
//! `put`/`get` move whole records (`cnt` contiguous elements), while
//! `scatter`/`gather` address individual scalar elements, one index per
//! element, matching `NGA_Scatter`/`NGA_Gather`'s per-element index arrays.

use std::cell::UnsafeCell;

struct ArrayBuf(UnsafeCell<Vec<u8>>);
unsafe impl Sync for ArrayBuf {}

pub struct DistributedArray {
    buf: ArrayBuf,
    element_size: usize,
    /// Prefix-sum starting element index for each rank's segment.
    starts: Vec<usize>,
    /// Whether residency is pinned per-worker (irregular distribution): when
    /// true, `access` hands back a direct slice instead of requiring a copy.
    irregular: bool,
}

impl DistributedArray {
    /// `starts[r]` is the first global element index owned by rank `r`;
    /// `starts` must have one extra trailing entry equal to the total
    /// element count (so a segment's length is `starts[r+1] - starts[r]`).
    pub fn new(starts: Vec<usize>, element_size: usize, irregular: bool) -> Self {
        let total = *starts.last().expect("starts must be non-empty");
        DistributedArray {
            buf: ArrayBuf(UnsafeCell::new(vec![0u8; total * element_size])),
            element_size,
            starts,
            irregular,
        }
    }

    pub fn irregular(&self) -> bool {
        self.irregular
    }

    fn slice(&self) -> &mut [u8] {
        unsafe { &mut *self.buf.0.get() }
    }

    /// Bulk put of `count` contiguous elements starting at global index
    /// `start`.
    pub fn put(&self, start: usize, data: &[u8]) {
        let lo = start * self.element_size;
        self.slice()[lo..lo + data.len()].copy_from_slice(data);
    }

    /// Bulk get of `out.len() / element_size` contiguous elements starting
    /// at global index `start`.
    pub fn get(&self, start: usize, out: &mut [u8]) {
        let lo = start * self.element_size;
        out.copy_from_slice(&self.slice()[lo..lo + out.len()]);
    }

    /// Direct access to a rank's pinned segment, valid only when
    /// `irregular()` is true — the zero-copy path `use_irreg_distr` exists
    /// for.
    pub fn access(&self, start: usize, len_elems: usize) -> &mut [u8] {
        let lo = start * self.element_size;
        &mut self.slice()[lo..lo + len_elems * self.element_size]
    }

    /// Native scatter: `indices[i]` is the global element index that scalar
    /// element `i` of `values` should land at.
    pub fn scatter(&self, indices: &[usize], values: &[u8]) {
        debug_assert_eq!(values.len(), indices.len() * self.element_size);
        for (i, &idx) in indices.iter().enumerate() {
            let lo = idx * self.element_size;
            let v = &values[i * self.element_size..(i + 1) * self.element_size];
            self.slice()[lo..lo + self.element_size].copy_from_slice(v);
        }
    }

    /// Native gather: the inverse of `scatter`.
    pub fn gather(&self, indices: &[usize], out: &mut [u8]) {
        debug_assert_eq!(out.len(), indices.len() * self.element_size);
        for (i, &idx) in indices.iter().enumerate() {
            let lo = idx * self.element_size;
            out[i * self.element_size..(i + 1) * self.element_size]
                .copy_from_slice(&self.slice()[lo..lo + self.element_size]);
        }
    }

    pub fn start_of(&self, rank: usize) -> usize {
        self.starts[rank]
    }
}

/// Computes the exclusive prefix sum `starts[r] = sum(local[0..r])`, with a
/// trailing total, matching `excl_scan_in_place` in `utils.hpp`.
pub fn exclusive_scan(local: &[usize]) -> Vec<usize> {
    let mut starts = Vec::with_capacity(local.len() + 1);
    let mut acc = 0usize;
    for &v in local {
        starts.push(acc);
        acc += v;
    }
    starts.push(acc);
    starts
}
