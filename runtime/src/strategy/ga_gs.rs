//! C12: distributed-array scatter/gather strategy, grounded in
//! `runtime_impl_ga_gs.cpp`.
//!
//! Same global address space as C11 (concatenated per-worker segments), but
//! addressed through `NGA_Scatter`/`NGA_Gather`'s native per-element index
//! arrays instead of bulk put/get. The original stages three parallel
//! scratch arrays before each call — `vals` (the payload), `subsarray` (one
//! `int[1]` per element, each just wrapping the flat index), and the flat
//! index array itself — because the GA C binding takes an array of
//! subscript-arrays rather than flat indices. `DistributedArray::scatter`/
//! `gather` take the flat index directly, so `subsarray` has no counterpart
//! here; recorded in DESIGN.md as a grounded simplification, not a dropped
//! feature (the two encode the same index, one wrapped for the C API, one
//! not).
//!
//! Recognizes the `use_irreg_distr` hint the same way C11 does: when set,
//! both arrays pin each worker's segment for direct `access`, exercised
//! before the unconditional refresh into `inbuf` (`runtime_impl_ga_gs.cpp`
//! switches to `access`/`release` on this hint too).

use shuffle_communication::distributed_array::{exclusive_scan, DistributedArray};
use shuffle_communication::ProcessGroup;
use tracing::debug;

use crate::error::RuntimeError;
use crate::job::Job;
use crate::record::{ElementType, RoutingTable};
use crate::strategy::{hint, invoke, Strategy, WorkerShapes};

pub struct GaGs {
    rank: usize,
    is_worker: bool,
    i_n: usize,
    o_n: usize,
    i_array: DistributedArray,
    o_array: DistributedArray,
    rank_to_widx: Vec<Option<usize>>,
    i_start: Vec<usize>,
    o_start: Vec<usize>,
    inbuf: Vec<u8>,
    outbuf: Vec<u8>,
    use_irreg_distr: bool,
}

impl GaGs {
    pub fn new(
        group: &ProcessGroup,
        workers: &[usize],
        shapes: &WorkerShapes,
        i_type: ElementType,
        o_type: ElementType,
        hints: &str,
    ) -> Self {
        let use_irreg_distr = hint(hints, "use_irreg_distr");
        let i_start = exclusive_scan(&shapes.i_n);
        let o_start = exclusive_scan(&shapes.o_n);

        let mut rank_to_widx = vec![None; group.size()];
        for (idx, &w) in workers.iter().enumerate() {
            rank_to_widx[w] = Some(idx);
        }

        let is_worker = rank_to_widx[group.rank()].is_some();
        let (i_n, o_n) = match rank_to_widx[group.rank()] {
            Some(idx) => (shapes.i_n[idx], shapes.o_n[idx]),
            None => (0, 0),
        };

        GaGs {
            rank: group.rank(),
            is_worker,
            i_n,
            o_n,
            i_array: DistributedArray::new(i_start.clone(), i_type.extent(), use_irreg_distr),
            o_array: DistributedArray::new(o_start.clone(), o_type.extent(), use_irreg_distr),
            rank_to_widx,
            i_start,
            o_start,
            inbuf: vec![0u8; i_n * i_type.extent()],
            outbuf: vec![0u8; o_n * o_type.extent()],
            use_irreg_distr,
        }
    }

    fn global_i_start(&self, rank: usize) -> usize {
        self.i_start[self.rank_to_widx[rank].expect("routing targets a worker")]
    }

    fn global_o_start(&self, rank: usize) -> usize {
        self.o_start[self.rank_to_widx[rank].expect("routing targets a worker")]
    }
}

impl Strategy for GaGs {
    fn pre_comm(
        &mut self,
        group: &ProcessGroup,
        i_buf: &[u8],
        cnt_in: usize,
        i_type: ElementType,
        i_table: &RoutingTable,
    ) -> Result<(), RuntimeError> {
        let extent = i_type.extent();

        // Expand each (record, cnt) routing entry into cnt per-element
        // global indices and the matching scalar values, since the native
        // scatter addresses one array element at a time.
        let mut indices = Vec::new();
        let mut values = Vec::new();
        for (v, _k, w, s) in i_table.entries() {
            let base = self.global_i_start(w) + s * cnt_in;
            for e in 0..cnt_in {
                indices.push(base + e);
            }
            let rec = &i_buf[v * cnt_in * extent..(v + 1) * cnt_in * extent];
            values.extend_from_slice(rec);
        }
        self.i_array.scatter(&indices, &values);

        group.barrier();
        if self.use_irreg_distr && self.is_worker {
            let widx = self.rank_to_widx[self.rank].unwrap();
            let _ = self.i_array.access(self.i_start[widx], self.i_n);
        }
        if self.is_worker {
            let widx = self.rank_to_widx[self.rank].unwrap();
            self.i_array.get(self.i_start[widx], &mut self.inbuf);
        }
        group.barrier();
        Ok(())
    }

    fn exec_job(&mut self, job: Option<&mut dyn Job>) {
        invoke(job, &self.inbuf, &mut self.outbuf);
        debug!(rank = self.rank, i_n = self.i_n, o_n = self.o_n, "exec_job (ga_gs)");
    }

    fn post_comm(
        &mut self,
        group: &ProcessGroup,
        o_buf: &mut [u8],
        cnt_out: usize,
        o_type: ElementType,
        o_table: &RoutingTable,
    ) -> Result<(), RuntimeError> {
        let extent = o_type.extent();

        if self.is_worker {
            let widx = self.rank_to_widx[self.rank].unwrap();
            self.o_array.put(self.o_start[widx], &self.outbuf);
        }
        group.barrier();

        let mut indices = Vec::new();
        for (_v, _k, w, s) in o_table.entries() {
            let base = self.global_o_start(w) + s * cnt_out;
            for e in 0..cnt_out {
                indices.push(base + e);
            }
        }
        let mut values = vec![0u8; indices.len() * extent];
        self.o_array.gather(&indices, &mut values);

        let rec_len = cnt_out * extent;
        for (pos, (v, k, _w, _s)) in o_table.entries().enumerate() {
            let dst = v + k * o_table.num_vals;
            o_buf[dst * rec_len..(dst + 1) * rec_len]
                .copy_from_slice(&values[pos * rec_len..(pos + 1) * rec_len]);
        }

        group.barrier();
        Ok(())
    }
}
