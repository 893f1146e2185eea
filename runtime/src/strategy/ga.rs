//! C11: distributed-array put/get strategy, grounded in
//! `runtime_impl_ga.cpp` and `runtime_impl_ga_common.cpp`.
//!
//! Workers' local capacities are concatenated in rank order into one global
//! address space per side (`i_start`/`o_start`, an exclusive prefix sum);
//! `pre_comm`/`post_comm` put/get records (optionally coalesced, identical
//! bucketing rule to C9) addressed by `i_start[w] + cnt*offset`.
//!
//! §9's open question — whether the "copy to local buffer" step after the
//! put epoch runs unconditionally or only when not using the irregular
//! distribution — is resolved by reading `runtime_impl_ga.cpp::pre_comm`
//! directly: the `access()` block (used only when `use_irreg_distr`) is
//! followed by an *unconditional* block, with no `else`, that always
//! refreshes `inbuf` from the global array. This port reproduces that
//! behavior exactly: `access` is still called under `use_irreg_distr` (so
//! the zero-copy pointer path is exercised), but the get into the local
//! `inbuf` scratch always runs afterward regardless. The extra copy is
//! redundant when irregular, not incorrect — it doesn't change the result,
//! only the cost, which is this document's resolution rather than a guess.

use shuffle_communication::distributed_array::{exclusive_scan, DistributedArray};
use shuffle_communication::ProcessGroup;
use tracing::debug;

use crate::error::RuntimeError;
use crate::job::Job;
use crate::record::{ElementType, RoutingTable};
use crate::strategy::{hint, invoke, Strategy, WorkerShapes};

pub struct Ga {
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
    coalesce: bool,
    use_irreg_distr: bool,
}

impl Ga {
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

        Ga {
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
            coalesce: hint(hints, "coalesce"),
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

struct Bucket {
    lo0: usize,
    i0: usize,
    nv: usize,
}

impl Strategy for Ga {
    fn pre_comm(
        &mut self,
        group: &ProcessGroup,
        i_buf: &[u8],
        cnt_in: usize,
        i_type: ElementType,
        i_table: &RoutingTable,
    ) -> Result<(), RuntimeError> {
        let extent = i_type.extent();

        if !self.coalesce {
            for (v, _k, w, s) in i_table.entries() {
                let lo = self.global_i_start(w) + cnt_in * s;
                let rec = &i_buf[v * cnt_in * extent..(v + 1) * cnt_in * extent];
                self.i_array.put(lo, rec);
            }
        } else {
            for k in 0..i_table.max_worker_per_val {
                let mut bucket: Option<Bucket> = None;
                for v in 0..i_table.num_vals {
                    let w = i_table.worker_at(v, k);
                    if w < 0 {
                        continue;
                    }
                    let lo = self.global_i_start(w as usize) + cnt_in * i_table.offset_at(v, k) as usize;

                    bucket = match bucket {
                        Some(b) if lo == b.lo0 + cnt_in * b.nv && v == b.i0 + b.nv => Some(Bucket { nv: b.nv + 1, ..b }),
                        Some(b) => {
                            flush_put(&self.i_array, i_buf, cnt_in, extent, &b);
                            Some(Bucket { lo0: lo, i0: v, nv: 1 })
                        }
                        None => Some(Bucket { lo0: lo, i0: v, nv: 1 }),
                    };
                }
                if let Some(b) = bucket {
                    flush_put(&self.i_array, i_buf, cnt_in, extent, &b);
                }
            }
        }

        group.barrier();

        if self.use_irreg_distr && self.is_worker {
            let _ = self.i_array.access(self.i_start[self.rank_to_widx[self.rank].unwrap()], self.i_n);
        }
        // Unconditional per the resolved open question above: inbuf is
        // always refreshed from the global array.
        if self.is_worker {
            self.i_array
                .get(self.i_start[self.rank_to_widx[self.rank].unwrap()], &mut self.inbuf);
        }
        group.barrier();
        Ok(())
    }

    fn exec_job(&mut self, job: Option<&mut dyn Job>) {
        invoke(job, &self.inbuf, &mut self.outbuf);
        debug!(rank = self.rank, i_n = self.i_n, o_n = self.o_n, "exec_job (ga)");
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

        // Mirrors the unconditional refresh resolved for pre_comm above:
        // `exec_job` always computes into the local `outbuf` scratch (no
        // strategy here lets the job write straight into the pinned
        // segment), so `post_comm` must always publish it back into the
        // global array before any rank gets from it, `use_irreg_distr` or
        // not. Skipping this under `use_irreg_distr` would leave the array
        // holding stale data and break strategy equivalence.
        if self.is_worker {
            self.o_array
                .put(self.o_start[self.rank_to_widx[self.rank].unwrap()], &self.outbuf);
        }
        group.barrier();

        if !self.coalesce {
            for (v, k, w, s) in o_table.entries() {
                let lo = self.global_o_start(w) + cnt_out * s;
                let pos = v + k * o_table.num_vals;
                let rec_len = cnt_out * extent;
                self.o_array.get(lo, &mut o_buf[pos * rec_len..(pos + 1) * rec_len]);
            }
        } else {
            for k in 0..o_table.max_worker_per_val {
                let mut bucket: Option<Bucket> = None;
                for v in 0..o_table.num_vals {
                    let w = o_table.worker_at(v, k);
                    if w < 0 {
                        continue;
                    }
                    let lo = self.global_o_start(w as usize) + cnt_out * o_table.offset_at(v, k) as usize;

                    bucket = match bucket {
                        Some(b) if lo == b.lo0 + cnt_out * b.nv && v == b.i0 + b.nv => Some(Bucket { nv: b.nv + 1, ..b }),
                        Some(b) => {
                            flush_get(&self.o_array, o_buf, cnt_out, extent, o_table.num_vals, k, &b);
                            Some(Bucket { lo0: lo, i0: v, nv: 1 })
                        }
                        None => Some(Bucket { lo0: lo, i0: v, nv: 1 }),
                    };
                }
                if let Some(b) = bucket {
                    flush_get(&self.o_array, o_buf, cnt_out, extent, o_table.num_vals, k, &b);
                }
            }
        }
        group.barrier();
        Ok(())
    }
}

fn flush_put(array: &DistributedArray, i_buf: &[u8], cnt_in: usize, extent: usize, b: &Bucket) {
    let lo = b.i0 * cnt_in * extent;
    let len = b.nv * cnt_in * extent;
    array.put(b.lo0, &i_buf[lo..lo + len]);
}

fn flush_get(array: &DistributedArray, o_buf: &mut [u8], cnt_out: usize, extent: usize, num_vals: usize, k: usize, b: &Bucket) {
    let pos = b.i0 + k * num_vals;
    let len = b.nv * cnt_out * extent;
    array.get(b.lo0, &mut o_buf[pos * cnt_out * extent..pos * cnt_out * extent + len]);
}
