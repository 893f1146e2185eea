//! C9: one-sided RMA strategy, grounded in `runtime_impl_mpi_rma.cpp`.
//!
//! Every rank exposes its worker input/output buffer as a window (§4.5);
//! `pre_comm` puts records into the target worker's input window between a
//! pair of fences, `post_comm` gets them back from the output window the
//! same way. The `coalesce` hint fuses consecutive routing entries that
//! target contiguous offsets from contiguous source positions into a
//! single bulk put/get, exactly as the original's bucket sweep.

use shuffle_communication::rma::Window;
use shuffle_communication::ProcessGroup;
use tracing::debug;

use crate::error::RuntimeError;
use crate::job::Job;
use crate::record::{ElementType, RoutingTable};
use crate::strategy::{hint, invoke, Strategy, WorkerShapes};

pub struct Rma {
    rank: usize,
    is_worker: bool,
    i_n: usize,
    o_n: usize,
    i_win: Window,
    o_win: Window,
    coalesce: bool,
}

impl Rma {
    pub fn new(
        group: &ProcessGroup,
        workers: &[usize],
        shapes: &WorkerShapes,
        i_type: ElementType,
        o_type: ElementType,
        hints: &str,
    ) -> Self {
        let nprocs = group.size();
        let mut i_sizes = vec![0usize; nprocs];
        let mut o_sizes = vec![0usize; nprocs];
        for (idx, &w) in workers.iter().enumerate() {
            i_sizes[w] = shapes.i_n[idx] * i_type.extent();
            o_sizes[w] = shapes.o_n[idx] * o_type.extent();
        }
        let is_worker = workers.contains(&group.rank());
        let (i_n, o_n) = match workers.iter().position(|&w| w == group.rank()) {
            Some(idx) => (shapes.i_n[idx], shapes.o_n[idx]),
            None => (0, 0),
        };
        Rma {
            rank: group.rank(),
            is_worker,
            i_n,
            o_n,
            i_win: Window::new(&i_sizes),
            o_win: Window::new(&o_sizes),
            coalesce: hint(hints, "coalesce"),
        }
    }
}

/// A maximal run of routing entries sharing a target rank, with
/// contiguous target offsets and contiguous source record positions —
/// §4.5's coalescing rule, shared by the put and get sweeps.
struct Bucket {
    w0: usize,
    lo0: usize,
    i0: usize,
    nv: usize,
}

impl Strategy for Rma {
    fn pre_comm(
        &mut self,
        group: &ProcessGroup,
        i_buf: &[u8],
        cnt_in: usize,
        i_type: ElementType,
        i_table: &RoutingTable,
    ) -> Result<(), RuntimeError> {
        let extent = i_type.extent();
        group.barrier();

        if !self.coalesce {
            for (v, _k, w, s) in i_table.entries() {
                let rec = &i_buf[v * cnt_in * extent..(v + 1) * cnt_in * extent];
                self.i_win.put(w, cnt_in * s * extent, rec);
            }
        } else {
            for k in 0..i_table.max_worker_per_val {
                let mut bucket: Option<Bucket> = None;
                for v in 0..i_table.num_vals {
                    let w = i_table.worker_at(v, k);
                    if w < 0 {
                        continue;
                    }
                    let w = w as usize;
                    let lo = cnt_in * i_table.offset_at(v, k) as usize;

                    bucket = match bucket {
                        Some(b) if b.w0 == w && lo == b.lo0 + cnt_in * b.nv && v == b.i0 + b.nv => {
                            Some(Bucket { nv: b.nv + 1, ..b })
                        }
                        Some(b) => {
                            flush_put(&self.i_win, i_buf, cnt_in, extent, &b);
                            Some(Bucket { w0: w, lo0: lo, i0: v, nv: 1 })
                        }
                        None => Some(Bucket { w0: w, lo0: lo, i0: v, nv: 1 }),
                    };
                }
                if let Some(b) = bucket {
                    flush_put(&self.i_win, i_buf, cnt_in, extent, &b);
                }
            }
        }

        group.barrier();
        Ok(())
    }

    fn exec_job(&mut self, job: Option<&mut dyn Job>) {
        let inbuf = self.i_win.local_mut(self.rank);
        let outbuf = self.o_win.local_mut(self.rank);
        invoke(job, inbuf, outbuf);
        debug!(rank = self.rank, i_n = self.i_n, o_n = self.o_n, "exec_job (rma)");
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
        group.barrier();

        if !self.coalesce {
            for (v, k, w, s) in o_table.entries() {
                let pos = v + k * o_table.num_vals;
                let rec_len = cnt_out * extent;
                self.o_win
                    .get(w, cnt_out * s * extent, &mut o_buf[pos * rec_len..(pos + 1) * rec_len]);
            }
        } else {
            for k in 0..o_table.max_worker_per_val {
                let mut bucket: Option<Bucket> = None;
                for v in 0..o_table.num_vals {
                    let w = o_table.worker_at(v, k);
                    if w < 0 {
                        continue;
                    }
                    let w = w as usize;
                    let lo = cnt_out * o_table.offset_at(v, k) as usize;

                    bucket = match bucket {
                        Some(b) if b.w0 == w && lo == b.lo0 + cnt_out * b.nv && v == b.i0 + b.nv => {
                            Some(Bucket { nv: b.nv + 1, ..b })
                        }
                        Some(b) => {
                            flush_get(&self.o_win, o_buf, cnt_out, extent, o_table.num_vals, k, &b);
                            Some(Bucket { w0: w, lo0: lo, i0: v, nv: 1 })
                        }
                        None => Some(Bucket { w0: w, lo0: lo, i0: v, nv: 1 }),
                    };
                }
                if let Some(b) = bucket {
                    flush_get(&self.o_win, o_buf, cnt_out, extent, o_table.num_vals, k, &b);
                }
            }
        }

        group.barrier();
        Ok(())
    }
}

fn flush_put(win: &Window, i_buf: &[u8], cnt_in: usize, extent: usize, b: &Bucket) {
    let lo = b.i0 * cnt_in * extent;
    let len = b.nv * cnt_in * extent;
    win.put(b.w0, b.lo0 * extent, &i_buf[lo..lo + len]);
}

fn flush_get(win: &Window, o_buf: &mut [u8], cnt_out: usize, extent: usize, num_vals: usize, k: usize, b: &Bucket) {
    let pos = b.i0 + k * num_vals;
    let len = b.nv * cnt_out * extent;
    win.get(b.w0, b.lo0 * extent, &mut o_buf[pos * cnt_out * extent..pos * cnt_out * extent + len]);
}
