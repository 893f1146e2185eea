//! C8: point-to-point strategy, grounded in `runtime_impl_mpi_pt2pt.cpp`.
//!
//! Gather posts one non-blocking send per non-empty destination rank,
//! packing `{offset, payload}` into a single message; the worker drives a
//! probe-free receive loop (our `ProcessGroup::recv` blocks on the tag
//! directly, standing in for the original's probe-then-recv pair) until it
//! has accounted for exactly `i_N` scalar elements (not records — a send
//! carries `count` records of `cnt_in` elements each), matching §4.4's
//! termination condition. Scatter runs two tagged phases: offset requests,
//! then the matching payload reply, and terminates the same way on `o_N`
//! elements.

use std::collections::HashMap;

use shuffle_communication::ProcessGroup;

use crate::error::RuntimeError;
use crate::job::Job;
use crate::record::{ElementType, RoutingTable};
use crate::strategy::{invoke, Strategy, WorkerShapes};

const TAG_PRE: u32 = 40;
const TAG_POST_REQUEST: u32 = 41;
const TAG_POST_DATA: u32 = 42;

pub struct PointToPoint {
    is_worker: bool,
    i_n: usize,
    o_n: usize,
    inbuf: Vec<u8>,
    outbuf: Vec<u8>,
}

impl PointToPoint {
    pub fn new(
        group: &ProcessGroup,
        workers: &[usize],
        shapes: &WorkerShapes,
        i_type: ElementType,
        o_type: ElementType,
    ) -> Self {
        let is_worker = workers.contains(&group.rank());
        let (i_n, o_n) = match workers.iter().position(|&w| w == group.rank()) {
            Some(idx) => (shapes.i_n[idx], shapes.o_n[idx]),
            None => (0, 0),
        };
        PointToPoint {
            is_worker,
            i_n,
            o_n,
            inbuf: vec![0u8; i_n * i_type.extent()],
            outbuf: vec![0u8; o_n * o_type.extent()],
        }
    }
}

impl Strategy for PointToPoint {
    fn pre_comm(
        &mut self,
        group: &ProcessGroup,
        i_buf: &[u8],
        cnt_in: usize,
        i_type: ElementType,
        i_table: &RoutingTable,
    ) -> Result<(), RuntimeError> {
        let extent = i_type.extent();
        let rec_len = cnt_in * extent;
        let stride = 4 + rec_len;
        let nprocs = group.size();

        let mut send = vec![Vec::new(); nprocs];
        for (v, _k, w, s) in i_table.entries() {
            let buf = &mut send[w];
            buf.extend_from_slice(&(s as i32).to_le_bytes());
            buf.extend_from_slice(&i_buf[v * rec_len..(v + 1) * rec_len]);
        }

        let handles: Vec<_> = (0..nprocs)
            .filter(|&w| !send[w].is_empty())
            .map(|w| group.isend(w, TAG_PRE, std::mem::take(&mut send[w])))
            .collect();

        if self.is_worker {
            let mut received = 0usize;
            while received < self.i_n {
                let (_src, bytes) = group.recv(TAG_PRE, None);
                debug_assert_eq!(bytes.len() % stride, 0);
                for entry in bytes.chunks(stride) {
                    let off = i32::from_le_bytes(entry[..4].try_into().unwrap()) as usize;
                    debug_assert!((off + 1) * rec_len <= self.inbuf.len());
                    self.inbuf[off * rec_len..(off + 1) * rec_len].copy_from_slice(&entry[4..]);
                }
                received += (bytes.len() / stride) * cnt_in;
            }
        }

        for h in handles {
            h.wait();
        }
        Ok(())
    }

    fn exec_job(&mut self, job: Option<&mut dyn Job>) {
        invoke(job, &self.inbuf, &mut self.outbuf);
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
        let rec_len = cnt_out * extent;
        let nprocs = group.size();

        // Phase 1: request the offsets this rank wants pulled back, one
        // aggregated message per worker it has entries for.
        let mut request = vec![Vec::new(); nprocs];
        let mut requested_any = vec![false; nprocs];
        for (_v, _k, w, s) in o_table.entries() {
            request[w].extend_from_slice(&(s as i32).to_le_bytes());
            requested_any[w] = true;
        }
        let request_handles: Vec<_> = (0..nprocs)
            .filter(|&w| requested_any[w])
            .map(|w| group.isend(w, TAG_POST_REQUEST, std::mem::take(&mut request[w])))
            .collect();

        // Worker side: drain exactly o_N requested offsets (summed over all
        // requesters), then reply to each requester with its records in
        // the order the offsets arrived from it.
        if self.is_worker {
            let mut received = 0usize;
            let mut per_src: HashMap<usize, Vec<usize>> = HashMap::new();
            while received < self.o_n {
                let (src, bytes) = group.recv(TAG_POST_REQUEST, None);
                let n = bytes.len() / 4;
                let offs = per_src.entry(src).or_default();
                for i in 0..n {
                    offs.push(i32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap()) as usize);
                }
                received += n * cnt_out;
            }
            for (src, offs) in per_src {
                let mut payload = Vec::with_capacity(offs.len() * rec_len);
                for off in offs {
                    debug_assert!((off + 1) * rec_len <= self.outbuf.len());
                    payload.extend_from_slice(&self.outbuf[off * rec_len..(off + 1) * rec_len]);
                }
                group.isend(src, TAG_POST_DATA, payload).wait();
            }
        }
        for h in request_handles {
            h.wait();
        }

        // Phase 2: collect one reply per worker we requested from.
        let mut reply: HashMap<usize, Vec<u8>> = HashMap::new();
        for w in 0..nprocs {
            if requested_any[w] {
                let (_src, bytes) = group.recv(TAG_POST_DATA, Some(w));
                reply.insert(w, bytes);
            }
        }

        let mut cursor = vec![0usize; nprocs];
        for (v, k, w, _s) in o_table.entries() {
            let cur = cursor[w];
            let pos = v + k * o_table.num_vals;
            o_buf[pos * rec_len..(pos + 1) * rec_len]
                .copy_from_slice(&reply[&w][cur * rec_len..(cur + 1) * rec_len]);
            cursor[w] += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_rank_route() {
        shuffle_communication::initialize(shuffle_communication::Config::Processes(2), |group| {
            let shapes = WorkerShapes {
                i_n: vec![1, 1],
                o_n: vec![1, 1],
            };
            let mut strat = PointToPoint::new(&group, &[0, 1], &shapes, ElementType::Int32, ElementType::Int32);

            let value: i32 = if group.rank() == 0 { 42 } else { 99 };
            let i_buf = value.to_le_bytes().to_vec();
            let other = 1 - group.rank() as i32;
            let i_worker = [other];
            let i_offsets = [0i32];
            let i_table = RoutingTable {
                num_vals: 1,
                max_worker_per_val: 1,
                worker: &i_worker,
                offsets: &i_offsets,
            };
            strat.pre_comm(&group, &i_buf, 1, ElementType::Int32, &i_table).unwrap();
            strat.exec_job(None);
            strat.outbuf.copy_from_slice(&strat.inbuf);

            let mut o_buf = vec![0u8; 4];
            let o_table = RoutingTable {
                num_vals: 1,
                max_worker_per_val: 1,
                worker: &i_worker,
                offsets: &i_offsets,
            };
            strat
                .post_comm(&group, &mut o_buf, 1, ElementType::Int32, &o_table)
                .unwrap();

            i32::from_le_bytes(o_buf.try_into().unwrap())
        })
        .unwrap()
        .join()
        .into_iter()
        .map(|r| r.unwrap())
        .zip([42, 99])
        .for_each(|(got, want)| assert_eq!(got, want));
    }
}
