//! C7: collective all-to-all strategy, grounded in
//! `runtime_impl_mpi_alltoall.cpp`.
//!
//! Counts are exchanged with a fixed all-to-all first; the payload exchange
//! itself goes through [`exchange`], which is either a variable all-to-all
//! (`ProcessGroup::alltoallv`) or, when the `exch_with_pt2pt` hint is set,
//! manually posted non-blocking sends matched by blocking receives — the
//! same substitution the original's `exchange()` helper makes, kept here as
//! a branch inside one function rather than a seventh strategy.

use shuffle_communication::ProcessGroup;

use crate::error::RuntimeError;
use crate::job::Job;
use crate::record::{ElementType, RoutingTable};
use crate::strategy::{hint, invoke, Strategy, WorkerShapes};

const TAG_PACK: u32 = 30;
const TAG_OFFSETS_PRE: u32 = 31;
const TAG_PAYLOAD_PRE: u32 = 32;
const TAG_OFFSETS_POST: u32 = 33;
const TAG_PAYLOAD_POST: u32 = 34;

pub struct AllToAll {
    is_worker: bool,
    i_n: usize,
    o_n: usize,
    inbuf: Vec<u8>,
    outbuf: Vec<u8>,
    pack: bool,
    exch_with_pt2pt: bool,
}

impl AllToAll {
    pub fn new(
        group: &ProcessGroup,
        workers: &[usize],
        shapes: &WorkerShapes,
        i_type: ElementType,
        o_type: ElementType,
        hints: &str,
    ) -> Self {
        let is_worker = workers.contains(&group.rank());
        let (i_n, o_n) = local_shape(group, workers, shapes);
        AllToAll {
            is_worker,
            i_n,
            o_n,
            inbuf: vec![0u8; i_n * i_type.extent()],
            outbuf: vec![0u8; o_n * o_type.extent()],
            pack: hint(hints, "pack"),
            exch_with_pt2pt: hint(hints, "exch_with_pt2pt"),
        }
    }

    /// The single payload exchange every phase routes through (§4.3): a
    /// variable all-to-all, or — with `exch_with_pt2pt` — one posted
    /// non-blocking send per destination matched by `nprocs` blocking
    /// receives tagged the same way.
    fn exchange(&self, group: &ProcessGroup, tag: u32, send: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
        if self.exch_with_pt2pt {
            let nprocs = group.size();
            let handles: Vec<_> = (0..nprocs)
                .map(|dst| group.isend(dst, tag, send[dst].clone()))
                .collect();
            let mut recv = vec![Vec::new(); nprocs];
            for _ in 0..nprocs {
                let (src, bytes) = group.recv(tag, None);
                recv[src] = bytes;
            }
            for h in handles {
                h.wait();
            }
            recv
        } else {
            group.alltoallv(send)
        }
    }
}

fn local_shape(group: &ProcessGroup, workers: &[usize], shapes: &WorkerShapes) -> (usize, usize) {
    match workers.iter().position(|&w| w == group.rank()) {
        Some(idx) => (shapes.i_n[idx], shapes.o_n[idx]),
        None => (0, 0),
    }
}

impl Strategy for AllToAll {
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
        let nprocs = group.size();

        if self.pack {
            let stride = 4 + rec_len;
            let mut send = vec![Vec::new(); nprocs];
            for (v, _k, w, s) in i_table.entries() {
                let send = &mut send[w];
                send.extend_from_slice(&(s as i32).to_le_bytes());
                send.extend_from_slice(&i_buf[v * rec_len..(v + 1) * rec_len]);
            }
            let recv = self.exchange(group, TAG_PACK, send);
            if self.is_worker {
                for bytes in recv {
                    debug_assert_eq!(bytes.len() % stride, 0);
                    for entry in bytes.chunks(stride) {
                        let off = i32::from_le_bytes(entry[..4].try_into().unwrap()) as usize;
                        debug_assert!((off + 1) * rec_len <= self.inbuf.len());
                        self.inbuf[off * rec_len..(off + 1) * rec_len].copy_from_slice(&entry[4..]);
                    }
                }
            }
        } else {
            let mut send_offsets = vec![Vec::new(); nprocs];
            let mut send_payload = vec![Vec::new(); nprocs];
            for (v, _k, w, s) in i_table.entries() {
                send_offsets[w].extend_from_slice(&(s as i32).to_le_bytes());
                send_payload[w].extend_from_slice(&i_buf[v * rec_len..(v + 1) * rec_len]);
            }
            let recv_offsets = self.exchange(group, TAG_OFFSETS_PRE, send_offsets);
            let recv_payload = self.exchange(group, TAG_PAYLOAD_PRE, send_payload);
            if self.is_worker {
                for (offs, payload) in recv_offsets.iter().zip(recv_payload.iter()) {
                    let n = offs.len() / 4;
                    for i in 0..n {
                        let off = i32::from_le_bytes(offs[i * 4..i * 4 + 4].try_into().unwrap()) as usize;
                        debug_assert!((off + 1) * rec_len <= self.inbuf.len());
                        self.inbuf[off * rec_len..(off + 1) * rec_len]
                            .copy_from_slice(&payload[i * rec_len..(i + 1) * rec_len]);
                    }
                }
            }
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

        let mut send_offsets = vec![Vec::new(); nprocs];
        for (_v, _k, w, s) in o_table.entries() {
            send_offsets[w].extend_from_slice(&(s as i32).to_le_bytes());
        }
        let recv_offsets = self.exchange(group, TAG_OFFSETS_POST, send_offsets);

        let mut send_payload = vec![Vec::new(); nprocs];
        if self.is_worker {
            for (w, offs) in recv_offsets.iter().enumerate() {
                let n = offs.len() / 4;
                let buf = &mut send_payload[w];
                buf.reserve(n * rec_len);
                for i in 0..n {
                    let off = i32::from_le_bytes(offs[i * 4..i * 4 + 4].try_into().unwrap()) as usize;
                    debug_assert!((off + 1) * rec_len <= self.outbuf.len());
                    buf.extend_from_slice(&self.outbuf[off * rec_len..(off + 1) * rec_len]);
                }
            }
        }
        let recv_payload = self.exchange(group, TAG_PAYLOAD_POST, send_payload);

        // Reorder: the reply for rank w arrives in the same order this
        // rank's o_table sweep produced requests to w.
        let mut cursor = vec![0usize; nprocs];
        for (v, k, w, _s) in o_table.entries() {
            let cur = cursor[w];
            let pos = v + k * o_table.num_vals;
            o_buf[pos * rec_len..(pos + 1) * rec_len]
                .copy_from_slice(&recv_payload[w][cur * rec_len..(cur + 1) * rec_len]);
            cursor[w] += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_rank_echo_through_pack() {
        shuffle_communication::initialize(shuffle_communication::Config::Single, |group| {
            let shapes = WorkerShapes {
                i_n: vec![2],
                o_n: vec![2],
            };
            let mut strat = AllToAll::new(&group, &[0], &shapes, ElementType::Int32, ElementType::Int32, "pack");

            let i_buf: Vec<u8> = [7i32, 9i32].iter().flat_map(|v| v.to_le_bytes()).collect();
            let i_worker = [0i32, 0i32];
            let i_offsets = [0i32, 1i32];
            let i_table = RoutingTable {
                num_vals: 2,
                max_worker_per_val: 1,
                worker: &i_worker,
                offsets: &i_offsets,
            };
            strat.pre_comm(&group, &i_buf, 1, ElementType::Int32, &i_table).unwrap();

            strat.exec_job(None);
            strat.outbuf.copy_from_slice(&strat.inbuf);

            let mut o_buf = vec![0u8; 8];
            let o_table = RoutingTable {
                num_vals: 2,
                max_worker_per_val: 1,
                worker: &i_worker,
                offsets: &i_offsets,
            };
            strat
                .post_comm(&group, &mut o_buf, 1, ElementType::Int32, &o_table)
                .unwrap();

            let got: Vec<i32> = o_buf
                .chunks(4)
                .map(|c| i32::from_le_bytes(c.try_into().unwrap()))
                .collect();
            assert_eq!(got, vec![7, 9]);
        })
        .unwrap()
        .join()
        .into_iter()
        .for_each(|r| r.unwrap());
    }
}
