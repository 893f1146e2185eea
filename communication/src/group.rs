//! The process group: a duplicated "communicator" shared by every rank in an
//! instance, and the collective primitives the strategies are built from.
//!
//! There is no real MPI/GA/SHMEM runtime to link against here, so ranks are
//! simulated the same way `timely_communication`'s `Process` allocator
//! simulates workers: one OS thread per rank, sharing a single address space,
//! synchronized with barriers instead of network round-trips. Every
//! "remote" operation below is therefore safe cross-thread data movement
//! rather than RPC, but the observable collective semantics (every rank
//! calls in the same order, with matching call-invariant arguments) match
//! the bulk-synchronous model the rest of the crate assumes.

use std::sync::{Arc, Barrier, Mutex};

use crate::pt2pt::Mailbox;

/// Reduction operator for `allreduce`.
#[derive(Clone, Copy, Debug)]
pub enum ReduceOp {
    Sum,
    Max,
}

/// Shared state for one instance's process group. Constructed once, then
/// wrapped in an `Arc` and handed to every rank thread.
pub(crate) struct World {
    pub(crate) nprocs: usize,
    barrier: Barrier,
    /// Staging area for the current in-flight all-to-all style exchange:
    /// slot `r` holds what rank `r` is contributing, one sub-message per
    /// destination rank. Protected by the two-barrier rendezvous in
    /// `all_to_all`, never touched outside of it.
    stage: Mutex<Vec<Option<Vec<Vec<u8>>>>>,
    mailboxes: Vec<Arc<Mailbox>>,
}

impl World {
    pub(crate) fn new(nprocs: usize) -> Self {
        World {
            nprocs,
            barrier: Barrier::new(nprocs),
            stage: Mutex::new((0..nprocs).map(|_| None).collect()),
            mailboxes: (0..nprocs).map(|_| Arc::new(Mailbox::new())).collect(),
        }
    }
}

/// A rank's handle onto the duplicated process group (C1).
#[derive(Clone)]
pub struct ProcessGroup {
    world: Arc<World>,
    rank: usize,
}

impl ProcessGroup {
    pub(crate) fn new(world: Arc<World>, rank: usize) -> Self {
        ProcessGroup { world, rank }
    }

    pub(crate) fn new_world(nprocs: usize) -> Arc<World> {
        Arc::new(World::new(nprocs))
    }

    /// This rank's number, `0..size()`.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks in the group.
    pub fn size(&self) -> usize {
        self.world.nprocs
    }

    pub(crate) fn mailbox_of(&self, rank: usize) -> Arc<Mailbox> {
        self.world.mailboxes[rank].clone()
    }

    /// Translation to a canonical world rank. Under the thread-per-rank
    /// model there is only ever one group, so this is the identity; the
    /// method exists because C11/C12 call it unconditionally (mirroring
    /// `translate_to_MPI_COMM_WORLD` in the original, used when creating a
    /// restricted process group for the distributed arrays).
    pub fn translate_to_world(&self, rank: usize) -> usize {
        rank
    }

    /// Collective barrier.
    pub fn barrier(&self) {
        self.world.barrier.wait();
    }

    /// The fundamental collective primitive everything else is built from:
    /// every rank contributes one byte-vector per destination rank, and
    /// receives back what every other rank sent *to it*.
    ///
    /// `send[d]` is the payload this rank is sending to rank `d`.
    /// The result `recv[s]` is the payload rank `s` sent to this rank.
    pub fn all_to_all(&self, send: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
        debug_assert_eq!(send.len(), self.world.nprocs);
        {
            let mut stage = self.world.stage.lock().unwrap();
            stage[self.rank] = Some(send);
        }
        self.world.barrier.wait();
        let recv: Vec<Vec<u8>> = {
            let stage = self.world.stage.lock().unwrap();
            (0..self.world.nprocs)
                .map(|src| stage[src].as_ref().unwrap()[self.rank].clone())
                .collect()
        };
        self.world.barrier.wait();
        if self.rank == 0 {
            // Only one rank needs to clear the slots back out; the second
            // barrier above guarantees every rank has already read them.
            let mut stage = self.world.stage.lock().unwrap();
            for slot in stage.iter_mut() {
                *slot = None;
            }
        }
        self.world.barrier.wait();
        recv
    }

    /// Every rank contributes the same value to every destination; returns,
    /// for each rank, the value it contributed.
    pub fn allgather(&self, value: Vec<u8>) -> Vec<Vec<u8>> {
        let send = (0..self.world.nprocs).map(|_| value.clone()).collect();
        self.all_to_all(send)
    }

    /// Fixed-size all-to-all: `send` has one `elem_len`-byte chunk per rank.
    pub fn alltoall_fixed(&self, send: &[u8], elem_len: usize) -> Vec<u8> {
        let chunks = send
            .chunks(elem_len)
            .map(|c| c.to_vec())
            .collect::<Vec<_>>();
        let recv = self.all_to_all(chunks);
        let mut out = Vec::with_capacity(recv.len() * elem_len);
        for chunk in recv {
            out.extend_from_slice(&chunk);
        }
        out
    }

    /// Variable all-to-all: caller supplies, per destination rank, an
    /// arbitrary byte slice; returns one received byte vector per source.
    pub fn alltoallv(&self, send_per_rank: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
        self.all_to_all(send_per_rank)
    }

    /// All-reduce over a single `i64` (counts, sizes, debug levels).
    pub fn allreduce_i64(&self, value: i64, op: ReduceOp) -> i64 {
        let gathered = self.allgather(value.to_le_bytes().to_vec());
        gathered
            .into_iter()
            .map(|bytes| i64::from_le_bytes(bytes.try_into().unwrap()))
            .fold(None, |acc: Option<i64>, v| {
                Some(match (acc, op) {
                    (None, _) => v,
                    (Some(a), ReduceOp::Sum) => a + v,
                    (Some(a), ReduceOp::Max) => a.max(v),
                })
            })
            .unwrap_or(0)
    }
}
