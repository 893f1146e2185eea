//! One-sided remote-memory-access windows (C9).
//!
//! Each rank exposes a byte buffer as a window; other ranks `put`/`get`
//! directly into/out of it without the owning rank's participation, framed
//! by fence epochs. Non-worker ranks expose a zero-sized window, matching
//! §4.5.
//!
//! Safety: a window's per-rank buffer is shared across threads without a
//! lock. This is sound only because the gather/scatter invariants (§5)
//! guarantee concurrent writers target disjoint offsets within one epoch,
//! and fences (`ProcessGroup::barrier`) ensure no reader observes a window
//! before every writer's epoch-closing fence has been reached. This mirrors
//! the original's unsynchronized `MPI_Put`/`MPI_Get` between
//! `MPI_Win_fence` calls exactly; Rust just requires the sharing to be
//! spelled out explicitly instead of left to the network layer.
use std::cell::UnsafeCell;

struct WindowBuf(UnsafeCell<Vec<u8>>);
unsafe impl Sync for WindowBuf {}

pub struct Window {
    bufs: Vec<WindowBuf>,
}

impl Window {
    /// `sizes[r]` is the byte length of rank `r`'s exposed window.
    pub fn new(sizes: &[usize]) -> Self {
        Window {
            bufs: sizes
                .iter()
                .map(|&n| WindowBuf(UnsafeCell::new(vec![0u8; n])))
                .collect(),
        }
    }

    /// Writes `data` into rank `target`'s window at `byte_offset`. Must only
    /// be called between the epoch-opening and epoch-closing fence.
    pub fn put(&self, target: usize, byte_offset: usize, data: &[u8]) {
        let buf = unsafe { &mut *self.bufs[target].0.get() };
        buf[byte_offset..byte_offset + data.len()].copy_from_slice(data);
    }

    /// Reads `out.len()` bytes from rank `source`'s window at `byte_offset`.
    pub fn get(&self, source: usize, byte_offset: usize, out: &mut [u8]) {
        let buf = unsafe { &*self.bufs[source].0.get() };
        out.copy_from_slice(&buf[byte_offset..byte_offset + out.len()]);
    }

    /// Direct access to this rank's own exposed window, e.g. for the
    /// compute callback to read/write `inbuf`/`outbuf` without a copy.
    pub fn local_mut(&self, rank: usize) -> &mut [u8] {
        unsafe { &mut *self.bufs[rank].0.get() }
    }
}
