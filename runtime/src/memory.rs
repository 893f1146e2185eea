//! The memory component (C2): typed scratch-buffer growth.
//!
//! The original hand-rolls `alloc_*`/`realloc_*`/`free_*` per element type
//! (`memory.hpp`) because C has no generic growable container. Rust's `Vec`
//! already is that wrapper, so `ScratchBuffer` only adds the one thing the
//! original's realloc calls encode that `Vec::resize` doesn't by itself:
//! the "never shrink mid-life" growth policy (§9, "Scratch growth") that
//! every strategy's per-invocation scratch relies on to avoid reallocating
//! every call.
//!
//! The original's second allocator kind — memory backed by the messaging
//! layer, for MPI's pinned/registered send buffers — has no counterpart
//! here: the thread-based transport in `shuffle_communication` never needs
//! pinned memory, so that half of C2 is dropped (see DESIGN.md). The
//! symmetric-heap-backed allocator survives as
//! `shuffle_communication::symmetric::SymmetricHeap`, used directly by the
//! SHMEM strategy.

#[derive(Default)]
pub struct ScratchBuffer {
    buf: Vec<u8>,
}

impl ScratchBuffer {
    pub fn new() -> Self {
        ScratchBuffer { buf: Vec::new() }
    }

    /// Grows the buffer to at least `len` bytes, leaving existing content in
    /// place; never shrinks. Returns a mutable view of exactly `len` bytes.
    pub fn grow_to(&mut self, len: usize) -> &mut [u8] {
        if self.buf.len() < len {
            self.buf.resize(len, 0);
        }
        &mut self.buf[..len]
    }

    pub fn as_slice(&self, len: usize) -> &[u8] {
        &self.buf[..len]
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_monotonically() {
        let mut s = ScratchBuffer::new();
        s.grow_to(8);
        assert_eq!(s.capacity(), 8);
        s.grow_to(4);
        assert_eq!(s.capacity(), 8, "must never shrink");
        s.grow_to(16);
        assert_eq!(s.capacity(), 16);
    }
}
