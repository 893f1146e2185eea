//! Tagged point-to-point messaging: the non-blocking send / receive
//! primitives the point-to-point strategy (C8) and the all-to-all strategy's
//! `exch_with_pt2pt` substitution (C7) are built from.
//!
//! One mailbox per rank collects every message addressed to it, tagged the
//! way the original uses MPI tags (0/1/2 for different exchange phases).
//! `isend` is non-blocking in name only — delivery into the destination's
//! mailbox happens synchronously, since there is no network round-trip to
//! hide — but the returned handle preserves the "post now, wait later" shape
//! so strategy code reads the way the original's `Isend`/`Waitall` does.
//!
//! The original's probe-then-recv pair (`MPI_Probe` sizing a buffer before
//! `MPI_Recv` fills it) has no counterpart: `recv` already returns an owned,
//! self-sizing `Vec<u8>`, so there is nothing for a probe step to size in
//! advance.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

pub(crate) struct Message {
    pub(crate) src: usize,
    pub(crate) tag: u32,
    pub(crate) bytes: Vec<u8>,
}

pub(crate) struct Mailbox {
    queue: Mutex<VecDeque<Message>>,
    cv: Condvar,
}

impl Mailbox {
    pub(crate) fn new() -> Self {
        Mailbox {
            queue: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
        }
    }

    fn push(&self, message: Message) {
        let mut queue = self.queue.lock().unwrap();
        queue.push_back(message);
        self.cv.notify_all();
    }
}

/// A posted send; `wait` blocks until the message has landed (always
/// immediately true here, since `push` is synchronous), matching the shape
/// of `MPI_Wait`/`MPI_Waitall` in calling code.
pub struct SendHandle;

impl SendHandle {
    pub fn wait(self) {}
}

impl crate::group::ProcessGroup {
    /// Posts a message to `dst`'s mailbox, tagged `tag`. Never blocks.
    pub fn isend(&self, dst: usize, tag: u32, bytes: Vec<u8>) -> SendHandle {
        self.mailbox_of(dst).push(Message {
            src: self.rank(),
            tag,
            bytes,
        });
        SendHandle
    }

    /// Consumes the first queued message matching `tag`, blocking if none is
    /// yet available. Matches a specific source when `src` is `Some`.
    pub fn recv(&self, tag: u32, src: Option<usize>) -> (usize, Vec<u8>) {
        let mailbox = self.mailbox_of(self.rank());
        let mut queue = mailbox.queue.lock().unwrap();
        loop {
            if let Some(pos) = queue
                .iter()
                .position(|m| m.tag == tag && src.map_or(true, |s| s == m.src))
            {
                let m = queue.remove(pos).unwrap();
                return (m.src, m.bytes);
            }
            queue = mailbox.cv.wait(queue).unwrap();
        }
    }
}
