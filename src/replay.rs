//! Bounded ring of recently transmitted frames, held so the session layer can
//! retransmit an unacknowledged tail verbatim after a reconnect.

use std::collections::VecDeque;

/// Maximum number of frames retained by the cache.
pub const MAX_FRAMES: usize = 100;

/// A bounded ring of the most recently sent frames.
#[derive(Debug, Default)]
pub struct ReplayCache {
    frames: VecDeque<Vec<u8>>,
    total_len: u64,
}

impl ReplayCache {
    pub fn new() -> Self {
        ReplayCache {
            frames: VecDeque::new(),
            total_len: 0,
        }
    }

    /// Record a transmitted frame, evicting the oldest if the ring is full.
    pub fn insert(&mut self, bytes: &[u8]) {
        self.total_len += bytes.len() as u64;
        self.frames.push_back(bytes.to_vec());
        if self.frames.len() > MAX_FRAMES {
            if let Some(evicted) = self.frames.pop_front() {
                self.total_len -= evicted.len() as u64;
            }
        }
    }

    /// Total bytes currently cached across all retained frames.
    pub fn cached_len(&self) -> u64 {
        self.total_len
    }

    /// Return the exact trailing `n` bytes of the retained frames, in
    /// transmission order, or `None` if fewer than `n` bytes are retained.
    pub fn get(&self, n: u64) -> Option<Vec<u8>> {
        if n > self.total_len {
            return None;
        }
        if n == 0 {
            return Some(Vec::new());
        }

        let mut remaining = n;
        let mut chunks: Vec<&[u8]> = Vec::new();

        for frame in self.frames.iter().rev() {
            if remaining == 0 {
                break;
            }
            let flen = frame.len() as u64;
            if flen >= remaining {
                let start = (flen - remaining) as usize;
                chunks.push(&frame[start..]);
                remaining = 0;
            } else {
                chunks.push(&frame[..]);
                remaining -= flen;
            }
        }

        let mut out = Vec::with_capacity(n as usize);
        for chunk in chunks.into_iter().rev() {
            out.extend_from_slice(chunk);
        }
        Some(out)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
