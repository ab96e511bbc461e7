// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Heap-buffer capture backend for tests and synthetic replay.
//!
//! Pre-allocates N frame slots managed via a lock-free freelist. Frames are
//! injected by the test (or a replay source), queued in arrival order, and
//! handed out through the same burst interface the AF_PACKET ring uses. The
//! per-slot state tracking makes release-discipline bugs observable:
//! double release returns an error, use after release trips a debug
//! assertion.

use std::collections::VecDeque;
use std::io;

use crossbeam::queue::ArrayQueue;

use super::backend::{CaptureBackend, FrameToken};

/// Lifecycle of one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    /// On the freelist, contents meaningless
    Free,
    /// Carries an injected frame, waiting for `rx_burst`
    Queued,
    /// Handed to the consumer, waiting for `release`
    Held,
}

/// In-memory frame pool implementing [`CaptureBackend`].
pub struct HeapBackend {
    /// Pre-allocated frame slots
    buffers: Vec<Vec<u8>>,
    /// Valid byte count per slot
    lens: Vec<usize>,
    /// Per-slot lifecycle state
    state: Vec<SlotState>,
    /// Lock-free freelist of slot IDs
    freelist: ArrayQueue<FrameToken>,
    /// Injected frames in arrival order
    ready: VecDeque<FrameToken>,
    /// Count of inject calls that found the pool empty (diagnostic)
    exhausted_count: u64,
}

impl HeapBackend {
    /// Create a pool of `capacity` slots of `slot_size` bytes each.
    ///
    /// # Panics
    /// Panics if capacity is 0 or exceeds 65536.
    pub fn new(capacity: usize, slot_size: usize) -> Result<Self, &'static str> {
        assert!(
            capacity > 0 && capacity <= 65536,
            "HeapBackend capacity must be 1-65536"
        );

        let buffers: Vec<Vec<u8>> = (0..capacity).map(|_| vec![0u8; slot_size]).collect();

        let freelist = ArrayQueue::new(capacity);
        for id in 0..capacity {
            freelist
                .push(id as FrameToken)
                .map_err(|_| "Freelist init failed: capacity mismatch")?;
        }

        Ok(Self {
            buffers,
            lens: vec![0; capacity],
            state: vec![SlotState::Free; capacity],
            freelist,
            ready: VecDeque::with_capacity(capacity),
            exhausted_count: 0,
        })
    }

    /// Queue one frame for the next burst.
    ///
    /// # Errors
    /// Fails when all slots are out (exhaustion is counted, the frame is
    /// dropped, the pool stays consistent) or when the frame exceeds the
    /// slot size.
    pub fn inject(&mut self, frame: &[u8]) -> Result<(), &'static str> {
        let Some(id) = self.freelist.pop() else {
            self.exhausted_count += 1;
            return Err("pool exhausted: frame dropped");
        };

        let slot = &mut self.buffers[id as usize];
        if frame.len() > slot.len() {
            self.freelist
                .push(id)
                .map_err(|_| "Freelist full on putback")?;
            return Err("frame exceeds slot size");
        }

        slot[..frame.len()].copy_from_slice(frame);
        self.lens[id as usize] = frame.len();
        self.state[id as usize] = SlotState::Queued;
        self.ready.push_back(id);
        Ok(())
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffers.len()
    }

    /// Slots currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.freelist.len()
    }

    /// Frames injected and not yet fetched.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.ready.len()
    }

    /// Count of injections refused for lack of a free slot.
    #[must_use]
    pub fn exhausted_count(&self) -> u64 {
        self.exhausted_count
    }
}

impl CaptureBackend for HeapBackend {
    fn rx_burst(&mut self, max: usize, out: &mut Vec<FrameToken>) -> io::Result<usize> {
        let mut added = 0;
        while added < max {
            let Some(id) = self.ready.pop_front() else {
                break;
            };
            self.state[id as usize] = SlotState::Held;
            out.push(id);
            added += 1;
        }
        Ok(added)
    }

    fn frame(&self, token: FrameToken) -> &[u8] {
        let id = token as usize;
        debug_assert!(
            id < self.buffers.len(),
            "Invalid frame token: {} >= {}",
            token,
            self.buffers.len()
        );
        debug_assert_eq!(
            self.state[id],
            SlotState::Held,
            "use after release: slot {token} is not held"
        );
        &self.buffers[id][..self.lens[id]]
    }

    fn release(&mut self, token: FrameToken) -> Result<(), &'static str> {
        let id = token as usize;
        if id >= self.state.len() || self.state[id] != SlotState::Held {
            return Err("double release detected");
        }
        self.state[id] = SlotState::Free;
        self.freelist
            .push(token)
            .map_err(|_| "Freelist full: double release detected")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_creation() {
        let pool = HeapBackend::new(16, 2048).expect("Pool creation should succeed");
        assert_eq!(pool.capacity(), 16);
        assert_eq!(pool.available(), 16);
        assert_eq!(pool.queued(), 0);
    }

    #[test]
    fn test_inject_burst_release_cycle() {
        let mut pool = HeapBackend::new(4, 256).expect("Pool creation should succeed");

        pool.inject(b"frame-a").expect("inject a");
        pool.inject(b"frame-b").expect("inject b");
        assert_eq!(pool.available(), 2);
        assert_eq!(pool.queued(), 2);

        let mut burst = Vec::new();
        let n = pool.rx_burst(8, &mut burst).expect("burst");
        assert_eq!(n, 2);

        // Arrival order is preserved
        assert_eq!(pool.frame(burst[0]), b"frame-a");
        assert_eq!(pool.frame(burst[1]), b"frame-b");

        for token in burst {
            pool.release(token).expect("release");
        }
        assert_eq!(pool.available(), 4);
    }

    #[test]
    fn test_burst_respects_max() {
        let mut pool = HeapBackend::new(8, 64).expect("Pool creation should succeed");
        for _ in 0..6 {
            pool.inject(b"x").expect("inject");
        }

        let mut burst = Vec::new();
        assert_eq!(pool.rx_burst(4, &mut burst).expect("burst 1"), 4);
        assert_eq!(pool.rx_burst(4, &mut burst).expect("burst 2"), 2);
        assert_eq!(pool.rx_burst(4, &mut burst).expect("burst 3"), 0);
        assert_eq!(burst.len(), 6);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut pool = HeapBackend::new(2, 16).expect("Pool creation should succeed");
        let big = [0u8; 17];

        assert!(pool.inject(&big).is_err());
        // Slot must be back on the freelist after the rejection
        assert_eq!(pool.available(), 2);
        assert_eq!(pool.queued(), 0);
    }

    #[test]
    fn test_double_release_detected() {
        let mut pool = HeapBackend::new(2, 64).expect("Pool creation should succeed");
        pool.inject(b"once").expect("inject");

        let mut burst = Vec::new();
        pool.rx_burst(1, &mut burst).expect("burst");
        let token = burst[0];

        pool.release(token).expect("first release succeeds");
        assert_eq!(
            pool.release(token),
            Err("double release detected"),
            "second release of the same token must be refused"
        );
        assert_eq!(pool.available(), 2);
    }

    #[test]
    #[should_panic(expected = "use after release")]
    fn test_use_after_release_detected() {
        let mut pool = HeapBackend::new(2, 64).expect("Pool creation should succeed");
        pool.inject(b"gone").expect("inject");

        let mut burst = Vec::new();
        pool.rx_burst(1, &mut burst).expect("burst");
        let token = burst[0];
        pool.release(token).expect("release");

        let _ = pool.frame(token); // must trip the state assertion
    }

    #[test]
    #[should_panic(expected = "HeapBackend capacity must be 1-65536")]
    fn test_pool_zero_capacity() {
        let _ = HeapBackend::new(0, 2048);
    }

    #[test]
    #[should_panic(expected = "HeapBackend capacity must be 1-65536")]
    fn test_pool_capacity_overflow() {
        let _ = HeapBackend::new(65537, 2048);
    }

    /// Resilience: pool exhaustion must degrade gracefully.
    ///
    /// **Scenario:**
    /// 1. Fill a 4-slot pool
    /// 2. Inject a 5th frame (refused, counted, no panic)
    /// 3. Drain one frame through burst + release
    /// 4. Retry the injection (succeeds)
    #[test]
    fn test_pool_exhaustion_graceful_failure() -> Result<(), String> {
        let mut pool = HeapBackend::new(4, 64).map_err(|e| e.to_string())?;

        for i in 0..4 {
            pool.inject(&[i]).map_err(|e| e.to_string())?;
        }
        assert_eq!(pool.available(), 0);

        // 5th frame is refused, not panicked on
        if pool.inject(b"overflow").is_ok() {
            return Err("exhausted pool must refuse injection".to_string());
        }
        assert_eq!(pool.exhausted_count(), 1);

        // Drain one slot and retry
        let mut burst = Vec::new();
        pool.rx_burst(1, &mut burst).map_err(|e| e.to_string())?;
        pool.release(burst[0]).map_err(|e| e.to_string())?;

        pool.inject(b"retry").map_err(|e| e.to_string())?;
        assert_eq!(pool.exhausted_count(), 1, "retry must not count as exhaustion");
        Ok(())
    }
}
