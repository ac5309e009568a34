//! Single-producer/single-consumer byte ring
//!
//! Storage is a fixed `[u8; N]` with two free-running indices. The indices
//! only ever grow (with unsigned wraparound) and are reduced to a slot with
//! the mask `N - 1`, so `put - get` is always the number of stored bytes.
//!
//! The ring is used twice per device: RX (interrupt produces, application
//! consumes) and TX (application produces, frame tick consumes). [`RingBuffer::split`]
//! hands out one [`Producer`] and one [`Consumer`]; each index is written by
//! exactly one half and only read by the other, so no lock is required.

#![allow(unsafe_code)]

use core::cell::UnsafeCell;
use core::slice;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Fixed-capacity circular byte buffer
///
/// `N` must be a power of two; other capacities are rejected at compile time:
///
/// ```compile_fail
/// let ring = cdc_vcom::cdc::RingBuffer::<100>::new();
/// ```
pub struct RingBuffer<const N: usize> {
    get_index: AtomicUsize,
    put_index: AtomicUsize,
    data: UnsafeCell<[u8; N]>,
}

// SAFETY: shared references only expose index loads. Slot access requires
// either `&mut RingBuffer` or one of the halves returned by `split`, which
// borrows the ring mutably, so at most one producer and one consumer exist and
// they never touch the same slot (see `Producer` / `Consumer`).
unsafe impl<const N: usize> Sync for RingBuffer<N> {}

impl<const N: usize> RingBuffer<N> {
    const MASK: usize = {
        assert!(N.is_power_of_two(), "ring buffer capacity must be a power of two");
        N - 1
    };

    /// Total capacity in bytes
    pub const CAPACITY: usize = N;

    /// Create an empty ring
    #[must_use]
    pub const fn new() -> Self {
        let _mask = Self::MASK;
        Self {
            get_index: AtomicUsize::new(0),
            put_index: AtomicUsize::new(0),
            data: UnsafeCell::new([0; N]),
        }
    }

    /// Split into the producer and consumer halves
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let ring: &Self = self;
        (Producer { ring }, Consumer { ring })
    }

    /// Number of stored bytes
    #[must_use]
    pub fn len(&self) -> usize {
        let get = self.get_index.load(Ordering::Acquire);
        let put = self.put_index.load(Ordering::Acquire);
        put.wrapping_sub(get)
    }

    /// No bytes stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All `N` slots in use
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Bytes that can still be pushed
    #[must_use]
    pub fn free(&self) -> usize {
        N - self.len()
    }

    /// Append one byte; returns `false` and leaves the ring untouched when full
    pub fn push(&mut self, byte: u8) -> bool {
        self.split().0.push(byte)
    }

    /// Remove the oldest byte
    pub fn pop(&mut self) -> Option<u8> {
        self.split().1.pop()
    }

    /// Free bytes before the storage wraps
    #[must_use]
    pub fn contiguous_space(&self) -> usize {
        Producer { ring: self }.contiguous_space()
    }

    /// Stored bytes before the storage wraps
    #[must_use]
    pub fn contiguous_len(&self) -> usize {
        Consumer { ring: self }.contiguous_len()
    }

    /// Discard all stored bytes
    pub fn clear(&mut self) {
        let put = *self.put_index.get_mut();
        *self.get_index.get_mut() = put;
    }

    fn slot_ptr(&self, index: usize) -> *mut u8 {
        // SAFETY: `index & MASK < N`, so the offset stays inside the array.
        unsafe { self.data.get().cast::<u8>().add(index & Self::MASK) }
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Writing half of a [`RingBuffer`]
///
/// Owns `put_index` and the free slots in `[put, get + N)`.
pub struct Producer<'a, const N: usize> {
    ring: &'a RingBuffer<N>,
}

impl<const N: usize> Producer<'_, N> {
    /// Number of stored bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// No bytes stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// All slots in use
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// Bytes that can still be pushed
    #[must_use]
    pub fn free(&self) -> usize {
        self.ring.free()
    }

    /// Free bytes reachable without wrapping, i.e. the largest block a single
    /// copy can land in
    #[must_use]
    pub fn contiguous_space(&self) -> usize {
        let put = self.ring.put_index.load(Ordering::Relaxed);
        let until_wrap = N - (put & RingBuffer::<N>::MASK);
        self.free().min(until_wrap)
    }

    /// Append one byte; returns `false` when full
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        let put = self.ring.put_index.load(Ordering::Relaxed);
        // SAFETY: the ring is not full, so slot `put` is outside the
        // consumer's readable range and only this producer writes it.
        unsafe { self.ring.slot_ptr(put).write(byte) };
        self.ring.put_index.store(put.wrapping_add(1), Ordering::Release);
        true
    }

    /// Let `fill` write straight into the contiguous free block and commit the
    /// number of bytes it reports (clamped to the block length)
    pub fn write_contiguous<F>(&mut self, fill: F) -> usize
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        let space = self.contiguous_space();
        let put = self.ring.put_index.load(Ordering::Relaxed);
        // SAFETY: `[put, put + space)` maps to consecutive slots (no wrap) that
        // are all free, so the consumer will not read them until the store below.
        let block = unsafe { slice::from_raw_parts_mut(self.ring.slot_ptr(put), space) };
        let written = fill(block).min(space);
        self.ring.put_index.store(put.wrapping_add(written), Ordering::Release);
        written
    }
}

/// Reading half of a [`RingBuffer`]
///
/// Owns `get_index` and the stored bytes in `[get, put)`.
pub struct Consumer<'a, const N: usize> {
    ring: &'a RingBuffer<N>,
}

impl<const N: usize> Consumer<'_, N> {
    /// Number of stored bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// No bytes stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Stored bytes readable without wrapping, i.e. the largest block a single
    /// copy can take
    #[must_use]
    pub fn contiguous_len(&self) -> usize {
        let get = self.ring.get_index.load(Ordering::Relaxed);
        let until_wrap = N - (get & RingBuffer::<N>::MASK);
        self.len().min(until_wrap)
    }

    /// Remove the oldest byte
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let get = self.ring.get_index.load(Ordering::Relaxed);
        // SAFETY: the ring is not empty, so slot `get` was published by the
        // producer's release store and is not written again until we advance.
        let byte = unsafe { self.ring.slot_ptr(get).read() };
        self.ring.get_index.store(get.wrapping_add(1), Ordering::Release);
        Some(byte)
    }

    /// Hand up to `max` contiguous bytes to `drain` and release as many as it
    /// reports consumed (clamped to the block length)
    pub fn read_contiguous<F>(&mut self, max: usize, drain: F) -> usize
    where
        F: FnOnce(&[u8]) -> usize,
    {
        let len = self.contiguous_len().min(max);
        let get = self.ring.get_index.load(Ordering::Relaxed);
        // SAFETY: `[get, get + len)` maps to consecutive published slots the
        // producer will not overwrite until `get_index` moves past them.
        let block = unsafe { slice::from_raw_parts(self.ring.slot_ptr(get), len) };
        let consumed = drain(block).min(len);
        self.ring.get_index.store(get.wrapping_add(consumed), Ordering::Release);
        consumed
    }
}
