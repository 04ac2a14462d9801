//! Reusable byte buffer pool.

use serde::Serialize;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A buffer borrowed from a [`BufferPool`].
///
/// The handle owns its memory exclusively. Returning it with
/// [`BufferPool::release`] moves it back into the pool, so the borrower can
/// no longer reach it afterwards.
#[derive(Debug)]
pub struct BufferHandle {
    buf: Vec<u8>,
    requested: usize,
}

impl BufferHandle {
    /// Length the borrower asked for.
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Usable capacity of the backing region (always `>= requested`).
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Takes the backing vector out of the handle. The memory will not
    /// return to the pool.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

impl Deref for BufferHandle {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for BufferHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

/// Counters exposed for observability.
#[derive(Debug, Clone, Serialize)]
pub struct BufferPoolStats {
    /// Size of each pooled buffer.
    pub buffer_size: usize,
    /// Maximum number of idle buffers retained.
    pub capacity: usize,
    /// Idle buffers currently in the free list.
    pub free: usize,
    /// Fresh allocations performed by `acquire`.
    pub allocated: u64,
    /// Acquisitions served from the free list.
    pub reused: u64,
    /// Buffers dropped on release (pool full or wrong size).
    pub discarded: u64,
}

/// Fixed-capacity pool of pre-sized byte buffers.
///
/// `acquire` never blocks: when the free list is empty, or the request is
/// larger than the pooled size, it allocates. `release` keeps at most
/// `capacity` idle buffers and drops the rest.
pub struct BufferPool {
    buffer_size: usize,
    capacity: usize,
    free: Mutex<Vec<Vec<u8>>>,
    allocated: AtomicU64,
    reused: AtomicU64,
    discarded: AtomicU64,
}

impl BufferPool {
    /// Creates a pool retaining up to `capacity` buffers of `buffer_size` bytes.
    pub fn new(capacity: usize, buffer_size: usize) -> Self {
        Self {
            buffer_size,
            capacity,
            free: Mutex::new(Vec::with_capacity(capacity)),
            allocated: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Size of each pooled buffer.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Returns an empty buffer with capacity of at least `min_size` bytes.
    pub fn acquire(&self, min_size: usize) -> BufferHandle {
        if min_size <= self.buffer_size {
            let pooled = self.free_list().pop();
            if let Some(mut buf) = pooled {
                buf.clear();
                self.reused.fetch_add(1, Ordering::Relaxed);
                return BufferHandle {
                    buf,
                    requested: min_size,
                };
            }
        }

        self.allocated.fetch_add(1, Ordering::Relaxed);
        BufferHandle {
            buf: Vec::with_capacity(min_size.max(self.buffer_size)),
            requested: min_size,
        }
    }

    /// Returns a buffer to the pool.
    ///
    /// Buffers that do not match the pooled size, or arrive while the free
    /// list is full, are dropped so steady-state memory stays bounded.
    pub fn release(&self, handle: BufferHandle) {
        let mut buf = handle.buf;
        let cap = buf.capacity();
        if cap < self.buffer_size || cap > self.buffer_size.saturating_mul(2) {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }

        buf.clear();
        let mut free = self.free_list();
        if free.len() < self.capacity {
            free.push(buf);
        } else {
            drop(free);
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns current pool counters.
    pub fn stats(&self) -> BufferPoolStats {
        BufferPoolStats {
            buffer_size: self.buffer_size,
            capacity: self.capacity,
            free: self.free_list().len(),
            allocated: self.allocated.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    fn free_list(&self) -> std::sync::MutexGuard<'_, Vec<Vec<u8>>> {
        // The free list holds plain vectors, so a poisoned lock is still usable.
        self.free.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("buffer_size", &self.buffer_size)
            .field("capacity", &self.capacity)
            .finish()
    }
}
