//! Reusable scratch buffers for socket-table reads.
//!
//! A scan checks a buffer out, fills it with the raw tables and hands it to
//! the decoder. Dropping the [`PooledBuffer`] puts it back. Buffers are
//! cleared on the way in and on the way out, so one scan never sees bytes
//! left over from another.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

/// Starting capacity of a freshly allocated buffer; a busy host's
/// `tcp` + `tcp6` tables usually fit.
pub const DEFAULT_BUFFER_CAPACITY: usize = 5000;

/// Idle buffers kept around. Anything returned beyond this is freed.
pub const DEFAULT_MAX_IDLE: usize = 8;

#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<Vec<u8>>>,
    buffer_capacity: usize,
    max_idle: usize,
}

impl BufferPool {
    pub fn new(buffer_capacity: usize, max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            buffer_capacity,
            max_idle,
        }
    }

    /// Check out an empty buffer. It belongs to the caller until dropped.
    pub fn acquire(self: &Arc<Self>) -> PooledBuffer {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let mut buf = reused.unwrap_or_else(|| Vec::with_capacity(self.buffer_capacity));
        buf.clear();

        PooledBuffer {
            buf,
            pool: Arc::clone(self),
        }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn release(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_IDLE)
    }
}

/// A buffer on loan from a [`BufferPool`]. Returned when dropped.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Vec<u8>,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl AsRef<[u8]> for PooledBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}
