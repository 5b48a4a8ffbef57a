//! A tiny free-list of fixed-size receive buffers for inbound UDP
//! datagrams. This is an allocator hint, not a correctness concern: a pool
//! miss just allocates a fresh buffer, and every [`PooledBuf`] returns its
//! backing `Vec` to the pool on drop, so release is guaranteed on every
//! exit path including early returns and panics during unwind.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

/// Large enough for any practical SOCKS5 UDP payload per the sizing note:
/// encoded addresses are at most 259 bytes, and real-world datagrams rarely
/// approach the IP-level maximum.
pub const RECV_BUF_SIZE: usize = 16 * 1024;

const MAX_POOLED: usize = 64;

struct Inner {
    free: Mutex<Vec<Vec<u8>>>,
}

/// Handle to a shared pool of [`RECV_BUF_SIZE`]-byte buffers.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<Inner>,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    pub fn new() -> Self {
        Self { inner: Arc::new(Inner { free: Mutex::new(Vec::new()) }) }
    }

    /// Acquires a zero-filled buffer of [`RECV_BUF_SIZE`] bytes, reusing a
    /// previously released one when available.
    pub fn acquire(&self) -> PooledBuf {
        let mut buf = self.inner.free.lock().unwrap().pop().unwrap_or_else(|| vec![0u8; RECV_BUF_SIZE]);
        buf.iter_mut().for_each(|b| *b = 0);
        PooledBuf { buf: Some(buf), inner: self.inner.clone() }
    }
}

/// A buffer on loan from a [`BufferPool`]. Derefs to `[u8]`; returned to
/// the pool automatically when dropped.
pub struct PooledBuf {
    buf: Option<Vec<u8>>,
    inner: Arc<Inner>,
}

impl Deref for PooledBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().expect("buffer taken before drop")
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().expect("buffer taken before drop")
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            let mut free = self.inner.free.lock().unwrap();
            if free.len() < MAX_POOLED {
                free.push(buf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquired_buffer_has_expected_size() {
        let pool = BufferPool::new();
        let buf = pool.acquire();
        assert_eq!(buf.len(), RECV_BUF_SIZE);
    }

    #[test]
    fn released_buffer_is_reused() {
        let pool = BufferPool::new();
        {
            let mut buf = pool.acquire();
            buf[0] = 0xAB;
        }
        assert_eq!(pool.inner.free.lock().unwrap().len(), 1);
        let reused = pool.acquire();
        assert_eq!(reused[0], 0);
        assert_eq!(pool.inner.free.lock().unwrap().len(), 0);
    }

    #[test]
    fn pool_caps_retained_buffers() {
        let pool = BufferPool::new();
        let bufs: Vec<_> = (0..MAX_POOLED + 5).map(|_| pool.acquire()).collect();
        drop(bufs);
        assert_eq!(pool.inner.free.lock().unwrap().len(), MAX_POOLED);
    }
}
