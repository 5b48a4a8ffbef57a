//! Forces flush boundaries on an outbound byte stream at caller-specified
//! offsets, without altering byte content or count. The trick is that
//! `AsyncWrite::poll_write` is already allowed to return fewer bytes than
//! it was given — a "short write" the caller is required to retry — so a
//! pending split is just poll_write clamping the slice it forwards to the
//! inner sink to however many bytes remain before the next boundary. The
//! caller's own write-loop supplies the "separate write call" for the
//! remainder for free.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};

/// A pull-style source of split points: each call yields the length of the
/// next segment, or `0` to mean "no more splits, pass everything through".
pub trait SplitSchedule: Send + Sync {
    fn next_split(&mut self) -> usize;
}

/// A single split after `n` bytes, then unrestricted for the rest of time.
pub struct Fixed {
    value: Option<usize>,
}

impl Fixed {
    pub fn new(n: usize) -> Self {
        Self { value: (n > 0).then_some(n) }
    }
}

impl SplitSchedule for Fixed {
    fn next_split(&mut self) -> usize {
        self.value.take().unwrap_or(0)
    }
}

/// A schedule built from `(count, length)` pairs: `length` repeated
/// `count` times, each pair consumed in order. A pair with `length == 0`
/// terminates the schedule early, per the "zero disables further splits"
/// rule.
pub struct Repeated {
    queue: VecDeque<usize>,
}

impl Repeated {
    pub fn new(segments: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut queue = VecDeque::new();
        for (count, length) in segments {
            if length == 0 {
                break;
            }
            queue.extend(std::iter::repeat(length).take(count));
        }
        Self { queue }
    }
}

impl SplitSchedule for Repeated {
    fn next_split(&mut self) -> usize {
        self.queue.pop_front().unwrap_or(0)
    }
}

pub fn fixed(n: usize) -> Box<dyn SplitSchedule> {
    Box::new(Fixed::new(n))
}

pub fn repeated(segments: impl IntoIterator<Item = (usize, usize)>) -> Box<dyn SplitSchedule> {
    Box::new(Repeated::new(segments))
}

/// Wraps a sink `W`, forcing a flush boundary at each point the wrapped
/// [`SplitSchedule`] names. Once the schedule yields `0`, no further
/// splitting occurs and the wrapper is a transparent passthrough.
pub struct SplitWriter<W> {
    inner: W,
    schedule: Box<dyn SplitSchedule>,
    remaining: usize,
    disabled: bool,
}

impl<W> SplitWriter<W> {
    pub fn new(inner: W, schedule: Box<dyn SplitSchedule>) -> Self {
        Self { inner, schedule, remaining: 0, disabled: false }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: AsyncWrite + Unpin> SplitWriter<W> {
    fn pull_schedule_if_exhausted(&mut self) {
        if !self.disabled && self.remaining == 0 {
            match self.schedule.next_split() {
                0 => self.disabled = true,
                n => self.remaining = n,
            }
        }
    }

    /// Copies from `source` to the inner sink, honoring pending split
    /// boundaries: each phase copies exactly the current segment length
    /// before the schedule is advanced. Reaching the end of `source`
    /// short-circuits the remaining phases, matching `Write`'s "short
    /// reads propagate as-is" behavior.
    pub async fn read_from<R>(&mut self, source: &mut R) -> io::Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        let mut total = 0u64;
        loop {
            self.pull_schedule_if_exhausted();

            if self.disabled {
                total += tokio::io::copy(source, &mut self.inner).await?;
                break;
            }

            let want = self.remaining as u64;
            let mut limited = source.take(want);
            let copied = tokio::io::copy(&mut limited, &mut self.inner).await?;
            self.remaining -= copied as usize;
            total += copied;

            if copied < want || self.remaining > 0 {
                break;
            }
        }
        Ok(total)
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for SplitWriter<W> {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Pin::new(&mut self.inner).poll_write(cx, buf);
        }

        self.pull_schedule_if_exhausted();

        let to_write = if self.disabled { buf.len() } else { buf.len().min(self.remaining) };
        let n = ready!(Pin::new(&mut self.inner).poll_write(cx, &buf[..to_write]))?;
        if !self.disabled {
            self.remaining -= n;
        }
        Poll::Ready(Ok(n))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl<W: AsyncRead + Unpin> AsyncRead for SplitWriter<W> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<W: crate::transport::StreamConn> crate::transport::StreamConn for SplitWriter<W> {
    fn peer_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.inner.peer_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn fixed_split_matches_scenario_s4() {
        let mock = tokio_test::io::Builder::new().write(b"Req").write(b"uest").build();
        let mut writer = SplitWriter::new(mock, fixed(3));
        writer.write_all(b"Request").await.unwrap();
    }

    #[tokio::test]
    async fn repeated_split_matches_scenario_s5() {
        let mock = tokio_test::io::Builder::new()
            .write(b"R")
            .write(b"eq")
            .write(b"ue")
            .write(b"st")
            .write(b"Req")
            .write(b"ues")
            .write(b"tRequest")
            .build();
        let mut writer = SplitWriter::new(mock, repeated([(1, 1), (3, 2), (2, 3)]));
        writer.write_all(b"RequestRequestRequest").await.unwrap();
    }

    #[tokio::test]
    async fn zero_schedule_is_passthrough() {
        let mock = tokio_test::io::Builder::new().write(b"hello").build();
        let mut writer = SplitWriter::new(mock, fixed(0));
        writer.write_all(b"hello").await.unwrap();
    }

    #[tokio::test]
    async fn empty_write_is_a_no_op() {
        let mock = tokio_test::io::Builder::new().write(b"").build();
        let mut writer = SplitWriter::new(mock, fixed(3));
        writer.write_all(b"").await.unwrap();
    }

    #[tokio::test]
    async fn read_from_honors_split_boundaries() {
        let mock = tokio_test::io::Builder::new().write(b"Req").write(b"uest").build();
        let mut writer = SplitWriter::new(mock, fixed(3));
        let mut source = std::io::Cursor::new(b"Request".to_vec());
        let copied = writer.read_from(&mut source).await.unwrap();
        assert_eq!(copied, 7);
    }

    #[tokio::test]
    async fn read_from_short_circuits_at_source_eof() {
        let mock = tokio_test::io::Builder::new().write(b"ab").build();
        let mut writer = SplitWriter::new(mock, fixed(5));
        let mut source = std::io::Cursor::new(b"ab".to_vec());
        let copied = writer.read_from(&mut source).await.unwrap();
        assert_eq!(copied, 2);
    }
}
