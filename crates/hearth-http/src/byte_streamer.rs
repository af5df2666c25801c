//! [`ByteStreamer`]: the lazy, single-producer/single-consumer byte-chunk
//! channel backing a streamed request body (spec.md §4.1).
//!
//! grounded directly on the teacher's `h1::body::{RequestBody, RequestBodySender}`
//! (`Rc<RefCell<Inner>>`, a `VecDeque<Bytes>` queue, waker-based readiness) with
//! the upload-size ceiling and `on_consume` backpressure hook spec.md adds.

use std::{
    cell::RefCell,
    collections::VecDeque,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll, Waker},
};

use futures_core::Stream;
use hearth_io::bytes::Bytes;

use crate::error::CoreError;

struct Inner {
    queue: VecDeque<Bytes>,
    buffered_size: u64,
    /// sum of every `Bytes` chunk ever fed, checked against `max_size`
    /// before a new chunk is accepted.
    delivered_size: u64,
    max_size: u64,
    terminator: Option<Terminator>,
    terminator_yielded: bool,
    consumer_waker: Option<Waker>,
    on_consume: Option<Box<dyn FnMut()>>,
}

#[derive(Clone)]
enum Terminator {
    End,
    Error(ErrorKind),
}

#[derive(Clone)]
enum ErrorKind {
    PayloadTooLarge,
    Transport(Rc<std::io::Error>),
}

impl Inner {
    fn new(max_size: u64) -> Self {
        Self {
            queue: VecDeque::new(),
            buffered_size: 0,
            delivered_size: 0,
            max_size,
            terminator: None,
            terminator_yielded: false,
            consumer_waker: None,
            on_consume: None,
        }
    }

    fn wake_consumer(&mut self) {
        if let Some(waker) = self.consumer_waker.take() {
            waker.wake();
        }
    }
}

/// consumer-facing handle. yields `Ok(Bytes)` chunks in FIFO order and
/// terminates with `Ok` ending the stream, or `Err` if the producer failed.
/// not `Clone`: the single-consumer invariant is enforced by construction
/// rather than by convention (see DESIGN.md).
pub struct ByteStreamer {
    inner: Rc<RefCell<Inner>>,
}

/// producer-facing handle, held by the transport read side.
#[derive(Clone)]
pub struct ByteStreamerProducer {
    inner: Rc<RefCell<Inner>>,
}

impl ByteStreamer {
    /// construct a bound pair. `max_size` enforces invariant (d): total
    /// delivered bytes may never exceed it.
    pub fn channel(max_size: u64) -> (ByteStreamerProducer, Self) {
        let inner = Rc::new(RefCell::new(Inner::new(max_size)));
        (ByteStreamerProducer { inner: inner.clone() }, Self { inner })
    }

    /// bytes currently buffered and not yet handed to the consumer.
    pub fn buffered_size(&self) -> u64 {
        self.inner.borrow().buffered_size
    }

    /// push a chunk back onto the front of the queue, as if it had never
    /// been consumed. used by the request assembler to put back the
    /// read-ahead prefix when a body is promoted from buffered to
    /// streaming partway through.
    pub(crate) fn unread(&mut self, buf: Bytes) {
        if buf.is_empty() {
            return;
        }
        let mut inner = self.inner.borrow_mut();
        inner.buffered_size += buf.len() as u64;
        inner.queue.push_front(buf);
    }

    /// drain remaining chunks discarding them, until the terminator is
    /// observed. used by the response writer after a response has been
    /// fully written but the request body was not fully consumed.
    pub async fn drain(&mut self) {
        loop {
            match std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await {
                Some(_) => {}
                None => return,
            }
        }
    }
}

impl Drop for ByteStreamer {
    /// a responder that returns without reading a streamed body to
    /// completion would otherwise leave its transport pump parked on
    /// backpressure forever, since nothing is left to fire `on_consume`.
    /// spawn a background drain on the same channel so the pump always
    /// gets an eventual consumer, the same way hyper finishes draining an
    /// abandoned incoming body after the handler drops it.
    fn drop(&mut self) {
        if self.inner.borrow().terminator_yielded {
            return;
        }
        let mut abandoned = ByteStreamer { inner: self.inner.clone() };
        tokio::task::spawn_local(async move {
            abandoned.drain().await;
        });
    }
}

impl ByteStreamerProducer {
    pub fn buffered_size(&self) -> u64 {
        self.inner.borrow().buffered_size
    }

    /// true once a terminator (end or error) has been queued. a transport
    /// read loop feeding this producer checks this to stop pumping more
    /// bytes off the wire once the consumer side can no longer make use of
    /// them — most importantly once `max_size` has already been exceeded,
    /// since there is otherwise nothing that would stop it reading for the
    /// rest of the declared body.
    pub fn is_terminated(&self) -> bool {
        self.inner.borrow().terminator.is_some()
    }

    /// install a callback invoked every time a `Bytes` chunk is handed to
    /// the consumer. the connection handler uses this to resume transport
    /// reads once buffered size drops below its backpressure threshold.
    pub fn set_on_consume(&self, callback: impl FnMut() + 'static) {
        self.inner.borrow_mut().on_consume = Some(Box::new(callback));
    }

    /// append a chunk. if the chunk would push lifetime-delivered bytes
    /// above `max_size`, a `PayloadTooLarge` terminator is queued instead
    /// and no further chunks are accepted (invariant (b) and (d)).
    pub fn feed_bytes(&self, buf: Bytes) {
        let mut inner = self.inner.borrow_mut();
        if inner.terminator.is_some() {
            return;
        }
        let would_total = inner.delivered_size + buf.len() as u64;
        if would_total > inner.max_size {
            inner.terminator = Some(Terminator::Error(ErrorKind::PayloadTooLarge));
            inner.wake_consumer();
            return;
        }
        inner.delivered_size = would_total;
        inner.buffered_size += buf.len() as u64;
        inner.queue.push_back(buf);
        inner.wake_consumer();
    }

    pub fn feed_end(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.terminator.is_none() {
            inner.terminator = Some(Terminator::End);
            inner.wake_consumer();
        }
    }

    pub fn feed_error(&self, e: std::io::Error) {
        let mut inner = self.inner.borrow_mut();
        if inner.terminator.is_none() {
            inner.terminator = Some(Terminator::Error(ErrorKind::Transport(Rc::new(e))));
            inner.wake_consumer();
        }
    }
}

impl Stream for ByteStreamer {
    type Item = Result<Bytes, CoreError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut inner = self.inner.borrow_mut();

        if let Some(buf) = inner.queue.pop_front() {
            inner.buffered_size -= buf.len() as u64;
            let mut on_consume = inner.on_consume.take();
            drop(inner);
            if let Some(cb) = on_consume.as_mut() {
                cb();
            }
            self.inner.borrow_mut().on_consume = on_consume;
            return Poll::Ready(Some(Ok(buf)));
        }

        if inner.terminator_yielded {
            return Poll::Ready(None);
        }

        match inner.terminator.clone() {
            Some(Terminator::End) => {
                inner.terminator_yielded = true;
                Poll::Ready(None)
            }
            Some(Terminator::Error(ErrorKind::PayloadTooLarge)) => {
                inner.terminator_yielded = true;
                Poll::Ready(Some(Err(CoreError::PayloadTooLarge)))
            }
            Some(Terminator::Error(ErrorKind::Transport(e))) => {
                inner.terminator_yielded = true;
                let kind = e.kind();
                Poll::Ready(Some(Err(CoreError::Transport(std::io::Error::new(kind, e.to_string())))))
            }
            None => {
                inner.consumer_waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn feed_then_consume_preserves_order() {
        let (tx, mut rx) = ByteStreamer::channel(1024);
        tx.feed_bytes(Bytes::from_static(b"hello "));
        tx.feed_bytes(Bytes::from_static(b"world"));
        tx.feed_end();

        let mut out = Vec::new();
        while let Some(chunk) = rx.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(out, b"hello world");
    }

    #[tokio::test]
    async fn exceeding_max_size_fails_with_payload_too_large() {
        let (tx, mut rx) = ByteStreamer::channel(4);
        tx.feed_bytes(Bytes::from_static(b"toolong"));
        let err = rx.next().await.unwrap().unwrap_err();
        assert!(matches!(err, CoreError::PayloadTooLarge));
        assert!(rx.next().await.is_none());
    }

    #[tokio::test]
    async fn terminator_is_delivered_exactly_once() {
        let (tx, mut rx) = ByteStreamer::channel(1024);
        tx.feed_end();
        assert!(rx.next().await.is_none());
        assert!(rx.next().await.is_none());
    }

    #[tokio::test]
    async fn on_consume_fires_when_a_chunk_is_delivered() {
        let (tx, mut rx) = ByteStreamer::channel(1024);
        let fired = Rc::new(RefCell::new(false));
        let fired2 = fired.clone();
        tx.set_on_consume(move || *fired2.borrow_mut() = true);
        tx.feed_bytes(Bytes::from_static(b"x"));
        rx.next().await.unwrap().unwrap();
        assert!(*fired.borrow());
        tx.feed_end();
        assert!(rx.next().await.is_none());
    }

    #[tokio::test]
    async fn backpressure_resumes_once_buffered_size_drops() {
        let (tx, mut rx) = ByteStreamer::channel(1024);
        tx.feed_bytes(Bytes::from_static(b"abcdef"));
        assert_eq!(rx.buffered_size(), 6);
        rx.next().await.unwrap().unwrap();
        assert_eq!(rx.buffered_size(), 0);
        tx.feed_end();
        assert!(rx.next().await.is_none());
    }

    #[tokio::test]
    async fn dropping_an_unconsumed_streamer_drains_in_the_background() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (tx, rx) = ByteStreamer::channel(1024);
                tx.feed_bytes(Bytes::from_static(b"abandoned"));
                tx.feed_end();
                drop(rx);
                // yield so the background drain spawned by `Drop` gets to run
                // before the producer (and its `Rc`) disappear with the test.
                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
            })
            .await;
    }
}
