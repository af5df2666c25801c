use core::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;

/// race two futures and resolve with whichever completes first without
/// dropping the other.
pub trait Select: Sized {
    fn select<Fut>(self, other: Fut) -> SelectFuture<Self, Fut>;
}

impl<F> Select for F
where
    F: Future,
{
    #[inline]
    fn select<Fut>(self, other: Fut) -> SelectFuture<Self, Fut> {
        SelectFuture { fut1: self, fut2: other }
    }
}

pub struct SelectFuture<Fut1, Fut2> {
    fut1: Fut1,
    fut2: Fut2,
}

impl<Fut1, Fut2> Future for SelectFuture<Fut1, Fut2>
where
    Fut1: Future,
    Fut2: Future,
{
    type Output = SelectOutput<Fut1::Output, Fut2::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // SAFETY: fut1/fut2 are only ever accessed through this single Pin<&mut Self>
        // and never moved out of it.
        unsafe {
            let this = self.get_unchecked_mut();
            if let Poll::Ready(a) = Pin::new_unchecked(&mut this.fut1).poll(cx) {
                return Poll::Ready(SelectOutput::A(a));
            }
            Pin::new_unchecked(&mut this.fut2).poll(cx).map(SelectOutput::B)
        }
    }
}

pub enum SelectOutput<A, B> {
    A(A),
    B(B),
}

impl<A, B> fmt::Debug for SelectOutput<A, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A(_) => f.write_str("SelectOutput::A(..)"),
            Self::B(_) => f.write_str("SelectOutput::B(..)"),
        }
    }
}

/// an unordered set of in-flight futures of uniform type, used to track
/// concurrently open HTTP/2 streams on a single connection.
pub struct Queue<F>(FuturesUnordered<F>);

impl<F> Default for Queue<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Future> Queue<F> {
    pub fn new() -> Self {
        Self(FuturesUnordered::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&self, future: F) {
        self.0.push(future);
    }

    /// resolve with the next completed future's output.
    ///
    /// # Panics
    /// panics if called while the queue is empty; callers must check
    /// [`Queue::is_empty`] first.
    pub async fn next(&mut self) -> F::Output {
        self.0.next().await.expect("Queue::next called on an empty queue")
    }

    pub async fn drain(&mut self) {
        while self.0.next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::future::ready;

    #[tokio::test]
    async fn select_prefers_ready_future() {
        let out = ready(1u8).select(core::future::pending::<u8>()).await;
        assert!(matches!(out, SelectOutput::A(1)));
    }

    #[tokio::test]
    async fn queue_tracks_count() {
        let mut q = Queue::new();
        assert!(q.is_empty());
        q.push(ready(1));
        q.push(ready(2));
        assert_eq!(q.len(), 2);
        let mut total = 0;
        while !q.is_empty() {
            total += q.next().await;
        }
        assert_eq!(total, 3);
    }
}
