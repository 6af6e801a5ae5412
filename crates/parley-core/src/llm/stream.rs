//! Cancellable lazy sequence of completion fragments.
//!
//! [`FragmentStream`] wraps a producer stream of [`StreamItem`]s with a
//! [`CancellationToken`]. The token is checked before every poll of the
//! producer and also wakes a read that is parked on network I/O, so a
//! cancellation request is observed even in the middle of a long read.
//! Once cancellation is observed the producer (and with it the underlying
//! connection) is dropped before `poll_next` returns.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::{self, BoxStream};
use futures_util::Stream;
use pin_project_lite::pin_project;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use parley_types::llm::{LlmError, StreamItem};

pin_project! {
    /// A cancellable stream of fragments ending in `Complete` or `Error`.
    ///
    /// Guarantees:
    /// - empty fragments are never yielded
    /// - nothing is yielded after `Complete`, `Error`, or cancellation
    /// - a producer that ends without a terminal item yields `Complete`
    pub struct FragmentStream {
        #[pin]
        cancelled: WaitForCancellationFutureOwned,
        token: CancellationToken,
        inner: Option<BoxStream<'static, StreamItem>>,
    }
}

impl FragmentStream {
    /// Wrap a producer with a fresh cancellation token.
    pub fn new<S>(inner: S) -> Self
    where
        S: Stream<Item = StreamItem> + Send + 'static,
    {
        Self::with_token(inner, CancellationToken::new())
    }

    /// Wrap a producer with an existing cancellation token.
    pub fn with_token<S>(inner: S, token: CancellationToken) -> Self
    where
        S: Stream<Item = StreamItem> + Send + 'static,
    {
        Self {
            cancelled: token.clone().cancelled_owned(),
            token,
            inner: Some(Box::pin(inner)),
        }
    }

    /// Rebind the stream to a caller-owned token, e.g. a session's turn token.
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        Self {
            cancelled: token.clone().cancelled_owned(),
            token,
            inner: self.inner,
        }
    }

    /// A stream that yields the given items in order.
    pub fn from_items(items: Vec<StreamItem>) -> Self {
        Self::new(stream::iter(items))
    }

    /// A stream whose only item is the given error.
    pub fn failed(error: LlmError) -> Self {
        Self::from_items(vec![StreamItem::Error(error)])
    }

    /// Token that cancels this stream when triggered.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request cancellation. The next poll ends the stream.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Stream for FragmentStream {
    type Item = StreamItem;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamItem>> {
        let this = self.project();

        if this.inner.is_none() {
            return Poll::Ready(None);
        }

        if this.cancelled.poll(cx).is_ready() {
            *this.inner = None;
            return Poll::Ready(None);
        }

        let polled = loop {
            let Some(inner) = this.inner.as_mut() else {
                return Poll::Ready(None);
            };
            match inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(StreamItem::Fragment(text))) if text.is_empty() => continue,
                other => break other,
            }
        };

        match polled {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(StreamItem::Fragment(text))) => {
                Poll::Ready(Some(StreamItem::Fragment(text)))
            }
            Poll::Ready(Some(terminal)) => {
                *this.inner = None;
                Poll::Ready(Some(terminal))
            }
            Poll::Ready(None) => {
                *this.inner = None;
                Poll::Ready(Some(StreamItem::Complete))
            }
        }
    }
}

impl fmt::Debug for FragmentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentStream")
            .field("cancelled", &self.token.is_cancelled())
            .field("finished", &self.inner.is_none())
            .finish()
    }
}
