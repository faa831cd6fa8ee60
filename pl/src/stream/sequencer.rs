//! Ordered, push-driven stream merging
//!
//! A sequencer accepts lazily produced segments over time and replays them
//! strictly in push order: the first pushed segment is drained in full before
//! the second yields anything, no matter which producer finishes first. When
//! the active segment is exhausted and nothing else has been pushed yet, the
//! consumer suspends until the next push arrives. Pushing the end marker
//! (via [`SequencerHandle::close`]) ends the output once everything queued
//! before it has drained.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tracing::debug;

/// A lazily produced run of items, drained in full before the next segment
/// begins. A segment may itself be the output of a nested sequencer.
pub type Segment<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Create a linked push handle / merged output pair.
pub fn sequencer<T>() -> (SequencerHandle<T>, SequencerStream<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        SequencerHandle { tx },
        SequencerStream {
            rx,
            active: None,
            done: false,
        },
    )
}

/// Push side of a sequencer
///
/// Cloneable; any owner may append segments. Pushes after the consumer is
/// gone (or after the end marker) are dropped.
pub struct SequencerHandle<T> {
    tx: mpsc::UnboundedSender<Option<Segment<T>>>,
}

impl<T> Clone for SequencerHandle<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T: Send + 'static> SequencerHandle<T> {
    /// Append a segment. Returns false if the consumer is gone.
    pub fn push(&self, segment: Segment<T>) -> bool {
        let accepted = self.tx.send(Some(segment)).is_ok();
        if !accepted {
            debug!("SequencerHandle::push: consumer gone, segment dropped");
        }
        accepted
    }

    /// Append a single literal item as its own segment.
    pub fn push_item(&self, item: T) -> bool {
        self.push(Box::pin(futures::stream::iter([item])))
    }

    /// Push the end marker: the output ends once all previously pushed
    /// segments have drained.
    pub fn close(&self) -> bool {
        let accepted = self.tx.send(None).is_ok();
        if !accepted {
            debug!("SequencerHandle::close: consumer gone");
        }
        accepted
    }

    /// True once the consumer has been dropped or has seen the end marker.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Merged output of a sequencer
///
/// Pulls from the active segment only when polled, so a slow consumer stalls
/// the producers behind it. Ends at the end marker, or when every handle has
/// been dropped without one.
pub struct SequencerStream<T> {
    rx: mpsc::UnboundedReceiver<Option<Segment<T>>>,
    active: Option<Segment<T>>,
    done: bool,
}

impl<T> Stream for SequencerStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        loop {
            if let Some(segment) = this.active.as_mut() {
                match segment.as_mut().poll_next(cx) {
                    Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
                    Poll::Ready(None) => this.active = None,
                    Poll::Pending => return Poll::Pending,
                }
                continue;
            }
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(Some(segment))) => this.active = Some(segment),
                Poll::Ready(Some(None)) | Poll::Ready(None) => {
                    this.done = true;
                    this.rx.close();
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
