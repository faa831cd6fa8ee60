//! Output pacing
//!
//! Optional stage that delays each emitted fragment by a fixed interval,
//! for demo output that would otherwise scroll past too fast. A zero
//! interval is the identity.

use std::time::Duration;

use futures::{Stream, StreamExt};

/// Insert `interval` of delay before each item of `stream`.
pub fn paced<S>(stream: S, interval: Duration) -> impl Stream<Item = S::Item>
where
    S: Stream,
{
    stream.then(move |item| async move {
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
        item
    })
}
