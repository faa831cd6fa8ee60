//! Duplex processing construct over a sequencer
//!
//! A conductor pairs an input channel with the merged output of one
//! sequencer. A background task drives a [`Stage`] once per input item,
//! handing it the sequencer's push handle so it can append literal items or
//! splice in whole nested segments. When the input side is dropped the stage
//! gets a final callback to emit anything outstanding and signal the end of
//! output.

use tokio::sync::mpsc;
use tracing::debug;

use super::sequencer::{SequencerHandle, SequencerStream, sequencer};

/// Input channel capacity for a conductor.
const INPUT_BUFFER: usize = 64;

/// A transform driven by a conductor.
///
/// The stage owns the lifecycle of the output chain: it must eventually
/// [`close`](SequencerHandle::close) the handle, typically from `on_close`.
/// Failures are pushed in-band as items, never swallowed.
pub trait Stage<I, T>: Send + 'static {
    /// Handle one input item. Return false to stop consuming input early;
    /// the conductor then proceeds straight to `on_close`.
    fn on_input(&mut self, input: I, chain: &SequencerHandle<T>) -> bool;

    /// Input has ended (or the stage stopped it). Emit any final segments
    /// and close the chain.
    fn on_close(&mut self, chain: &SequencerHandle<T>);
}

/// Input/output pair for a spawned stage.
pub struct Conductor<I, T> {
    /// Send input items here; drop the sender to finish the stage.
    pub input: mpsc::Sender<I>,
    /// Merged, ordered output of everything the stage pushed.
    pub output: SequencerStream<T>,
}

impl<I: Send + 'static, T: Send + 'static> Conductor<I, T> {
    /// Spawn the driving task for `stage` and return its endpoints.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(mut stage: impl Stage<I, T>) -> Self {
        let (input, mut input_rx) = mpsc::channel::<I>(INPUT_BUFFER);
        let (handle, output) = sequencer::<T>();

        tokio::spawn(async move {
            while let Some(item) = input_rx.recv().await {
                if !stage.on_input(item, &handle) {
                    debug!("Conductor: stage stopped consuming input");
                    break;
                }
            }
            stage.on_close(&handle);
        });

        Self { input, output }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    struct Upcase;

    impl Stage<String, String> for Upcase {
        fn on_input(&mut self, input: String, chain: &SequencerHandle<String>) -> bool {
            chain.push_item(input.to_uppercase());
            true
        }

        fn on_close(&mut self, chain: &SequencerHandle<String>) {
            chain.push_item("!".to_string());
            chain.close();
        }
    }

    #[tokio::test]
    async fn stage_transforms_each_item_and_finishes() {
        let conductor = Conductor::spawn(Upcase);
        let input = conductor.input;
        input.send("ab".to_string()).await.unwrap();
        input.send("cd".to_string()).await.unwrap();
        drop(input);

        let items: Vec<String> = conductor.output.collect().await;
        assert_eq!(items, vec!["AB", "CD", "!"]);
    }

    struct Splice;

    impl Stage<u32, u32> for Splice {
        fn on_input(&mut self, input: u32, chain: &SequencerHandle<u32>) -> bool {
            // Splice a nested sequencer in as one segment.
            let (inner, inner_stream) = sequencer::<u32>();
            chain.push(Box::pin(inner_stream));
            inner.push_item(input * 10);
            inner.push_item(input * 10 + 1);
            inner.close();
            true
        }

        fn on_close(&mut self, chain: &SequencerHandle<u32>) {
            chain.close();
        }
    }

    #[tokio::test]
    async fn stage_can_splice_nested_segments() {
        let conductor = Conductor::spawn(Splice);
        let input = conductor.input;
        input.send(1).await.unwrap();
        input.send(2).await.unwrap();
        drop(input);

        let items: Vec<u32> = conductor.output.collect().await;
        assert_eq!(items, vec![10, 11, 20, 21]);
    }

    struct StopEarly;

    impl Stage<u32, u32> for StopEarly {
        fn on_input(&mut self, input: u32, chain: &SequencerHandle<u32>) -> bool {
            chain.push_item(input);
            input < 2
        }

        fn on_close(&mut self, chain: &SequencerHandle<u32>) {
            chain.close();
        }
    }

    #[tokio::test]
    async fn stage_can_stop_consuming_early() {
        let conductor = Conductor::spawn(StopEarly);
        let input = conductor.input;
        for n in 1..=5 {
            if input.send(n).await.is_err() {
                break;
            }
        }
        drop(input);

        let items: Vec<u32> = conductor.output.collect().await;
        assert_eq!(items, vec![1, 2]);
    }
}
