//! Ordered stream plumbing: the sequencer merge primitive and the
//! conductor duplex construct built on top of it.

mod conductor;
mod sequencer;

pub use conductor::{Conductor, Stage};
pub use sequencer::{Segment, SequencerHandle, SequencerStream, sequencer};
