#![no_std]

//! Frame inspection core shared by the XDP program and the userspace reader.
//!
//! The pipeline is strictly linear: a [`Cursor`] over the frame feeds
//! [`dispatch`], whose [`Dissection`] is written into an [`InspectEvent`]
//! and handed to an [`EventSink`]. Every path ends in [`Verdict::Pass`].

#[cfg(test)]
extern crate std;

pub mod channel;
pub mod cursor;
pub mod dispatch;
pub mod event;
pub mod header;

#[cfg(test)]
mod testing;

pub use channel::EventSink;
pub use cursor::Cursor;
pub use dispatch::{dispatch, Dissection};
pub use event::{InspectEvent, Protocol, SNAPSHOT_LEN};

#[cfg(feature = "user")]
unsafe impl aya::Pod for InspectEvent {}

/// Outcome handed back to the host for every frame. Inspection only
/// observes, so there is a single variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
}

/// Run one frame through the pipeline.
///
/// IPv4 frames are written into `scratch` and submitted to `sink`; anything
/// else produces no event. `scratch` lets the caller keep the record off a
/// constrained stack.
#[inline(always)]
pub fn inspect<S: EventSink>(
    frame: Cursor<'_>,
    ts: u64,
    scratch: &mut InspectEvent,
    sink: &S,
) -> Verdict {
    if let Some(dissection) = dispatch(frame) {
        scratch.fill(&dissection, ts);
        sink.submit(scratch);
    }
    Verdict::Pass
}
