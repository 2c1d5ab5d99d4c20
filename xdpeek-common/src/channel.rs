use crate::event::InspectEvent;

/// Destination for finished events.
///
/// `submit` must not block and has no failure path visible to the caller:
/// when the current CPU's buffer is full the event is dropped and the loss is
/// accounted for on the reading side.
pub trait EventSink {
    fn submit(&self, event: &InspectEvent);
}
