//! Single-consumer event loop.
//!
//! Commands, sensor samples and timer ticks share one ordered queue. Each
//! envelope is handled to completion before the next is taken, so no two
//! handlers ever observe the session concurrently.

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use super::input::{Envelope, Input};
use super::session::RecordingSession;
use crate::events::Event;
use crate::storage::RecordStore;

/// Drain `rx` into `session` and forward notices to `tx`.
///
/// Returns the session once the sending side closes. A failed command is
/// reported as [`Event::Rejected`] and does not stop the loop. Notices that
/// cannot be delivered because the receiver is gone are dropped.
pub async fn run<S: RecordStore>(
    mut session: RecordingSession<S>,
    mut rx: UnboundedReceiver<Envelope>,
    tx: UnboundedSender<Event>,
) -> RecordingSession<S> {
    while let Some(envelope) = rx.recv().await {
        session.observe_time(envelope.at_ms);
        let name = match &envelope.input {
            Input::Command(command) => Some(command.name()),
            Input::Sensor(_) => None,
        };

        if let Err(e) = session.dispatch(envelope.input) {
            let command = name.unwrap_or("sensor");
            warn!(command, error = %e, "command rejected");
            let _ = tx.send(Event::Rejected {
                command: command.to_string(),
                reason: e.to_string(),
            });
        }

        for event in session.drain_events() {
            if tx.send(event).is_err() {
                debug!("event receiver closed");
            }
        }
    }
    session
}
