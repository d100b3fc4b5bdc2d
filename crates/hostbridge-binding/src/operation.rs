//! Per-operation completions
//!
//! Every send, publish or subscribe gets its own single-use channel and an
//! [`OperationSink`] for the engine. The sink holds a reference to the
//! parent binding for as long as the operation is in flight. Completing the
//! sink consumes it, so a completion is reported at most once; dropping it
//! uncompleted releases the reference without any delivery.

use crate::binding::{Binding, EventRecord};
use crate::tracker::{BindingKind, TrackerTicket};
use hostbridge_core::{BridgeError, BridgeResult, ERROR_CODE_SUCCESS};
use hostbridge_dispatch::{DispatchChannel, Host, RetireMode};
use std::fmt;

pub(crate) struct OperationOutcome {
    payload: Vec<u8>,
    code: i32,
    _ticket: TrackerTicket,
}

impl OperationOutcome {
    fn into_result(self) -> BridgeResult<Vec<u8>> {
        if self.code == ERROR_CODE_SUCCESS {
            Ok(self.payload)
        } else {
            Err(BridgeError::Engine {
                code: self.code,
                message: "operation failed".to_string(),
            })
        }
    }
}

trait CompleteOperation: Send {
    fn complete(self: Box<Self>, payload: Vec<u8>, code: i32);
}

struct PendingOperation<H: Send + 'static> {
    binding: Option<Binding<H>>,
    ticket: Option<TrackerTicket>,
    channel: DispatchChannel<EventRecord<H, OperationOutcome>>,
}

impl<H: Send + 'static> CompleteOperation for PendingOperation<H> {
    fn complete(mut self: Box<Self>, payload: Vec<u8>, code: i32) {
        let (Some(binding), Some(ticket)) = (self.binding.take(), self.ticket.take()) else {
            return;
        };
        let record = EventRecord {
            binding,
            payload: OperationOutcome {
                payload,
                code,
                _ticket: ticket,
            },
        };
        if let Err(error) = self.channel.enqueue(record) {
            tracing::trace!(label = self.channel.label(), %error, "operation completion discarded");
        }
    }
}

impl<H: Send + 'static> Drop for PendingOperation<H> {
    fn drop(&mut self) {
        if self.binding.take().is_some() {
            tracing::debug!(label = self.channel.label(), "operation dropped without completion");
        }
        // Lets a queued completion drain, then destroys the channel.
        self.channel.retire(RetireMode::Drain);
    }
}

/// Completion handle for one engine operation
pub struct OperationSink {
    pending: Option<Box<dyn CompleteOperation>>,
}

impl OperationSink {
    /// Report the outcome; `payload` is copied and an error code of `0` means success
    pub fn complete(mut self, payload: &[u8], error_code: i32) {
        if let Some(pending) = self.pending.take() {
            pending.complete(payload.to_vec(), error_code);
        }
    }
}

impl fmt::Debug for OperationSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationSink")
            .field("pending", &self.pending.is_some())
            .finish()
    }
}

/// Start an operation on `binding`, delivering its outcome to `on_complete`
///
/// The completion is discarded if the binding is closed or its host value
/// is gone by the time it reaches the host thread.
pub(crate) fn start<H, V, F>(
    host: &Host,
    binding: &Binding<H>,
    label: &'static str,
    on_complete: F,
) -> BridgeResult<OperationSink>
where
    H: Send + 'static,
    V: 'static,
    F: FnOnce(&Host, &V, BridgeResult<Vec<u8>>) + Send + 'static,
{
    let mut on_complete = Some(on_complete);
    let channel = DispatchChannel::create(
        host,
        label,
        move |host: &Host, record: EventRecord<H, OperationOutcome>| {
            let EventRecord { binding, payload } = record;
            if binding.is_closed(host) {
                tracing::debug!(binding = %binding.id(), label, "completion after close discarded");
                return;
            }
            let Some(value) = binding.resolve::<V>(host) else {
                tracing::debug!(binding = %binding.id(), label, "host value gone, completion discarded");
                return;
            };
            if let Some(callback) = on_complete.take() {
                callback(host, &value, payload.into_result());
            }
        },
    )?;
    binding.attach(host, Box::new(channel.clone()));

    let ticket = TrackerTicket::issue(BindingKind::Operation);
    tracing::trace!(binding = %binding.id(), operation = %ticket.id(), label, "operation started");

    Ok(OperationSink {
        pending: Some(Box::new(PendingOperation {
            binding: Some(binding.acquire()),
            ticket: Some(ticket),
            channel,
        })),
    })
}
