//! Lifecycle notifications.
//!
//! Every subscriber gets its own channel and sees every event in emission
//! order. The engine does not persist events; analysis and reporting
//! consumers do.

use std::sync::mpsc::{self, Receiver, Sender};

use serde::{Deserialize, Serialize};

use crate::model::{RequestId, Time, VehicleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// No vehicle could take the request when it first reached the solver.
    NoFeasibleInsertion,
    /// An accepted request the solver could no longer keep.
    DroppedOnReoptimization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DispatchEvent {
    RequestAssigned {
        request: RequestId,
        vehicle: VehicleId,
    },
    RequestRejected {
        request: RequestId,
        reason: RejectReason,
    },
    PassengerPickedUp {
        request: RequestId,
        vehicle: VehicleId,
        time: Time,
    },
    PassengerDroppedOff {
        request: RequestId,
        vehicle: VehicleId,
        time: Time,
    },
}

impl DispatchEvent {
    pub fn request(&self) -> RequestId {
        match self {
            DispatchEvent::RequestAssigned { request, .. }
            | DispatchEvent::RequestRejected { request, .. }
            | DispatchEvent::PassengerPickedUp { request, .. }
            | DispatchEvent::PassengerDroppedOff { request, .. } => *request,
        }
    }
}

#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<DispatchEvent>>,
}

impl EventBus {
    pub fn subscribe(&mut self) -> Receiver<DispatchEvent> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.push(sender);
        receiver
    }

    /// Delivers to every live subscriber and forgets the ones that hung up.
    pub fn publish(&mut self, event: DispatchEvent) {
        tracing::trace!(?event, "dispatch event");
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
