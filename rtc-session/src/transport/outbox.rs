use std::collections::VecDeque;

use super::{TransactionId, TransportCommand, TransportOp};
use crate::endpoint::EndpointId;
use crate::event::RTCSessionEvent;

/// Queues shared by the session and the candidate relay.
#[derive(Default, Debug)]
pub(crate) struct Outbox {
    next_transaction_id: u64,
    pub(crate) commands: VecDeque<TransportCommand>,
    pub(crate) events: VecDeque<RTCSessionEvent>,
}

impl Outbox {
    pub(crate) fn command(&mut self, endpoint: EndpointId, op: TransportOp) -> TransactionId {
        self.next_transaction_id += 1;
        let transaction_id = TransactionId(self.next_transaction_id);
        log::trace!("{transaction_id} {endpoint} {}", op.kind());
        self.commands.push_back(TransportCommand {
            transaction_id,
            endpoint,
            op,
        });
        transaction_id
    }

    pub(crate) fn event(&mut self, event: RTCSessionEvent) {
        self.events.push_back(event);
    }
}
