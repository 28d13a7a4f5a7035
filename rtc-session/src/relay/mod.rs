//! Trickled candidate relay.
//!
//! A candidate discovered by one endpoint is queued on that endpoint and
//! handed to its peer, in discovery order, once the peer has a remote
//! description to attach it to. Delivery outcomes are reported as events and
//! counted per source; neither success nor failure moves negotiation state.

use std::collections::HashMap;

use shared::error::{Error, Result};

use crate::endpoint::{EndpointId, EndpointLifecycle};
use crate::event::{RTCIceCandidateErrorEvent, RTCIceCandidateEvent, RTCSessionEvent};
use crate::transport::outbox::Outbox;
use crate::transport::{RTCIceCandidateInit, TransactionId, TransportOp};

/// Delivery counters for candidates discovered by one endpoint.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct RelayStats {
    pub forwarded: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug)]
struct InFlight {
    source: EndpointId,
    candidate: Option<RTCIceCandidateInit>,
}

#[derive(Default, Debug)]
pub struct CandidateRelay {
    in_flight: HashMap<TransactionId, InFlight>,
    stats: HashMap<EndpointId, RelayStats>,
}

impl CandidateRelay {
    pub fn stats(&self, source: EndpointId) -> RelayStats {
        self.stats.get(&source).copied().unwrap_or_default()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub(crate) fn owns(&self, transaction_id: TransactionId) -> bool {
        self.in_flight.contains_key(&transaction_id)
    }

    /// Queues a candidate discovered by `source` and forwards whatever the
    /// peer can take now. Candidates of a closed source are dropped.
    pub(crate) fn on_local_candidate(
        &mut self,
        endpoints: &mut EndpointLifecycle,
        source: EndpointId,
        candidate: Option<RTCIceCandidateInit>,
        outbox: &mut Outbox,
    ) -> Result<()> {
        let endpoint = match endpoints.get_mut(source) {
            Ok(endpoint) => endpoint,
            Err(Error::ErrEndpointClosed) => {
                log::debug!("dropping candidate of closed {source}");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        match &candidate {
            Some(c) => log::trace!("{} ICE candidate: \n{c}", endpoint.label()),
            None => log::trace!("{} ICE candidate: \n(null)", endpoint.label()),
        }
        endpoint.pending_candidates.push_back(candidate);

        self.flush(endpoints, source, outbox);
        Ok(())
    }

    /// Forwards the candidates queued on `source` to its peer once the peer
    /// has a remote description. A closed peer fails them all.
    pub(crate) fn flush(
        &mut self,
        endpoints: &mut EndpointLifecycle,
        source: EndpointId,
        outbox: &mut Outbox,
    ) {
        let peer = source.peer();
        let peer_error = match endpoints.get(peer) {
            Ok(endpoint) if endpoint.remote_description().is_none() => return,
            Ok(_) => None,
            Err(err) => Some(err),
        };

        let candidates: Vec<_> = match endpoints.get_mut(source) {
            Ok(endpoint) => endpoint.pending_candidates.drain(..).collect(),
            Err(_) => return,
        };

        let stats = self.stats.entry(source).or_default();
        for candidate in candidates {
            stats.forwarded += 1;
            match &peer_error {
                None => {
                    let transaction_id =
                        outbox.command(peer, TransportOp::AddRemoteCandidate(candidate.clone()));
                    self.in_flight
                        .insert(transaction_id, InFlight { source, candidate });
                }
                Some(err) => {
                    stats.failed += 1;
                    log::warn!("Failed to add ICE Candidate: {err}");
                    outbox.event(RTCSessionEvent::OnIceCandidateError(
                        RTCIceCandidateErrorEvent {
                            source,
                            candidate,
                            error: err.clone(),
                        },
                    ));
                }
            }
        }
    }

    /// Consumes the reply to a forwarded candidate. Returns false if
    /// `transaction_id` is not one of ours.
    pub(crate) fn handle_reply(
        &mut self,
        transaction_id: TransactionId,
        result: Result<()>,
        outbox: &mut Outbox,
    ) -> bool {
        let Some(InFlight { source, candidate }) = self.in_flight.remove(&transaction_id) else {
            return false;
        };

        let stats = self.stats.entry(source).or_default();
        match result {
            Ok(()) => {
                stats.succeeded += 1;
                log::trace!("AddIceCandidate success.");
                outbox.event(RTCSessionEvent::OnIceCandidate(RTCIceCandidateEvent {
                    source,
                    candidate,
                }));
            }
            Err(err) => {
                let error = match err {
                    Error::ErrCandidateRejected(_) | Error::ErrEndpointClosed => err,
                    other => Error::ErrCandidateRejected(other.to_string()),
                };
                stats.failed += 1;
                log::warn!("Failed to add ICE Candidate: {error}");
                outbox.event(RTCSessionEvent::OnIceCandidateError(
                    RTCIceCandidateErrorEvent {
                        source,
                        candidate,
                        error,
                    },
                ));
            }
        }
        true
    }

    /// Forgets every in-flight candidate; their replies will be ignored.
    pub(crate) fn reset(&mut self) {
        self.in_flight.clear();
    }
}
