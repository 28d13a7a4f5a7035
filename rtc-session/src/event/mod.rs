//! Events surfaced by [`NegotiationSession::poll_event`](crate::negotiation::NegotiationSession).

mod ice_candidate_event;

use shared::error::Error;

use crate::configuration::BandwidthLimit;
use crate::dtmf::RTCDtmfToneChangeEvent;
use crate::endpoint::EndpointId;
use crate::sdp::RTCSessionDescription;
use crate::state::{EndpointState, NegotiationState, RTCSignalingState};
use crate::transfer::TransferProgress;

pub use ice_candidate_event::{RTCIceCandidateErrorEvent, RTCIceCandidateEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum RTCSessionEvent {
    OnNegotiationStateChange(NegotiationState),
    OnSignalingStateChange(EndpointId, RTCSignalingState),
    OnEndpointStateChange(EndpointId, EndpointState),
    /// An endpoint produced an offer or answer, before it is applied.
    OnDescriptionCreated(EndpointId, RTCSessionDescription),
    /// A trickled candidate was accepted by the peer.
    OnIceCandidate(RTCIceCandidateEvent),
    /// A trickled candidate was rejected or could not be delivered.
    OnIceCandidateError(RTCIceCandidateErrorEvent),
    OnRenegotiationComplete(BandwidthLimit),
    OnRenegotiationFailed(Error),
    OnNegotiationFailed(Error),
    OnToneChange(RTCDtmfToneChangeEvent),
    /// The answerer received another chunk of the data transfer.
    OnTransferProgress(TransferProgress),
    /// Everything sent has been received; the call is hung up next.
    OnTransferComplete(TransferProgress),
    OnTransferFailed(Error),
}
