use std::fmt;

use crate::configuration::BandwidthLimit;
use crate::endpoint::EndpointId;
use crate::sdp::{RTCSdpType, RTCSessionDescription};
use crate::state::{NegotiationState, StateChangeOp};
use crate::transport::TransactionId;

/// Target of a bandwidth renegotiation round. `remote` is the offerer's
/// current remote description rewritten for `limit`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Renegotiation {
    pub(crate) limit: BandwidthLimit,
    pub(crate) remote: RTCSessionDescription,
}

/// One suspension point of the offer/answer exchange. Each step is a single
/// transport command; its reply decides the next step.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NegotiationStep {
    AcquireMedia,
    CreateOffer,
    SetLocalOffer(RTCSessionDescription),
    SetRemoteOffer(RTCSessionDescription),
    CreateAnswer,
    SetLocalAnswer(RTCSessionDescription),
    /// Carries the answer as produced; the cap is applied when issued.
    SetRemoteAnswer(RTCSessionDescription),
    RenegotiateCreateOffer(Renegotiation),
    RenegotiateSetLocalOffer(RTCSessionDescription, Renegotiation),
    RenegotiateSetRemote(Renegotiation),
}

impl NegotiationStep {
    pub(crate) fn endpoint(&self) -> EndpointId {
        match self {
            NegotiationStep::SetRemoteOffer(_)
            | NegotiationStep::CreateAnswer
            | NegotiationStep::SetLocalAnswer(_) => EndpointId::Answerer,
            _ => EndpointId::Offerer,
        }
    }

    /// Session state while this step is in flight.
    pub(crate) fn phase(&self) -> NegotiationState {
        match self {
            NegotiationStep::AcquireMedia
            | NegotiationStep::CreateOffer
            | NegotiationStep::SetLocalOffer(_)
            | NegotiationStep::SetRemoteOffer(_) => NegotiationState::Offering,
            NegotiationStep::CreateAnswer
            | NegotiationStep::SetLocalAnswer(_)
            | NegotiationStep::SetRemoteAnswer(_) => NegotiationState::Answering,
            NegotiationStep::RenegotiateCreateOffer(_)
            | NegotiationStep::RenegotiateSetLocalOffer(_, _)
            | NegotiationStep::RenegotiateSetRemote(_) => NegotiationState::Renegotiating,
        }
    }

    /// The signaling move the step asks its endpoint to make, if any.
    pub(crate) fn signaling(&self) -> Option<(StateChangeOp, RTCSdpType)> {
        match self {
            NegotiationStep::SetLocalOffer(_) | NegotiationStep::RenegotiateSetLocalOffer(_, _) => {
                Some((StateChangeOp::SetLocal, RTCSdpType::Offer))
            }
            NegotiationStep::SetRemoteOffer(_) => Some((StateChangeOp::SetRemote, RTCSdpType::Offer)),
            NegotiationStep::SetLocalAnswer(_) => Some((StateChangeOp::SetLocal, RTCSdpType::Answer)),
            NegotiationStep::SetRemoteAnswer(_) => {
                Some((StateChangeOp::SetRemote, RTCSdpType::Answer))
            }
            NegotiationStep::RenegotiateSetRemote(r) => {
                Some((StateChangeOp::SetRemote, r.remote.sdp_type))
            }
            _ => None,
        }
    }
}

impl fmt::Display for NegotiationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NegotiationStep::AcquireMedia => "acquire local media",
            NegotiationStep::CreateOffer | NegotiationStep::RenegotiateCreateOffer(_) => {
                "create offer"
            }
            NegotiationStep::CreateAnswer => "create answer",
            NegotiationStep::SetLocalOffer(_)
            | NegotiationStep::SetLocalAnswer(_)
            | NegotiationStep::RenegotiateSetLocalOffer(_, _) => "set local description",
            NegotiationStep::SetRemoteOffer(_)
            | NegotiationStep::SetRemoteAnswer(_)
            | NegotiationStep::RenegotiateSetRemote(_) => "set remote description",
        };
        write!(f, "{s}")
    }
}

/// The step whose reply the session is waiting for.
#[derive(Debug)]
pub(crate) struct PendingStep {
    pub(crate) transaction_id: TransactionId,
    pub(crate) step: NegotiationStep,
    /// Description actually handed to the transport by a set-description step.
    pub(crate) applied: Option<RTCSessionDescription>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_step_endpoint_and_phase() {
        let desc = RTCSessionDescription::default;
        let renegotiation = || Renegotiation {
            limit: BandwidthLimit::Kbps(125),
            remote: RTCSessionDescription::answer(String::new()),
        };

        let tests = vec![
            (NegotiationStep::AcquireMedia, EndpointId::Offerer, NegotiationState::Offering),
            (NegotiationStep::CreateOffer, EndpointId::Offerer, NegotiationState::Offering),
            (NegotiationStep::SetLocalOffer(desc()), EndpointId::Offerer, NegotiationState::Offering),
            (NegotiationStep::SetRemoteOffer(desc()), EndpointId::Answerer, NegotiationState::Offering),
            (NegotiationStep::CreateAnswer, EndpointId::Answerer, NegotiationState::Answering),
            (NegotiationStep::SetLocalAnswer(desc()), EndpointId::Answerer, NegotiationState::Answering),
            (NegotiationStep::SetRemoteAnswer(desc()), EndpointId::Offerer, NegotiationState::Answering),
            (
                NegotiationStep::RenegotiateCreateOffer(renegotiation()),
                EndpointId::Offerer,
                NegotiationState::Renegotiating,
            ),
            (
                NegotiationStep::RenegotiateSetRemote(renegotiation()),
                EndpointId::Offerer,
                NegotiationState::Renegotiating,
            ),
        ];

        for (step, endpoint, phase) in tests {
            assert_eq!(step.endpoint(), endpoint, "{step:?}");
            assert_eq!(step.phase(), phase, "{step:?}");
        }
    }

    #[test]
    fn test_renegotiation_reuses_remote_type() {
        let step = NegotiationStep::RenegotiateSetRemote(Renegotiation {
            limit: BandwidthLimit::Unlimited,
            remote: RTCSessionDescription::answer(String::new()),
        });
        assert_eq!(
            step.signaling(),
            Some((StateChangeOp::SetRemote, RTCSdpType::Answer))
        );
        assert_eq!(NegotiationStep::CreateAnswer.signaling(), None);
    }
}
