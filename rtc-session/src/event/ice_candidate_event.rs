use shared::error::Error;

use crate::endpoint::EndpointId;
use crate::transport::RTCIceCandidateInit;

#[derive(Debug, Clone, PartialEq)]
pub struct RTCIceCandidateEvent {
    /// Endpoint that discovered the candidate.
    pub source: EndpointId,
    pub candidate: Option<RTCIceCandidateInit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RTCIceCandidateErrorEvent {
    pub source: EndpointId,
    pub candidate: Option<RTCIceCandidateInit>,
    pub error: Error,
}
