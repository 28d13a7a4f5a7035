//! The two endpoints of a loopback call and their lifecycle.

pub mod lifecycle;

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::configuration::{MediaKind, RTCDataChannelInit, TransportFamily};
use crate::sdp::RTCSessionDescription;
use crate::state::{EndpointState, RTCSignalingState};
use crate::transport::RTCIceCandidateInit;

pub use lifecycle::{EndpointLifecycle, OnStateChangeHdlrFn};

/// Which side of the call an endpoint plays. The offerer ("A") starts
/// negotiation; the answerer ("B") responds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointId {
    Offerer,
    Answerer,
}

impl EndpointId {
    pub fn peer(&self) -> EndpointId {
        match self {
            EndpointId::Offerer => EndpointId::Answerer,
            EndpointId::Answerer => EndpointId::Offerer,
        }
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointId::Offerer => write!(f, "offerer"),
            EndpointId::Answerer => write!(f, "answerer"),
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Used only to attribute traces.
    pub label: String,
    pub ordered: bool,
    pub transport_family: TransportFamily,
    pub media: MediaKind,
    pub data_channel: Option<RTCDataChannelInit>,
}

/// One side of the call as tracked by the session.
#[derive(Debug)]
pub struct Endpoint {
    id: EndpointId,
    config: EndpointConfig,
    state: EndpointState,
    signaling_state: RTCSignalingState,
    /// Every local description applied during the call, oldest first.
    local_descriptions: Vec<RTCSessionDescription>,
    remote_description: Option<RTCSessionDescription>,
    /// Local candidates not yet handed to the peer.
    pub(crate) pending_candidates: VecDeque<Option<RTCIceCandidateInit>>,
}

impl Endpoint {
    pub(crate) fn new(id: EndpointId, config: EndpointConfig) -> Self {
        Endpoint {
            id,
            config,
            state: EndpointState::New,
            signaling_state: RTCSignalingState::Stable,
            local_descriptions: vec![],
            remote_description: None,
            pending_candidates: VecDeque::new(),
        }
    }

    pub fn id(&self) -> EndpointId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.config.label
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn state(&self) -> EndpointState {
        self.state
    }

    pub fn signaling_state(&self) -> RTCSignalingState {
        self.signaling_state
    }

    /// The local description currently in effect.
    pub fn local_description(&self) -> Option<&RTCSessionDescription> {
        self.local_descriptions.last()
    }

    /// Local descriptions applied so far, one per negotiation round.
    pub fn local_descriptions(&self) -> &[RTCSessionDescription] {
        &self.local_descriptions
    }

    pub fn remote_description(&self) -> Option<&RTCSessionDescription> {
        self.remote_description.as_ref()
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub(crate) fn set_signaling_state(&mut self, state: RTCSignalingState) -> bool {
        if self.signaling_state == state {
            false
        } else {
            self.signaling_state = state;
            true
        }
    }

    pub(crate) fn set_local_description(&mut self, description: RTCSessionDescription) {
        self.local_descriptions.push(description);
    }

    pub(crate) fn set_remote_description(&mut self, description: RTCSessionDescription) {
        self.remote_description = Some(description);
    }

    pub(crate) fn set_state(&mut self, state: EndpointState) {
        self.state = state;
    }

    /// Drops everything the endpoint negotiated.
    pub(crate) fn release(&mut self) {
        self.signaling_state = RTCSignalingState::Closed;
        self.local_descriptions.clear();
        self.remote_description = None;
        self.pending_candidates.clear();
    }
}
