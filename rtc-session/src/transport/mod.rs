//! Boundary between the negotiation core and whatever actually runs the two
//! endpoints.
//!
//! The core never calls the transport. It emits [`TransportCommand`]s, each
//! tagged with a [`TransactionId`], and expects exactly one
//! [`TransportReply`] per command carrying the same id. Things the transport
//! discovers on its own (trickled candidates, endpoint state changes, data
//! channel messages) come back as [`TransportNotification`]s.

pub mod candidate;
pub(crate) mod outbox;

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use shared::error::Result;

use crate::configuration::{MediaKind, RTCDataChannelInit, RTCOfferOptions};
use crate::endpoint::EndpointId;
use crate::sdp::RTCSessionDescription;
use crate::state::EndpointState;

pub use candidate::RTCIceCandidateInit;

/// Correlates a [`TransportCommand`] with its [`TransportReply`].
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportOp {
    /// Capture local media and open the data channel, if any.
    AcquireMedia {
        media: MediaKind,
        data_channel: Option<RTCDataChannelInit>,
    },
    CreateOffer(RTCOfferOptions),
    CreateAnswer,
    SetLocalDescription(RTCSessionDescription),
    SetRemoteDescription(RTCSessionDescription),
    /// `None` signals end of candidates.
    AddRemoteCandidate(Option<RTCIceCandidateInit>),
    InsertTone {
        tone: char,
        duration: Duration,
    },
    /// One chunk for the endpoint's data channel.
    SendData(Bytes),
    Close,
}

/// Discriminant of [`TransportOp`], used to key fault injection and traces.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TransportOpKind {
    AcquireMedia,
    CreateOffer,
    CreateAnswer,
    SetLocalDescription,
    SetRemoteDescription,
    AddRemoteCandidate,
    InsertTone,
    SendData,
    Close,
}

impl TransportOp {
    pub fn kind(&self) -> TransportOpKind {
        match self {
            TransportOp::AcquireMedia { .. } => TransportOpKind::AcquireMedia,
            TransportOp::CreateOffer(_) => TransportOpKind::CreateOffer,
            TransportOp::CreateAnswer => TransportOpKind::CreateAnswer,
            TransportOp::SetLocalDescription(_) => TransportOpKind::SetLocalDescription,
            TransportOp::SetRemoteDescription(_) => TransportOpKind::SetRemoteDescription,
            TransportOp::AddRemoteCandidate(_) => TransportOpKind::AddRemoteCandidate,
            TransportOp::InsertTone { .. } => TransportOpKind::InsertTone,
            TransportOp::SendData(_) => TransportOpKind::SendData,
            TransportOp::Close => TransportOpKind::Close,
        }
    }
}

impl fmt::Display for TransportOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            TransportOpKind::AcquireMedia => "acquireMedia",
            TransportOpKind::CreateOffer => "createOffer",
            TransportOpKind::CreateAnswer => "createAnswer",
            TransportOpKind::SetLocalDescription => "setLocalDescription",
            TransportOpKind::SetRemoteDescription => "setRemoteDescription",
            TransportOpKind::AddRemoteCandidate => "addIceCandidate",
            TransportOpKind::InsertTone => "insertTone",
            TransportOpKind::SendData => "send",
            TransportOpKind::Close => "close",
        };
        write!(f, "{s}")
    }
}

/// A request for the transport to act on one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportCommand {
    pub transaction_id: TransactionId,
    pub endpoint: EndpointId,
    pub op: TransportOp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportOutput {
    Done,
    Description(RTCSessionDescription),
}

/// Outcome of the command with the same [`TransactionId`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransportReply {
    pub transaction_id: TransactionId,
    pub result: Result<TransportOutput>,
}

impl TransportReply {
    pub fn done(transaction_id: TransactionId) -> Self {
        TransportReply {
            transaction_id,
            result: Ok(TransportOutput::Done),
        }
    }

    pub fn description(transaction_id: TransactionId, description: RTCSessionDescription) -> Self {
        TransportReply {
            transaction_id,
            result: Ok(TransportOutput::Description(description)),
        }
    }

    pub fn failed(transaction_id: TransactionId, err: shared::error::Error) -> Self {
        TransportReply {
            transaction_id,
            result: Err(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportNotification {
    /// `endpoint` discovered a local candidate. `None` marks end of gathering.
    IceCandidate {
        endpoint: EndpointId,
        candidate: Option<RTCIceCandidateInit>,
    },
    StateChange {
        endpoint: EndpointId,
        state: EndpointState,
    },
    /// `endpoint` received a message on its data channel.
    DataReceived { endpoint: EndpointId, data: Bytes },
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_transport_op_kind() {
        let tests = vec![
            (
                TransportOp::AcquireMedia {
                    media: MediaKind::Audio,
                    data_channel: None,
                },
                "acquireMedia",
            ),
            (
                TransportOp::CreateOffer(RTCOfferOptions::default()),
                "createOffer",
            ),
            (TransportOp::CreateAnswer, "createAnswer"),
            (
                TransportOp::SetRemoteDescription(RTCSessionDescription::default()),
                "setRemoteDescription",
            ),
            (TransportOp::AddRemoteCandidate(None), "addIceCandidate"),
            (TransportOp::SendData(Bytes::from_static(b"abc")), "send"),
            (TransportOp::Close, "close"),
        ];

        for (op, expected) in tests {
            assert_eq!(op.kind().to_string(), expected);
        }
    }
}
