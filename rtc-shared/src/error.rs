use std::num::ParseIntError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    //Session description errors
    /// ErrMalformedDescription indicates that a session description body does
    /// not have the structure a transform expects, e.g. no `c=IN` line.
    #[error("malformed session description: {0}")]
    ErrMalformedDescription(String),
    #[error("failed to create session description: {0}")]
    ErrDescriptionCreationFailed(String),
    #[error("session description rejected: {0}")]
    ErrDescriptionRejected(String),
    #[error("unexpected session description type: {0}")]
    ErrUnexpectedDescriptionType(String),
    #[error("remote description is not set")]
    ErrNoRemoteDescription,

    //Negotiation errors
    #[error("renegotiation already in progress")]
    ErrRenegotiationInProgress,
    #[error("operation is not allowed in negotiation state {0}")]
    ErrInvalidNegotiationState(String),
    #[error("invalid proposed signaling state transition: {0}")]
    ErrSignalingStateProposedTransitionInvalid(String),
    #[error("session is closed")]
    ErrSessionClosed,

    //Endpoint errors
    #[error("endpoint is closed")]
    ErrEndpointClosed,
    #[error("a session pairs exactly two endpoints")]
    ErrEndpointLimitReached,
    #[error("endpoint does not belong to this session")]
    ErrUnknownEndpoint,

    //Candidate errors
    /// ErrCandidateRejected is reported for a single candidate the peer refused.
    /// It is never fatal to the session.
    #[error("remote candidate rejected: {0}")]
    ErrCandidateRejected(String),

    //DTMF errors
    #[error("dtmf sender is not available")]
    ErrDtmfUnavailable,
    #[error("invalid dtmf tone: {0:?}")]
    ErrInvalidDtmfTone(char),

    //Data channel errors
    #[error("data channel is not available")]
    ErrDataChannelUnavailable,
    #[error("transfer size must be greater than zero")]
    ErrInvalidTransferSize,
    #[error("a data transfer is already in progress")]
    ErrTransferInProgress,

    #[error("parse int: {0}")]
    ParseInt(String),
    #[error("{0}")]
    Other(String),
}

impl From<ParseIntError> for Error {
    fn from(e: ParseIntError) -> Self {
        Error::ParseInt(e.to_string())
    }
}
