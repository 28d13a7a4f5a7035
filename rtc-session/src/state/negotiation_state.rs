use std::fmt;

/// State of a [`NegotiationSession`](crate::negotiation::NegotiationSession).
///
/// ```text
/// Idle → Offering → Answering → Established ⇄ Renegotiating
///           ↓           ↓
///      NegotiationFailed (retry returns to the failed step)
///
/// any state → Closed
/// ```
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum NegotiationState {
    /// No call started yet.
    #[default]
    Idle,

    /// Local media is being acquired and the offer produced and applied.
    Offering,

    /// The answering endpoint holds the offer and its answer is in flight.
    Answering,

    /// Both endpoints are stable; renegotiation and DTMF are available.
    Established,

    /// A bandwidth renegotiation round is in flight. The previous
    /// constraint stays in effect until the round completes.
    Renegotiating,

    /// A step of the initial handshake failed. The failed step can be
    /// retried; nothing else is allowed except hangup.
    NegotiationFailed,

    Closed,
}

const NEGOTIATION_STATE_IDLE_STR: &str = "idle";
const NEGOTIATION_STATE_OFFERING_STR: &str = "offering";
const NEGOTIATION_STATE_ANSWERING_STR: &str = "answering";
const NEGOTIATION_STATE_ESTABLISHED_STR: &str = "established";
const NEGOTIATION_STATE_RENEGOTIATING_STR: &str = "renegotiating";
const NEGOTIATION_STATE_NEGOTIATION_FAILED_STR: &str = "negotiation-failed";
const NEGOTIATION_STATE_CLOSED_STR: &str = "closed";

impl NegotiationState {
    /// Established, possibly with a renegotiation round in flight.
    pub fn is_established(&self) -> bool {
        matches!(
            self,
            NegotiationState::Established | NegotiationState::Renegotiating
        )
    }

    /// An offer/answer round is outstanding.
    pub fn is_negotiating(&self) -> bool {
        matches!(
            self,
            NegotiationState::Offering
                | NegotiationState::Answering
                | NegotiationState::Renegotiating
        )
    }
}

impl From<&str> for NegotiationState {
    fn from(raw: &str) -> Self {
        match raw {
            NEGOTIATION_STATE_IDLE_STR => NegotiationState::Idle,
            NEGOTIATION_STATE_OFFERING_STR => NegotiationState::Offering,
            NEGOTIATION_STATE_ANSWERING_STR => NegotiationState::Answering,
            NEGOTIATION_STATE_ESTABLISHED_STR => NegotiationState::Established,
            NEGOTIATION_STATE_RENEGOTIATING_STR => NegotiationState::Renegotiating,
            NEGOTIATION_STATE_NEGOTIATION_FAILED_STR => NegotiationState::NegotiationFailed,
            NEGOTIATION_STATE_CLOSED_STR => NegotiationState::Closed,
            _ => NegotiationState::Idle,
        }
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            NegotiationState::Idle => NEGOTIATION_STATE_IDLE_STR,
            NegotiationState::Offering => NEGOTIATION_STATE_OFFERING_STR,
            NegotiationState::Answering => NEGOTIATION_STATE_ANSWERING_STR,
            NegotiationState::Established => NEGOTIATION_STATE_ESTABLISHED_STR,
            NegotiationState::Renegotiating => NEGOTIATION_STATE_RENEGOTIATING_STR,
            NegotiationState::NegotiationFailed => NEGOTIATION_STATE_NEGOTIATION_FAILED_STR,
            NegotiationState::Closed => NEGOTIATION_STATE_CLOSED_STR,
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_negotiation_state_string_round_trip() {
        let tests = vec![
            (NegotiationState::Idle, "idle"),
            (NegotiationState::Offering, "offering"),
            (NegotiationState::Answering, "answering"),
            (NegotiationState::Established, "established"),
            (NegotiationState::Renegotiating, "renegotiating"),
            (NegotiationState::NegotiationFailed, "negotiation-failed"),
            (NegotiationState::Closed, "closed"),
        ];

        for (state, expected_string) in tests {
            assert_eq!(state.to_string(), expected_string);
            assert_eq!(NegotiationState::from(expected_string), state);
        }

        // unknown names fall back to the initial state
        assert_eq!(NegotiationState::from("Unspecified"), NegotiationState::Idle);
        assert_eq!(NegotiationState::from(""), NegotiationState::Idle);
    }

    #[test]
    fn test_negotiation_state_predicates() {
        assert!(NegotiationState::Established.is_established());
        assert!(NegotiationState::Renegotiating.is_established());
        assert!(!NegotiationState::Answering.is_established());

        assert!(NegotiationState::Offering.is_negotiating());
        assert!(!NegotiationState::NegotiationFailed.is_negotiating());
        assert!(!NegotiationState::Closed.is_negotiating());
    }
}
