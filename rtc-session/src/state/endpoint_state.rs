use std::fmt;

use serde::{Deserialize, Serialize};

use crate::configuration::UNSPECIFIED_STR;

/// Readiness of an endpoint's data channel or media sender.
///
/// Transitions only move forward, `New → Open → Closed` (or straight to
/// `Closed`); once closed, an endpoint never reopens.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointState {
    #[serde(rename = "Unspecified")]
    Unspecified = 0,

    #[default]
    #[serde(rename = "new")]
    New,

    #[serde(rename = "open")]
    Open,

    #[serde(rename = "closed")]
    Closed,
}

const ENDPOINT_STATE_NEW_STR: &str = "new";
const ENDPOINT_STATE_OPEN_STR: &str = "open";
const ENDPOINT_STATE_CLOSED_STR: &str = "closed";

impl EndpointState {
    /// Whether moving from `self` to `next` is a transition observers hear about.
    pub(crate) fn can_transition_to(&self, next: EndpointState) -> bool {
        matches!(
            (self, next),
            (EndpointState::New, EndpointState::Open)
                | (EndpointState::New, EndpointState::Closed)
                | (EndpointState::Open, EndpointState::Closed)
        )
    }
}

impl From<&str> for EndpointState {
    fn from(raw: &str) -> Self {
        match raw {
            ENDPOINT_STATE_NEW_STR => EndpointState::New,
            ENDPOINT_STATE_OPEN_STR => EndpointState::Open,
            ENDPOINT_STATE_CLOSED_STR => EndpointState::Closed,
            _ => EndpointState::Unspecified,
        }
    }
}

impl fmt::Display for EndpointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            EndpointState::New => ENDPOINT_STATE_NEW_STR,
            EndpointState::Open => ENDPOINT_STATE_OPEN_STR,
            EndpointState::Closed => ENDPOINT_STATE_CLOSED_STR,
            EndpointState::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_endpoint_state_transitions() {
        let tests = vec![
            (EndpointState::New, EndpointState::Open, true),
            (EndpointState::New, EndpointState::Closed, true),
            (EndpointState::Open, EndpointState::Closed, true),
            (EndpointState::Open, EndpointState::Open, false),
            (EndpointState::Closed, EndpointState::Open, false),
            (EndpointState::Closed, EndpointState::Closed, false),
            (EndpointState::Open, EndpointState::New, false),
        ];

        for (cur, next, expected) in tests {
            assert_eq!(cur.can_transition_to(next), expected, "{cur} -> {next}");
        }
    }

    #[test]
    fn test_endpoint_state_string() {
        let tests = vec![
            (EndpointState::Unspecified, "Unspecified"),
            (EndpointState::New, "new"),
            (EndpointState::Open, "open"),
            (EndpointState::Closed, "closed"),
        ];

        for (state, expected_string) in tests {
            assert_eq!(state.to_string(), expected_string);
        }
    }
}
