use std::fmt;

use serde::{Deserialize, Serialize};

/// A trickled ICE candidate as discovered by one endpoint and handed to the
/// other. The relay forwards it without looking inside.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RTCIceCandidateInit {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
    pub username_fragment: Option<String>,
}

impl RTCIceCandidateInit {
    /// Host candidate on `address:port` for the first media section.
    pub fn host(foundation: u32, address: &str, port: u16) -> Self {
        RTCIceCandidateInit {
            candidate: format!(
                "candidate:{foundation} 1 udp 2130706431 {address} {port} typ host"
            ),
            sdp_mid: Some("0".to_owned()),
            sdp_mline_index: Some(0),
            username_fragment: None,
        }
    }
}

impl fmt::Display for RTCIceCandidateInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.candidate)
    }
}
