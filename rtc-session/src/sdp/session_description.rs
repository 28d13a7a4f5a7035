use std::fmt::Display;

use ::sdp::bandwidth::{BandwidthConstraint, apply_bandwidth, parse_bandwidth, remove_bandwidth};
use serde::{Deserialize, Serialize};
use shared::error::Result;

use super::sdp_type::RTCSdpType;

/// An offer or answer as exchanged between the two endpoints.
///
/// Descriptions are values: the bandwidth helpers return a new description
/// and leave `self` untouched.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RTCSessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: RTCSdpType,

    pub sdp: String,
}

impl Display for RTCSessionDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "type: {}, sdp:\n{}",
            self.sdp_type,
            self.sdp.replace("\r\n", "\n")
        )
    }
}

impl RTCSessionDescription {
    pub fn offer(sdp: String) -> RTCSessionDescription {
        RTCSessionDescription {
            sdp_type: RTCSdpType::Offer,
            sdp,
        }
    }

    pub fn answer(sdp: String) -> RTCSessionDescription {
        RTCSessionDescription {
            sdp_type: RTCSdpType::Answer,
            sdp,
        }
    }

    /// Same type, body capped with `constraint`.
    pub fn with_bandwidth(&self, constraint: &BandwidthConstraint) -> Result<RTCSessionDescription> {
        Ok(RTCSessionDescription {
            sdp_type: self.sdp_type,
            sdp: apply_bandwidth(&self.sdp, constraint)?,
        })
    }

    /// Same type, every `AS`/`TIAS` cap removed from the body.
    pub fn without_bandwidth(&self) -> RTCSessionDescription {
        RTCSessionDescription {
            sdp_type: self.sdp_type,
            sdp: remove_bandwidth(&self.sdp),
        }
    }

    /// The first `AS`/`TIAS` cap in the body, if any.
    pub fn bandwidth(&self) -> Result<Option<BandwidthConstraint>> {
        parse_bandwidth(&self.sdp)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ::sdp::bandwidth::BandwidthModifier;
    use shared::error::Error;

    #[test]
    fn test_session_description_json() {
        let tests = vec![
            (
                RTCSessionDescription {
                    sdp_type: RTCSdpType::Offer,
                    sdp: "sdp".to_owned(),
                },
                r#"{"type":"offer","sdp":"sdp"}"#,
            ),
            (
                RTCSessionDescription {
                    sdp_type: RTCSdpType::Answer,
                    sdp: "sdp".to_owned(),
                },
                r#"{"type":"answer","sdp":"sdp"}"#,
            ),
            (
                RTCSessionDescription {
                    sdp_type: RTCSdpType::Unspecified,
                    sdp: "sdp".to_owned(),
                },
                r#"{"type":"Unspecified","sdp":"sdp"}"#,
            ),
        ];

        for (desc, expected_string) in tests {
            let result = serde_json::to_string(&desc);
            assert!(result.is_ok(), "testCase: marshal err: {result:?}");
            let desc_data = result.unwrap();
            assert_eq!(desc_data, expected_string, "string is not expected");

            let result = serde_json::from_str::<RTCSessionDescription>(&desc_data);
            assert!(result.is_ok(), "testCase: unmarshal err: {result:?}");
            if let Ok(sd) = result {
                assert_eq!(sd, desc);
            }
        }
    }

    #[test]
    fn test_bandwidth_helpers_keep_type() {
        let answer =
            RTCSessionDescription::answer("v=0\r\nc=IN IP4 0.0.0.0\r\nm=video 9 RTP/AVP 96\r\n".to_owned());
        let constraint = BandwidthConstraint::new(BandwidthModifier::Tias, 250_000);

        let capped = answer.with_bandwidth(&constraint).unwrap();
        assert_eq!(capped.sdp_type, RTCSdpType::Answer);
        assert_eq!(capped.bandwidth(), Ok(Some(constraint)));
        // the source value is left as it was
        assert_eq!(answer.bandwidth(), Ok(None));

        let unlimited = capped.without_bandwidth();
        assert_eq!(unlimited, answer);
    }

    #[test]
    fn test_with_bandwidth_malformed() {
        let offer = RTCSessionDescription::offer("v=0\r\nm=video 9 RTP/AVP 96\r\n".to_owned());
        let result = offer.with_bandwidth(&BandwidthConstraint::default());
        assert!(matches!(result, Err(Error::ErrMalformedDescription(_))));
    }
}
