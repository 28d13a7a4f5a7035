//! Bandwidth-constraint (`b=`) rewriting.
//!
//! ```
//! use rtc_sdp::bandwidth::{apply_bandwidth, remove_bandwidth, select_modifier, TransportFamily};
//!
//! let answer = "v=0\r\nc=IN IP4 0.0.0.0\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\n";
//! let constraint = select_modifier(TransportFamily::Chrome, 500);
//!
//! let capped = apply_bandwidth(answer, &constraint).unwrap();
//! assert_eq!(
//!     capped,
//!     "v=0\r\nc=IN IP4 0.0.0.0\r\nb=AS:500\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\n"
//! );
//! assert_eq!(remove_bandwidth(&capped), answer);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use shared::error::{Error, Result};

use crate::lines::{LineEnding, SdpDocument, SdpLine};

pub(crate) const UNSPECIFIED_STR: &str = "Unspecified";

const BANDWIDTH_MODIFIER_AS_STR: &str = "AS";
const BANDWIDTH_MODIFIER_TIAS_STR: &str = "TIAS";

/// Bandwidth modifier of a `b=<modifier>:<value>` line (RFC 4566, RFC 3890).
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BandwidthModifier {
    /// Application specific maximum, in kilobits per second.
    #[default]
    #[serde(rename = "AS")]
    As,
    /// Transport independent application specific maximum, in bits per second.
    #[serde(rename = "TIAS")]
    Tias,
}

impl BandwidthModifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            BandwidthModifier::As => BANDWIDTH_MODIFIER_AS_STR,
            BandwidthModifier::Tias => BANDWIDTH_MODIFIER_TIAS_STR,
        }
    }

    /// `b=AS:` / `b=TIAS:`
    pub fn line_prefix(&self) -> String {
        format!("b={}:", self.as_str())
    }

    fn matches(line: &SdpLine) -> Option<(BandwidthModifier, &str)> {
        [BandwidthModifier::As, BandwidthModifier::Tias]
            .into_iter()
            .find_map(|modifier| {
                line.text
                    .strip_prefix(&modifier.line_prefix())
                    .map(|value| (modifier, value))
            })
    }
}

impl fmt::Display for BandwidthModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const TRANSPORT_FAMILY_CHROME_STR: &str = "chrome";
const TRANSPORT_FAMILY_FIREFOX_STR: &str = "firefox";

/// Transport-stack family of the negotiating endpoint.
///
/// The family decides which modifier a bandwidth cap is written with. It is
/// always supplied by the caller; nothing here inspects the runtime.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportFamily {
    /// Unknown family, capped with `AS` like [`TransportFamily::Chrome`].
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified,
    #[serde(rename = "chrome")]
    Chrome,
    #[serde(rename = "firefox")]
    Firefox,
}

impl From<&str> for TransportFamily {
    fn from(raw: &str) -> Self {
        match raw {
            TRANSPORT_FAMILY_CHROME_STR => TransportFamily::Chrome,
            TRANSPORT_FAMILY_FIREFOX_STR => TransportFamily::Firefox,
            _ => TransportFamily::Unspecified,
        }
    }
}

impl fmt::Display for TransportFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            TransportFamily::Chrome => TRANSPORT_FAMILY_CHROME_STR,
            TransportFamily::Firefox => TRANSPORT_FAMILY_FIREFOX_STR,
            TransportFamily::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// A modifier together with the value written on the line, already in the
/// unit of that modifier (kbps for `AS`, bps for `TIAS`).
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthConstraint {
    pub modifier: BandwidthModifier,
    pub value: u64,
}

impl BandwidthConstraint {
    pub fn new(modifier: BandwidthModifier, value: u64) -> Self {
        BandwidthConstraint { modifier, value }
    }

    /// Text of the `b=` line without terminator.
    pub fn line(&self) -> String {
        format!("{}{}", self.modifier.line_prefix(), self.value)
    }
}

impl fmt::Display for BandwidthConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.modifier, self.value)
    }
}

/// Maps a requested cap in kbps to the constraint a family understands.
pub fn select_modifier(family: TransportFamily, requested_kbps: u32) -> BandwidthConstraint {
    match family {
        TransportFamily::Firefox => {
            BandwidthConstraint::new(BandwidthModifier::Tias, u64::from(requested_kbps) * 1000)
        }
        TransportFamily::Chrome | TransportFamily::Unspecified => {
            BandwidthConstraint::new(BandwidthModifier::As, u64::from(requested_kbps))
        }
    }
}

/// Writes `constraint` into `body`.
///
/// The first existing `b=<modifier>:` line gets the new value. Without one,
/// a new line is inserted right after the first `c=IN` connection line,
/// ending like the nearest earlier terminated line (`\r\n` when the body has
/// none). Nothing else in the body moves.
///
/// A body without a connection line is rejected with
/// [`Error::ErrMalformedDescription`].
pub fn apply_bandwidth(body: &str, constraint: &BandwidthConstraint) -> Result<String> {
    let mut doc = SdpDocument::parse(body);

    let connection = doc.position(SdpLine::is_connection).ok_or_else(|| {
        Error::ErrMalformedDescription("no c=IN connection line".to_owned())
    })?;

    let prefix = constraint.modifier.line_prefix();
    if let Some(at) = doc.position(|line| line.text.starts_with(&prefix)) {
        if let Some(line) = doc.line_mut(at) {
            line.text = constraint.line();
        }
    } else if !doc.insert_after(connection, SdpLine::new(constraint.line(), LineEnding::Crlf)) {
        return Err(Error::ErrMalformedDescription(
            "connection line out of range".to_owned(),
        ));
    }

    Ok(doc.marshal())
}

/// Strips every `b=AS:` and `b=TIAS:` line from `body`.
pub fn remove_bandwidth(body: &str) -> String {
    let mut doc = SdpDocument::parse(body);
    if doc.retain(|line| BandwidthModifier::matches(line).is_none()) == 0 {
        return body.to_owned();
    }
    doc.marshal()
}

/// Reads the first `b=AS:` or `b=TIAS:` line of `body`, if any.
pub fn parse_bandwidth(body: &str) -> Result<Option<BandwidthConstraint>> {
    let doc = SdpDocument::parse(body);
    for line in doc.lines() {
        if let Some((modifier, value)) = BandwidthModifier::matches(line) {
            let value = value.trim().parse::<u64>()?;
            return Ok(Some(BandwidthConstraint::new(modifier, value)));
        }
    }
    Ok(None)
}
