//! Call configuration.
//!
//! A [`CallConfiguration`] describes one loopback call: the labels used to
//! attribute traces to each endpoint, which local media the offering
//! endpoint captures, an optional data channel, the transport-stack family
//! that decides how bandwidth caps are written, and the cap to apply once the
//! call is established.
//!
//! ```
//! use rtc_session::configuration::{
//!     BandwidthLimit, CallConfigurationBuilder, MediaKind, TransportFamily,
//! };
//!
//! let config = CallConfigurationBuilder::new()
//!     .with_media(MediaKind::Video)
//!     .with_transport_family(TransportFamily::Firefox)
//!     .with_bandwidth_limit(BandwidthLimit::Kbps(500))
//!     .build();
//!
//! assert_eq!(config.offerer_label, "pc1");
//! assert_eq!(config.bandwidth_limit, BandwidthLimit::Kbps(500));
//! ```

pub mod offer_answer_options;

use std::fmt;
use std::str::FromStr;

use ::sdp::bandwidth::{BandwidthConstraint, select_modifier};
use serde::{Deserialize, Serialize};
use shared::error::Error;

use crate::endpoint::{EndpointConfig, EndpointId};

pub use ::sdp::bandwidth::TransportFamily;
pub use offer_answer_options::RTCOfferOptions;

pub(crate) const UNSPECIFIED_STR: &str = "Unspecified";

pub const DEFAULT_OFFERER_LABEL: &str = "pc1";
pub const DEFAULT_ANSWERER_LABEL: &str = "pc2";
pub const DEFAULT_DATA_CHANNEL_LABEL: &str = "sendDataChannel";

/// Local media the offering endpoint captures and sends.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    None,
    Audio,
    Video,
    Both,
}

const MEDIA_KIND_NONE_STR: &str = "none";
const MEDIA_KIND_AUDIO_STR: &str = "audio";
const MEDIA_KIND_VIDEO_STR: &str = "video";
const MEDIA_KIND_BOTH_STR: &str = "both";

impl MediaKind {
    pub fn has_audio(&self) -> bool {
        matches!(self, MediaKind::Audio | MediaKind::Both)
    }

    pub fn has_video(&self) -> bool {
        matches!(self, MediaKind::Video | MediaKind::Both)
    }
}

impl From<&str> for MediaKind {
    fn from(raw: &str) -> Self {
        match raw {
            MEDIA_KIND_AUDIO_STR => MediaKind::Audio,
            MEDIA_KIND_VIDEO_STR => MediaKind::Video,
            MEDIA_KIND_BOTH_STR => MediaKind::Both,
            _ => MediaKind::None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            MediaKind::None => MEDIA_KIND_NONE_STR,
            MediaKind::Audio => MEDIA_KIND_AUDIO_STR,
            MediaKind::Video => MEDIA_KIND_VIDEO_STR,
            MediaKind::Both => MEDIA_KIND_BOTH_STR,
        };
        write!(f, "{s}")
    }
}

/// Options of the data channel the offering endpoint opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RTCDataChannelInit {
    pub label: String,
    /// In-order delivery when true, unordered otherwise.
    pub ordered: bool,
}

impl Default for RTCDataChannelInit {
    fn default() -> Self {
        RTCDataChannelInit {
            label: DEFAULT_DATA_CHANNEL_LABEL.to_owned(),
            ordered: true,
        }
    }
}

/// Bandwidth cap requested by the caller, before it is mapped to a
/// modifier for a particular transport family.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandwidthLimit {
    #[default]
    Unlimited,
    Kbps(u32),
}

const BANDWIDTH_LIMIT_UNLIMITED_STR: &str = "unlimited";

impl BandwidthLimit {
    /// The constraint line a `family` endpoint is capped with, `None` when unlimited.
    pub fn constraint(&self, family: TransportFamily) -> Option<BandwidthConstraint> {
        match *self {
            BandwidthLimit::Unlimited => None,
            BandwidthLimit::Kbps(kbps) => Some(select_modifier(family, kbps)),
        }
    }
}

impl FromStr for BandwidthLimit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case(BANDWIDTH_LIMIT_UNLIMITED_STR) {
            Ok(BandwidthLimit::Unlimited)
        } else {
            Ok(BandwidthLimit::Kbps(s.trim().parse()?))
        }
    }
}

impl fmt::Display for BandwidthLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            BandwidthLimit::Unlimited => write!(f, "{BANDWIDTH_LIMIT_UNLIMITED_STR}"),
            BandwidthLimit::Kbps(kbps) => write!(f, "{kbps} kbps"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CallConfiguration {
    pub offerer_label: String,
    pub answerer_label: String,
    pub media: MediaKind,
    pub data_channel: Option<RTCDataChannelInit>,
    pub transport_family: TransportFamily,
    /// Cap applied to the answer before the offerer receives it.
    pub bandwidth_limit: BandwidthLimit,
}

impl Default for CallConfiguration {
    fn default() -> Self {
        CallConfiguration {
            offerer_label: DEFAULT_OFFERER_LABEL.to_owned(),
            answerer_label: DEFAULT_ANSWERER_LABEL.to_owned(),
            media: MediaKind::default(),
            data_channel: None,
            transport_family: TransportFamily::default(),
            bandwidth_limit: BandwidthLimit::default(),
        }
    }
}

impl CallConfiguration {
    /// Per-endpoint view of the call. Only the offerer captures media and
    /// opens the data channel; the answerer receives them.
    pub fn endpoint_config(&self, id: EndpointId) -> EndpointConfig {
        match id {
            EndpointId::Offerer => EndpointConfig {
                label: self.offerer_label.clone(),
                ordered: self.data_channel.as_ref().is_none_or(|dc| dc.ordered),
                transport_family: self.transport_family,
                media: self.media,
                data_channel: self.data_channel.clone(),
            },
            EndpointId::Answerer => EndpointConfig {
                label: self.answerer_label.clone(),
                ordered: self.data_channel.as_ref().is_none_or(|dc| dc.ordered),
                transport_family: self.transport_family,
                media: MediaKind::None,
                data_channel: None,
            },
        }
    }
}

#[derive(Default)]
pub struct CallConfigurationBuilder {
    config: CallConfiguration,
}

impl CallConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offerer_label(mut self, label: impl Into<String>) -> Self {
        self.config.offerer_label = label.into();
        self
    }

    pub fn with_answerer_label(mut self, label: impl Into<String>) -> Self {
        self.config.answerer_label = label.into();
        self
    }

    pub fn with_media(mut self, media: MediaKind) -> Self {
        self.config.media = media;
        self
    }

    /// Opens a data channel named `label`, keeping an ordering already chosen
    /// with [`Self::with_ordered`].
    pub fn with_data_channel(mut self, label: impl Into<String>) -> Self {
        let ordered = self.config.data_channel.as_ref().is_none_or(|dc| dc.ordered);
        self.config.data_channel = Some(RTCDataChannelInit {
            label: label.into(),
            ordered,
        });
        self
    }

    /// Delivery semantics of the data channel; opens the default channel if
    /// none was configured yet.
    pub fn with_ordered(mut self, ordered: bool) -> Self {
        self.config
            .data_channel
            .get_or_insert_with(RTCDataChannelInit::default)
            .ordered = ordered;
        self
    }

    pub fn with_transport_family(mut self, family: TransportFamily) -> Self {
        self.config.transport_family = family;
        self
    }

    pub fn with_bandwidth_limit(mut self, limit: BandwidthLimit) -> Self {
        self.config.bandwidth_limit = limit;
        self
    }

    pub fn build(self) -> CallConfiguration {
        self.config
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ::sdp::bandwidth::BandwidthModifier;

    #[test]
    fn test_bandwidth_limit_from_str() {
        let tests = vec![
            ("unlimited", Ok(BandwidthLimit::Unlimited)),
            ("Unlimited", Ok(BandwidthLimit::Unlimited)),
            ("500", Ok(BandwidthLimit::Kbps(500))),
            (" 0 ", Ok(BandwidthLimit::Kbps(0))),
        ];

        for (raw, expected) in tests {
            assert_eq!(raw.parse::<BandwidthLimit>(), expected, "testCase: {raw}");
        }
        assert!(matches!(
            "fast".parse::<BandwidthLimit>(),
            Err(Error::ParseInt(_))
        ));
    }

    #[test]
    fn test_bandwidth_limit_constraint() {
        assert_eq!(
            BandwidthLimit::Unlimited.constraint(TransportFamily::Chrome),
            None
        );
        assert_eq!(
            BandwidthLimit::Kbps(500).constraint(TransportFamily::Firefox),
            Some(BandwidthConstraint::new(BandwidthModifier::Tias, 500_000))
        );
    }

    #[test]
    fn test_builder_data_channel_ordering() {
        let config = CallConfigurationBuilder::new().with_ordered(false).build();
        assert_eq!(
            config.data_channel,
            Some(RTCDataChannelInit {
                label: DEFAULT_DATA_CHANNEL_LABEL.to_owned(),
                ordered: false,
            })
        );

        let config = CallConfigurationBuilder::new()
            .with_ordered(false)
            .with_data_channel("chat")
            .build();
        assert_eq!(
            config.data_channel,
            Some(RTCDataChannelInit {
                label: "chat".to_owned(),
                ordered: false,
            })
        );
    }

    #[test]
    fn test_endpoint_config() {
        let config = CallConfigurationBuilder::new()
            .with_media(MediaKind::Audio)
            .with_ordered(false)
            .with_transport_family(TransportFamily::Firefox)
            .build();

        let offerer = config.endpoint_config(EndpointId::Offerer);
        assert_eq!(offerer.label, "pc1");
        assert_eq!(offerer.media, MediaKind::Audio);
        assert!(!offerer.ordered);
        assert!(offerer.data_channel.is_some());

        let answerer = config.endpoint_config(EndpointId::Answerer);
        assert_eq!(answerer.label, "pc2");
        assert_eq!(answerer.media, MediaKind::None);
        assert_eq!(answerer.transport_family, TransportFamily::Firefox);
        assert!(answerer.data_channel.is_none());
    }

    #[test]
    fn test_call_configuration_json() {
        let json = r#"{
            "offererLabel": "localConnection",
            "media": "video",
            "dataChannel": { "label": "sendDataChannel", "ordered": false },
            "transportFamily": "firefox",
            "bandwidthLimit": { "kbps": 250 }
        }"#;

        let config: CallConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.offerer_label, "localConnection");
        assert_eq!(config.answerer_label, DEFAULT_ANSWERER_LABEL);
        assert_eq!(config.media, MediaKind::Video);
        assert_eq!(config.transport_family, TransportFamily::Firefox);
        assert_eq!(config.bandwidth_limit, BandwidthLimit::Kbps(250));
        assert_eq!(config.data_channel.map(|dc| dc.ordered), Some(false));

        let config: CallConfiguration =
            serde_json::from_str(r#"{ "bandwidthLimit": "unlimited" }"#).unwrap();
        assert_eq!(config, CallConfiguration::default());
    }
}
