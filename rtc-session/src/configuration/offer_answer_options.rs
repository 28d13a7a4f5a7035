use super::MediaKind;

/// Options passed to the transport when an offer is created.
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone)]
pub struct RTCOfferOptions {
    pub offer_to_receive_audio: bool,
    pub offer_to_receive_video: bool,
}

impl From<MediaKind> for RTCOfferOptions {
    fn from(media: MediaKind) -> Self {
        RTCOfferOptions {
            offer_to_receive_audio: media.has_audio(),
            offer_to_receive_video: media.has_video(),
        }
    }
}
