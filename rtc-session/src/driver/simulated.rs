//! In-process loopback transport.
//!
//! Fabricates plausible session descriptions, trickles host candidates after
//! every first local description, and reports both endpoints open once the
//! offerer has applied the answer. Data channel messages are delivered to the
//! peer as soon as they are sent. Faults can be injected per operation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use ::sdp::SdpDocument;
use bytes::Bytes;
use rand::Rng;
use shared::error::{Error, Result};

use super::Transport;
use crate::configuration::{MediaKind, RTCDataChannelInit, RTCOfferOptions};
use crate::endpoint::EndpointId;
use crate::sdp::{RTCSdpType, RTCSessionDescription};
use crate::state::EndpointState;
use crate::transport::{RTCIceCandidateInit, TransportNotification, TransportOpKind};

pub const DEFAULT_CANDIDATES_PER_ENDPOINT: usize = 2;

#[derive(Default, Debug)]
struct SimulatedEndpoint {
    media: MediaKind,
    data_channel: Option<RTCDataChannelInit>,
    local: Option<RTCSessionDescription>,
    remote: Option<RTCSessionDescription>,
    gathered: bool,
    closed: bool,
    remote_candidates: Vec<Option<RTCIceCandidateInit>>,
    tones: Vec<char>,
    bytes_sent: usize,
    bytes_received: usize,
}

#[derive(Debug)]
pub struct SimulatedTransport {
    session_id: u64,
    version: u64,
    candidates_per_endpoint: usize,
    endpoints: HashMap<EndpointId, SimulatedEndpoint>,
    failures: HashMap<TransportOpKind, VecDeque<Error>>,
    reject_candidates: bool,
    connected: bool,
    notifications: VecDeque<TransportNotification>,
    history: Vec<(EndpointId, TransportOpKind)>,
    foundations: HashSet<u32>,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        SimulatedTransport {
            session_id: rand::rng().random_range(1..i64::MAX as u64),
            version: 1,
            candidates_per_endpoint: DEFAULT_CANDIDATES_PER_ENDPOINT,
            endpoints: HashMap::new(),
            failures: HashMap::new(),
            reject_candidates: false,
            connected: false,
            notifications: VecDeque::new(),
            history: vec![],
            foundations: HashSet::new(),
        }
    }
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host candidates each endpoint trickles before its end-of-candidates.
    pub fn with_candidates(mut self, candidates_per_endpoint: usize) -> Self {
        self.candidates_per_endpoint = candidates_per_endpoint;
        self
    }

    /// Fails the next `kind` operation, on either endpoint, with `err`.
    pub fn fail_next(&mut self, kind: TransportOpKind, err: Error) {
        self.failures.entry(kind).or_default().push_back(err);
    }

    pub fn reject_candidates(&mut self, reject: bool) {
        self.reject_candidates = reject;
    }

    pub fn history(&self) -> &[(EndpointId, TransportOpKind)] {
        &self.history
    }

    pub fn local_description(&self, endpoint: EndpointId) -> Option<&RTCSessionDescription> {
        self.endpoints.get(&endpoint).and_then(|e| e.local.as_ref())
    }

    pub fn remote_description(&self, endpoint: EndpointId) -> Option<&RTCSessionDescription> {
        self.endpoints.get(&endpoint).and_then(|e| e.remote.as_ref())
    }

    pub fn remote_candidates(&self, endpoint: EndpointId) -> &[Option<RTCIceCandidateInit>] {
        self.endpoints
            .get(&endpoint)
            .map(|e| e.remote_candidates.as_slice())
            .unwrap_or_default()
    }

    pub fn tones(&self, endpoint: EndpointId) -> String {
        self.endpoints
            .get(&endpoint)
            .map(|e| e.tones.iter().collect())
            .unwrap_or_default()
    }

    pub fn data_channel(&self, endpoint: EndpointId) -> Option<&RTCDataChannelInit> {
        self.endpoints
            .get(&endpoint)
            .and_then(|e| e.data_channel.as_ref())
    }

    /// Bytes the endpoint sent on its data channel.
    pub fn bytes_sent(&self, endpoint: EndpointId) -> usize {
        self.endpoints.get(&endpoint).map_or(0, |e| e.bytes_sent)
    }

    /// Bytes delivered to the endpoint by its peer's data channel.
    pub fn bytes_received(&self, endpoint: EndpointId) -> usize {
        self.endpoints.get(&endpoint).map_or(0, |e| e.bytes_received)
    }

    pub fn is_closed(&self, endpoint: EndpointId) -> bool {
        self.endpoints.get(&endpoint).is_some_and(|e| e.closed)
    }

    fn begin(&mut self, endpoint: EndpointId, kind: TransportOpKind) -> Result<&mut SimulatedEndpoint> {
        self.history.push((endpoint, kind));
        if let Some(err) = self.failures.get_mut(&kind).and_then(|q| q.pop_front()) {
            log::debug!("{endpoint} {kind}: injected failure {err}");
            return Err(err);
        }

        let state = self.endpoints.entry(endpoint).or_default();
        if state.closed {
            Err(Error::ErrEndpointClosed)
        } else {
            Ok(state)
        }
    }

    fn next_foundation(&mut self) -> u32 {
        let mut rng = rand::rng();
        loop {
            let foundation = rng.random_range(1..u32::MAX);
            if self.foundations.insert(foundation) {
                return foundation;
            }
        }
    }

    fn gather(&mut self, endpoint: EndpointId) {
        let mut rng = rand::rng();
        for _ in 0..self.candidates_per_endpoint {
            let foundation = self.next_foundation();
            let port = rng.random_range(49152..=65535);
            self.notifications
                .push_back(TransportNotification::IceCandidate {
                    endpoint,
                    candidate: Some(RTCIceCandidateInit::host(foundation, "127.0.0.1", port)),
                });
        }
        self.notifications
            .push_back(TransportNotification::IceCandidate {
                endpoint,
                candidate: None,
            });
    }

    fn description(&mut self, sdp_type: RTCSdpType, sections: &[&str]) -> RTCSessionDescription {
        let mut lines = vec![
            "v=0".to_owned(),
            format!("o=- {} {} IN IP4 127.0.0.1", self.session_id, self.version),
            "s=-".to_owned(),
            "t=0 0".to_owned(),
        ];
        if !sections.is_empty() {
            let mids: Vec<String> = (0..sections.len()).map(|i| i.to_string()).collect();
            lines.push(format!("a=group:BUNDLE {}", mids.join(" ")));
        }

        let setup = match sdp_type {
            RTCSdpType::Answer => "active",
            _ => "actpass",
        };
        for (mid, kind) in sections.iter().enumerate() {
            let (m_line, attributes): (&str, &[&str]) = match *kind {
                "audio" => (
                    "m=audio 9 UDP/TLS/RTP/SAVPF 111 126",
                    &["a=rtpmap:111 opus/48000/2", "a=rtpmap:126 telephone-event/8000"][..],
                ),
                "video" => ("m=video 9 UDP/TLS/RTP/SAVPF 96", &["a=rtpmap:96 VP8/90000"][..]),
                _ => (
                    "m=application 9 UDP/DTLS/SCTP webrtc-datachannel",
                    &["a=sctp-port:5000"][..],
                ),
            };
            lines.push(m_line.to_owned());
            lines.push("c=IN IP4 0.0.0.0".to_owned());
            lines.push(format!("a=mid:{mid}"));
            lines.push(format!("a=setup:{setup}"));
            lines.extend(attributes.iter().map(|a| (*a).to_owned()));
        }

        self.version += 1;
        let mut sdp = lines.join("\r\n");
        sdp.push_str("\r\n");
        RTCSessionDescription { sdp_type, sdp }
    }
}

impl Transport for SimulatedTransport {
    async fn acquire_media(
        &mut self,
        endpoint: EndpointId,
        media: MediaKind,
        data_channel: Option<RTCDataChannelInit>,
    ) -> Result<()> {
        let state = self.begin(endpoint, TransportOpKind::AcquireMedia)?;
        state.media = media;
        state.data_channel = data_channel;
        Ok(())
    }

    async fn create_offer(
        &mut self,
        endpoint: EndpointId,
        options: RTCOfferOptions,
    ) -> Result<RTCSessionDescription> {
        let state = self.begin(endpoint, TransportOpKind::CreateOffer)?;
        let mut sections = vec![];
        if state.media.has_audio() || options.offer_to_receive_audio {
            sections.push("audio");
        }
        if state.media.has_video() || options.offer_to_receive_video {
            sections.push("video");
        }
        if state.data_channel.is_some() {
            sections.push("application");
        }
        Ok(self.description(RTCSdpType::Offer, &sections))
    }

    async fn create_answer(&mut self, endpoint: EndpointId) -> Result<RTCSessionDescription> {
        let state = self.begin(endpoint, TransportOpKind::CreateAnswer)?;
        let offer = match &state.remote {
            Some(remote) if remote.sdp_type == RTCSdpType::Offer => remote.sdp.clone(),
            _ => {
                return Err(Error::ErrDescriptionCreationFailed(
                    "no remote offer to answer".to_owned(),
                ));
            }
        };

        let document = SdpDocument::parse(&offer);
        let kinds: Vec<String> = document
            .media_sections()
            .filter_map(|section| section.media_kind().map(str::to_owned))
            .collect();
        let sections: Vec<&str> = kinds.iter().map(String::as_str).collect();
        Ok(self.description(RTCSdpType::Answer, &sections))
    }

    async fn set_local_description(
        &mut self,
        endpoint: EndpointId,
        description: RTCSessionDescription,
    ) -> Result<()> {
        let state = self.begin(endpoint, TransportOpKind::SetLocalDescription)?;
        state.local = Some(description);
        let first = !state.gathered;
        state.gathered = true;
        if first {
            self.gather(endpoint);
        }
        Ok(())
    }

    async fn set_remote_description(
        &mut self,
        endpoint: EndpointId,
        description: RTCSessionDescription,
    ) -> Result<()> {
        let state = self.begin(endpoint, TransportOpKind::SetRemoteDescription)?;
        let answered = description.sdp_type == RTCSdpType::Answer;
        state.remote = Some(description);

        if answered && !self.connected {
            self.connected = true;
            for endpoint in [EndpointId::Offerer, EndpointId::Answerer] {
                self.notifications
                    .push_back(TransportNotification::StateChange {
                        endpoint,
                        state: EndpointState::Open,
                    });
            }
        }
        Ok(())
    }

    async fn add_remote_candidate(
        &mut self,
        endpoint: EndpointId,
        candidate: Option<RTCIceCandidateInit>,
    ) -> Result<()> {
        let reject = self.reject_candidates;
        let state = self.begin(endpoint, TransportOpKind::AddRemoteCandidate)?;
        if reject {
            return Err(Error::ErrCandidateRejected(
                candidate.map(|c| c.candidate).unwrap_or_default(),
            ));
        }
        if state.remote.is_none() {
            return Err(Error::ErrCandidateRejected(
                "remote description not set".to_owned(),
            ));
        }
        state.remote_candidates.push(candidate);
        Ok(())
    }

    async fn insert_tone(&mut self, endpoint: EndpointId, tone: char, _duration: Duration) -> Result<()> {
        let state = self.begin(endpoint, TransportOpKind::InsertTone)?;
        if !state.media.has_audio() {
            return Err(Error::ErrDtmfUnavailable);
        }
        state.tones.push(tone);
        Ok(())
    }

    async fn send_data(&mut self, endpoint: EndpointId, data: Bytes) -> Result<()> {
        let connected = self.connected;
        let state = self.begin(endpoint, TransportOpKind::SendData)?;
        if state.data_channel.is_none() || !connected {
            return Err(Error::ErrDataChannelUnavailable);
        }

        let peer = endpoint.peer();
        if self.is_closed(peer) {
            return Err(Error::ErrEndpointClosed);
        }
        if let Some(state) = self.endpoints.get_mut(&endpoint) {
            state.bytes_sent += data.len();
        }
        self.endpoints.entry(peer).or_default().bytes_received += data.len();
        self.notifications
            .push_back(TransportNotification::DataReceived {
                endpoint: peer,
                data,
            });
        Ok(())
    }

    async fn close(&mut self, endpoint: EndpointId) -> Result<()> {
        let state = self.begin(endpoint, TransportOpKind::Close)?;
        state.closed = true;
        state.remote_candidates.clear();
        self.notifications
            .push_back(TransportNotification::StateChange {
                endpoint,
                state: EndpointState::Closed,
            });
        Ok(())
    }

    fn poll_notification(&mut self) -> Option<TransportNotification> {
        self.notifications.pop_front()
    }
}
