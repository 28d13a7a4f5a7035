//! Two-endpoint offer/answer negotiation.
//!
//! [`NegotiationSession`] is a sans-I/O state machine. It never touches a
//! network or a media stack: every action it needs from the endpoints is
//! emitted as a [`TransportCommand`] from `poll_write`, and the outcome comes
//! back through `handle_read` as a [`TransportReply`] with the same
//! [`TransactionId`](crate::transport::TransactionId). Trickled candidates and
//! endpoint state changes enter through `handle_event`.
//!
//! # Call flow
//!
//! ```text
//!  offerer (A)                      answerer (B)
//!  acquireMedia
//!  createOffer
//!  setLocalDescription(offer)
//!                                   setRemoteDescription(offer)
//!                                   createAnswer
//!                                   setLocalDescription(answer)
//!  setRemoteDescription(answer')    answer' = answer with the bandwidth cap
//! ```
//!
//! Exactly one step is outstanding at a time. A failed step moves the session
//! to [`NegotiationState::NegotiationFailed`], from where
//! [`NegotiationSession::retry`] re-issues it.
//!
//! # Renegotiation
//!
//! Once established, [`NegotiationSession::renegotiate`] changes the
//! bandwidth cap: the offerer creates and applies a new offer, then has its
//! current remote description re-applied with the new cap. The answerer is
//! not involved. The previous cap stays in effect until the round completes,
//! and a failed round leaves the call established with the previous cap.

mod step;

use std::time::{Duration, Instant};

use bytes::Bytes;
use shared::error::{Error, Result};

use crate::configuration::{BandwidthLimit, CallConfiguration, RTCOfferOptions};
use crate::dtmf::RTCDtmfSender;
use crate::endpoint::{Endpoint, EndpointId, EndpointLifecycle, OnStateChangeHdlrFn};
use crate::event::RTCSessionEvent;
use crate::relay::{CandidateRelay, RelayStats};
use crate::sdp::{RTCSdpType, RTCSessionDescription};
use crate::state::signaling_state::next_signaling_state;
use crate::state::{EndpointState, NegotiationState, RTCSignalingState, StateChangeOp};
use crate::transfer::DataTransfer;
use crate::transport::outbox::Outbox;
use crate::transport::{
    TransportCommand, TransportNotification, TransportOp, TransportOutput, TransportReply,
};
use step::{NegotiationStep, PendingStep, Renegotiation};

/// Application requests accepted by `handle_write`.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionRequest {
    StartCall(CallConfiguration),
    Renegotiate(BandwidthLimit),
    Retry,
    InsertDtmf {
        tones: String,
        duration: Duration,
        gap: Duration,
    },
    /// Send this many bytes over the offerer's data channel.
    SendData(usize),
    Hangup,
}

#[derive(Default)]
pub struct NegotiationSession {
    state: NegotiationState,
    config: CallConfiguration,
    endpoints: EndpointLifecycle,
    relay: CandidateRelay,
    pending: Option<PendingStep>,
    failed: Option<NegotiationStep>,
    bandwidth_limit: BandwidthLimit,
    dtmf: Option<RTCDtmfSender>,
    transfer: Option<DataTransfer>,
    outbox: Outbox,
}

impl NegotiationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// The cap the offerer is currently honoring.
    pub fn bandwidth_limit(&self) -> BandwidthLimit {
        self.bandwidth_limit
    }

    pub fn configuration(&self) -> &CallConfiguration {
        &self.config
    }

    pub fn endpoint(&self, id: EndpointId) -> Result<&Endpoint> {
        self.endpoints.get(id)
    }

    pub fn endpoints(&self) -> &EndpointLifecycle {
        &self.endpoints
    }

    pub fn observe_state_change(&mut self, id: EndpointId, f: OnStateChangeHdlrFn) -> Result<()> {
        self.endpoints.observe_state_change(id, f)
    }

    /// Delivery counters of the candidates discovered by `source`.
    pub fn relay_stats(&self, source: EndpointId) -> RelayStats {
        self.relay.stats(source)
    }

    pub fn dtmf_sender(&self) -> Option<&RTCDtmfSender> {
        self.dtmf.as_ref()
    }

    pub fn data_transfer(&self) -> Option<&DataTransfer> {
        self.transfer.as_ref()
    }

    /// Creates both endpoints and starts the offer/answer exchange.
    pub fn start_call(&mut self, config: CallConfiguration) -> Result<()> {
        match self.state {
            NegotiationState::Idle => {}
            NegotiationState::Closed => return Err(Error::ErrSessionClosed),
            state => return Err(Error::ErrInvalidNegotiationState(state.to_string())),
        }

        log::info!(
            "Starting call {} -> {}",
            config.offerer_label,
            config.answerer_label
        );
        self.endpoints
            .create(config.endpoint_config(EndpointId::Offerer))?;
        self.endpoints
            .create(config.endpoint_config(EndpointId::Answerer))?;
        self.config = config;

        self.issue(NegotiationStep::AcquireMedia)
    }

    /// Changes the bandwidth cap of an established call.
    ///
    /// The rewritten remote description is built before anything is sent, so
    /// a description the cap cannot be applied to fails here and leaves the
    /// call untouched.
    pub fn renegotiate(&mut self, limit: BandwidthLimit) -> Result<()> {
        match self.state {
            NegotiationState::Established => {}
            NegotiationState::Offering
            | NegotiationState::Answering
            | NegotiationState::Renegotiating => return Err(Error::ErrRenegotiationInProgress),
            NegotiationState::Closed => return Err(Error::ErrSessionClosed),
            state => return Err(Error::ErrInvalidNegotiationState(state.to_string())),
        }

        let offerer = self.endpoints.get(EndpointId::Offerer)?;
        let current = offerer
            .remote_description()
            .ok_or(Error::ErrNoRemoteDescription)?;
        let remote = match limit.constraint(offerer.config().transport_family) {
            Some(constraint) => current.with_bandwidth(&constraint)?,
            None => current.without_bandwidth(),
        };

        log::info!("Renegotiating bandwidth: {} -> {limit}", self.bandwidth_limit);
        self.issue(NegotiationStep::RenegotiateCreateOffer(Renegotiation {
            limit,
            remote,
        }))
    }

    /// Re-issues the step that failed the initial handshake.
    pub fn retry(&mut self) -> Result<()> {
        match self.state {
            NegotiationState::NegotiationFailed => {}
            NegotiationState::Closed => return Err(Error::ErrSessionClosed),
            state => return Err(Error::ErrInvalidNegotiationState(state.to_string())),
        }
        let step = self
            .failed
            .take()
            .ok_or_else(|| Error::ErrInvalidNegotiationState(self.state.to_string()))?;

        log::info!("Retrying {step}");
        if let Err(err) = self.issue(step.clone()) {
            self.failed = Some(step);
            return Err(err);
        }
        Ok(())
    }

    /// Queues DTMF tones on the offerer's audio sender.
    pub fn insert_dtmf(&mut self, tones: &str, duration: Duration, gap: Duration) -> Result<()> {
        if self.endpoints.get(EndpointId::Offerer).is_err() {
            return Err(Error::ErrDtmfUnavailable);
        }
        let dtmf = self.dtmf.as_mut().ok_or(Error::ErrDtmfUnavailable)?;
        dtmf.insert_dtmf(tones, duration, gap, Instant::now())?;
        log::info!("Inserting DTMF tones: {tones}");
        Ok(())
    }

    /// Streams `total` bytes from the offerer's data channel to the answerer.
    ///
    /// The call is hung up once the answerer has received all of it.
    pub fn send_data(&mut self, total: usize) -> Result<()> {
        self.start_transfer(DataTransfer::new(total)?)
    }

    /// Like [`NegotiationSession::send_data`], with a prepared transfer.
    pub fn start_transfer(&mut self, transfer: DataTransfer) -> Result<()> {
        match self.state {
            state if state.is_established() => {}
            NegotiationState::Closed => return Err(Error::ErrSessionClosed),
            state => return Err(Error::ErrInvalidNegotiationState(state.to_string())),
        }
        if self.config.data_channel.is_none() {
            return Err(Error::ErrDataChannelUnavailable);
        }
        if self
            .transfer
            .as_ref()
            .is_some_and(|transfer| !transfer.progress().is_complete())
        {
            return Err(Error::ErrTransferInProgress);
        }

        log::info!(
            "Sending {} bytes in chunks of {}",
            transfer.progress().total,
            transfer.chunk_size()
        );
        self.transfer = Some(transfer);
        self.send_next_chunk();
        Ok(())
    }

    fn send_next_chunk(&mut self) {
        let Some(transfer) = self.transfer.as_mut() else {
            return;
        };
        if let Some(chunk) = transfer.next_chunk() {
            let len = chunk.len();
            let transaction_id = self
                .outbox
                .command(EndpointId::Offerer, TransportOp::SendData(chunk));
            transfer.chunk_issued(transaction_id, len);
        }
    }

    fn handle_chunk_reply(&mut self, result: Result<()>) {
        let Some(transfer) = self.transfer.as_mut() else {
            return;
        };
        match transfer.chunk_done(result) {
            Ok(len) => {
                log::trace!("Sent {len} bytes, {:?}", transfer.progress());
                self.send_next_chunk();
            }
            Err(err) => {
                log::warn!("Failed to send data: {err}");
                self.transfer = None;
                self.outbox.event(RTCSessionEvent::OnTransferFailed(err));
            }
        }
    }

    fn handle_data_received(&mut self, endpoint: EndpointId, data: Bytes) -> Result<()> {
        let Some(transfer) = self.transfer.as_mut() else {
            log::debug!("{endpoint} received {} bytes outside a transfer", data.len());
            return Ok(());
        };
        if endpoint != EndpointId::Answerer {
            log::debug!("{endpoint} received {} bytes, not counted", data.len());
            return Ok(());
        }

        let complete = transfer.on_received(data.len());
        let progress = transfer.progress();
        self.outbox
            .event(RTCSessionEvent::OnTransferProgress(progress));
        if complete {
            log::info!("Received {} bytes, closing data channels", progress.total);
            self.outbox
                .event(RTCSessionEvent::OnTransferComplete(progress));
            self.hangup()?;
        }
        Ok(())
    }

    /// Closes both endpoints and abandons anything in flight. Calling it
    /// again is a no-op.
    pub fn hangup(&mut self) -> Result<()> {
        if self.state == NegotiationState::Closed {
            return Ok(());
        }

        log::info!("Ending call");
        self.pending = None;
        self.failed = None;
        self.dtmf = None;
        self.transfer = None;
        self.relay.reset();
        self.outbox.commands.clear();

        for id in [EndpointId::Offerer, EndpointId::Answerer] {
            if self.endpoints.get(id).is_ok() {
                self.outbox.command(id, TransportOp::Close);
            }
        }
        for id in self.endpoints.close_all() {
            self.outbox.event(RTCSessionEvent::OnSignalingStateChange(
                id,
                RTCSignalingState::Closed,
            ));
            self.outbox
                .event(RTCSessionEvent::OnEndpointStateChange(id, EndpointState::Closed));
        }

        self.set_state(NegotiationState::Closed);
        Ok(())
    }

    fn set_state(&mut self, state: NegotiationState) {
        if self.state != state {
            log::debug!("negotiation state changed: {} -> {state}", self.state);
            self.state = state;
            self.outbox
                .event(RTCSessionEvent::OnNegotiationStateChange(state));
        }
    }

    fn transport_op(&self, step: &NegotiationStep) -> Result<TransportOp> {
        Ok(match step {
            NegotiationStep::AcquireMedia => {
                let config = self.endpoints.get(EndpointId::Offerer)?.config();
                TransportOp::AcquireMedia {
                    media: config.media,
                    data_channel: config.data_channel.clone(),
                }
            }
            NegotiationStep::CreateOffer | NegotiationStep::RenegotiateCreateOffer(_) => {
                TransportOp::CreateOffer(RTCOfferOptions::from(self.config.media))
            }
            NegotiationStep::CreateAnswer => TransportOp::CreateAnswer,
            NegotiationStep::SetLocalOffer(description)
            | NegotiationStep::SetLocalAnswer(description)
            | NegotiationStep::RenegotiateSetLocalOffer(description, _) => {
                TransportOp::SetLocalDescription(description.clone())
            }
            NegotiationStep::SetRemoteOffer(description) => {
                TransportOp::SetRemoteDescription(description.clone())
            }
            NegotiationStep::SetRemoteAnswer(answer) => {
                let family = self.endpoints.get(EndpointId::Offerer)?.config().transport_family;
                match self.config.bandwidth_limit.constraint(family) {
                    Some(constraint) => {
                        let capped = answer.with_bandwidth(&constraint)?;
                        log::debug!(
                            "Applying bandwidth restriction to setRemoteDescription:\n{}",
                            capped.sdp
                        );
                        TransportOp::SetRemoteDescription(capped)
                    }
                    None => TransportOp::SetRemoteDescription(answer.clone()),
                }
            }
            NegotiationStep::RenegotiateSetRemote(renegotiation) => {
                TransportOp::SetRemoteDescription(renegotiation.remote.clone())
            }
        })
    }

    /// Validates `step` against its endpoint and emits its command.
    fn issue(&mut self, step: NegotiationStep) -> Result<()> {
        let signaling_state = self.endpoints.get(step.endpoint())?.signaling_state();
        if let Some((op, sdp_type)) = step.signaling() {
            next_signaling_state(signaling_state, op, sdp_type)?;
        }

        let op = self.transport_op(&step)?;
        let applied = match &op {
            TransportOp::SetLocalDescription(description)
            | TransportOp::SetRemoteDescription(description) => Some(description.clone()),
            _ => None,
        };

        let transaction_id = self.outbox.command(step.endpoint(), op);
        self.set_state(step.phase());
        self.pending = Some(PendingStep {
            transaction_id,
            step,
            applied,
        });
        Ok(())
    }

    fn fail(&mut self, step: NegotiationStep, err: Error) {
        if step.phase() == NegotiationState::Renegotiating {
            log::warn!("Failed to renegotiate bandwidth, {step}: {err}");
            self.set_state(NegotiationState::Established);
            self.outbox
                .event(RTCSessionEvent::OnRenegotiationFailed(err));
        } else {
            log::warn!("Failed to {step}: {err}");
            self.failed = Some(step);
            self.set_state(NegotiationState::NegotiationFailed);
            self.outbox.event(RTCSessionEvent::OnNegotiationFailed(err));
        }
    }

    /// Checks a created description and reports it.
    fn created(
        &mut self,
        id: EndpointId,
        expected: RTCSdpType,
        output: TransportOutput,
    ) -> Result<RTCSessionDescription> {
        let TransportOutput::Description(description) = output else {
            return Err(Error::ErrDescriptionCreationFailed(
                "transport returned no description".to_owned(),
            ));
        };
        if description.sdp_type != expected {
            return Err(Error::ErrUnexpectedDescriptionType(format!(
                "expected {expected}, got {}",
                description.sdp_type
            )));
        }

        let label = self.endpoints.get(id)?.label();
        match expected {
            RTCSdpType::Answer => log::trace!("Answer from {label} \n{}", description.sdp),
            _ => log::trace!("Offer from {label} \n{}", description.sdp),
        }
        self.outbox
            .event(RTCSessionEvent::OnDescriptionCreated(id, description.clone()));
        Ok(description)
    }

    /// Records a description the transport confirmed and moves the
    /// endpoint's signaling state.
    fn apply(
        &mut self,
        id: EndpointId,
        op: StateChangeOp,
        description: Option<RTCSessionDescription>,
    ) -> Result<()> {
        let Some(description) = description else {
            return Ok(());
        };

        let endpoint = self.endpoints.get_mut(id)?;
        let next = next_signaling_state(endpoint.signaling_state(), op, description.sdp_type)?;
        match op {
            StateChangeOp::SetLocal => endpoint.set_local_description(description),
            StateChangeOp::SetRemote => endpoint.set_remote_description(description),
        }
        if endpoint.set_signaling_state(next) {
            log::debug!("{} signaling state changed to {next}", endpoint.label());
            self.outbox
                .event(RTCSessionEvent::OnSignalingStateChange(id, next));
        }
        Ok(())
    }

    /// Applies the effects of a completed step and returns the next one.
    fn complete(
        &mut self,
        pending: PendingStep,
        output: TransportOutput,
    ) -> Result<Option<NegotiationStep>> {
        let PendingStep { step, applied, .. } = pending;

        let next = match step {
            NegotiationStep::AcquireMedia => Some(NegotiationStep::CreateOffer),
            NegotiationStep::CreateOffer => Some(NegotiationStep::SetLocalOffer(self.created(
                EndpointId::Offerer,
                RTCSdpType::Offer,
                output,
            )?)),
            NegotiationStep::SetLocalOffer(offer) => {
                self.apply(EndpointId::Offerer, StateChangeOp::SetLocal, applied)?;
                Some(NegotiationStep::SetRemoteOffer(offer))
            }
            NegotiationStep::SetRemoteOffer(_) => {
                self.apply(EndpointId::Answerer, StateChangeOp::SetRemote, applied)?;
                self.relay
                    .flush(&mut self.endpoints, EndpointId::Offerer, &mut self.outbox);
                Some(NegotiationStep::CreateAnswer)
            }
            NegotiationStep::CreateAnswer => Some(NegotiationStep::SetLocalAnswer(self.created(
                EndpointId::Answerer,
                RTCSdpType::Answer,
                output,
            )?)),
            NegotiationStep::SetLocalAnswer(answer) => {
                self.apply(EndpointId::Answerer, StateChangeOp::SetLocal, applied)?;
                Some(NegotiationStep::SetRemoteAnswer(answer))
            }
            NegotiationStep::SetRemoteAnswer(_) => {
                self.apply(EndpointId::Offerer, StateChangeOp::SetRemote, applied)?;
                self.relay
                    .flush(&mut self.endpoints, EndpointId::Answerer, &mut self.outbox);
                self.bandwidth_limit = self.config.bandwidth_limit;
                if self.config.media.has_audio() && self.dtmf.is_none() {
                    self.dtmf = Some(RTCDtmfSender::default());
                }
                log::info!("Call established, bandwidth {}", self.bandwidth_limit);
                self.set_state(NegotiationState::Established);
                None
            }
            NegotiationStep::RenegotiateCreateOffer(renegotiation) => {
                let offer = self.created(EndpointId::Offerer, RTCSdpType::Offer, output)?;
                Some(NegotiationStep::RenegotiateSetLocalOffer(
                    offer,
                    renegotiation,
                ))
            }
            NegotiationStep::RenegotiateSetLocalOffer(_, renegotiation) => {
                self.apply(EndpointId::Offerer, StateChangeOp::SetLocal, applied)?;
                log::debug!(
                    "Applying bandwidth restriction to setRemoteDescription:\n{}",
                    renegotiation.remote.sdp
                );
                Some(NegotiationStep::RenegotiateSetRemote(renegotiation))
            }
            NegotiationStep::RenegotiateSetRemote(renegotiation) => {
                self.apply(EndpointId::Offerer, StateChangeOp::SetRemote, applied)?;
                self.bandwidth_limit = renegotiation.limit;
                log::info!("Bandwidth renegotiated: {}", self.bandwidth_limit);
                self.set_state(NegotiationState::Established);
                self.outbox
                    .event(RTCSessionEvent::OnRenegotiationComplete(renegotiation.limit));
                None
            }
        };
        Ok(next)
    }

    fn handle_reply(&mut self, reply: TransportReply) -> Result<()> {
        let TransportReply {
            transaction_id,
            result,
        } = reply;

        if self.state == NegotiationState::Closed {
            log::debug!("dropping reply {transaction_id} after hangup");
            return Ok(());
        }

        if self.relay.owns(transaction_id) {
            self.relay
                .handle_reply(transaction_id, result.map(|_| ()), &mut self.outbox);
            return Ok(());
        }

        if self
            .transfer
            .as_ref()
            .is_some_and(|transfer| transfer.owns(transaction_id))
        {
            self.handle_chunk_reply(result.map(|_| ()));
            return Ok(());
        }

        let pending = match self.pending.take() {
            Some(pending) if pending.transaction_id == transaction_id => pending,
            other => {
                self.pending = other;
                log::debug!("ignoring reply to unknown transaction {transaction_id}");
                return Ok(());
            }
        };

        let step = pending.step.clone();
        match result.and_then(|output| self.complete(pending, output)) {
            Ok(Some(next)) => {
                if let Err(err) = self.issue(next.clone()) {
                    self.fail(next, err);
                }
            }
            Ok(None) => {}
            Err(err) => self.fail(step, err),
        }
        Ok(())
    }

    fn handle_notification(&mut self, notification: TransportNotification) -> Result<()> {
        if matches!(
            self.state,
            NegotiationState::Idle | NegotiationState::Closed
        ) {
            log::debug!("dropping {notification:?} while {}", self.state);
            return Ok(());
        }

        match notification {
            TransportNotification::IceCandidate {
                endpoint,
                candidate,
            } => self.relay.on_local_candidate(
                &mut self.endpoints,
                endpoint,
                candidate,
                &mut self.outbox,
            ),
            TransportNotification::StateChange { endpoint, state } => {
                if self.endpoints.transition(endpoint, state)? {
                    self.outbox
                        .event(RTCSessionEvent::OnEndpointStateChange(endpoint, state));
                }
                Ok(())
            }
            TransportNotification::DataReceived { endpoint, data } => {
                self.handle_data_received(endpoint, data)
            }
        }
    }
}

impl sansio::Protocol<TransportReply, SessionRequest, TransportNotification>
    for NegotiationSession
{
    type Rout = ();
    type Wout = TransportCommand;
    type Eout = RTCSessionEvent;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TransportReply) -> Result<()> {
        self.handle_reply(msg)
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        None
    }

    fn handle_write(&mut self, msg: SessionRequest) -> Result<()> {
        match msg {
            SessionRequest::StartCall(config) => self.start_call(config),
            SessionRequest::Renegotiate(limit) => self.renegotiate(limit),
            SessionRequest::Retry => self.retry(),
            SessionRequest::InsertDtmf {
                tones,
                duration,
                gap,
            } => self.insert_dtmf(&tones, duration, gap),
            SessionRequest::SendData(total) => self.send_data(total),
            SessionRequest::Hangup => self.hangup(),
        }
    }

    /// Returns commands for the transport.
    ///
    /// It should be polled after every `handle_*` call.
    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.outbox.commands.pop_front()
    }

    fn handle_event(&mut self, evt: TransportNotification) -> Result<()> {
        self.handle_notification(evt)
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.outbox.events.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        let Some(dtmf) = self.dtmf.as_mut() else {
            return Ok(());
        };

        dtmf.handle_timeout(now);
        while let Some(tone) = dtmf.poll_tone() {
            log::info!("Sent DTMF tone: {}", tone.tone);
            self.outbox.command(
                EndpointId::Offerer,
                TransportOp::InsertTone {
                    tone: tone.tone,
                    duration: tone.duration,
                },
            );
        }
        while let Some(event) = dtmf.poll_event() {
            self.outbox.event(RTCSessionEvent::OnToneChange(event));
        }
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Self::Time> {
        self.dtmf.as_ref().and_then(|dtmf| dtmf.poll_timeout())
    }

    fn close(&mut self) -> Result<()> {
        self.hangup()
    }
}
