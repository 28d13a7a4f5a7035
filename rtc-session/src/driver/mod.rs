//! Async glue between a [`NegotiationSession`] and a concrete transport.
//!
//! ```no_run
//! use rtc_session::configuration::CallConfiguration;
//! use rtc_session::driver::{run_until_idle, simulated::SimulatedTransport};
//! use rtc_session::negotiation::NegotiationSession;
//!
//! # async fn call() -> shared::error::Result<()> {
//! let mut session = NegotiationSession::new();
//! let mut transport = SimulatedTransport::new();
//! session.start_call(CallConfiguration::default())?;
//! run_until_idle(&mut session, &mut transport).await?;
//! assert!(session.state().is_established());
//! # Ok(())
//! # }
//! ```

pub mod simulated;

use std::time::Duration;

use bytes::Bytes;
use sansio::Protocol;
use shared::error::Result;

use crate::configuration::{MediaKind, RTCDataChannelInit, RTCOfferOptions};
use crate::endpoint::EndpointId;
use crate::negotiation::NegotiationSession;
use crate::sdp::RTCSessionDescription;
use crate::transport::{
    RTCIceCandidateInit, TransportCommand, TransportNotification, TransportOp, TransportReply,
};

/// The two endpoints' media and signaling stacks.
///
/// Each method completes one [`TransportOp`]. Candidates and endpoint state
/// changes the transport discovers on its own are queued and handed out by
/// [`Transport::poll_notification`].
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn acquire_media(
        &mut self,
        endpoint: EndpointId,
        media: MediaKind,
        data_channel: Option<RTCDataChannelInit>,
    ) -> Result<()>;

    async fn create_offer(
        &mut self,
        endpoint: EndpointId,
        options: RTCOfferOptions,
    ) -> Result<RTCSessionDescription>;

    async fn create_answer(&mut self, endpoint: EndpointId) -> Result<RTCSessionDescription>;

    async fn set_local_description(
        &mut self,
        endpoint: EndpointId,
        description: RTCSessionDescription,
    ) -> Result<()>;

    async fn set_remote_description(
        &mut self,
        endpoint: EndpointId,
        description: RTCSessionDescription,
    ) -> Result<()>;

    async fn add_remote_candidate(
        &mut self,
        endpoint: EndpointId,
        candidate: Option<RTCIceCandidateInit>,
    ) -> Result<()>;

    async fn insert_tone(&mut self, endpoint: EndpointId, tone: char, duration: Duration)
    -> Result<()>;

    /// Sends one message on the endpoint's data channel.
    async fn send_data(&mut self, endpoint: EndpointId, data: Bytes) -> Result<()>;

    async fn close(&mut self, endpoint: EndpointId) -> Result<()>;

    fn poll_notification(&mut self) -> Option<TransportNotification>;
}

/// Runs one command against `transport` and wraps the outcome.
pub async fn execute<T: Transport>(transport: &mut T, command: TransportCommand) -> TransportReply {
    let TransportCommand {
        transaction_id,
        endpoint,
        op,
    } = command;

    let result = match op {
        TransportOp::AcquireMedia {
            media,
            data_channel,
        } => transport.acquire_media(endpoint, media, data_channel).await,
        TransportOp::CreateOffer(options) => {
            return match transport.create_offer(endpoint, options).await {
                Ok(description) => TransportReply::description(transaction_id, description),
                Err(err) => TransportReply::failed(transaction_id, err),
            };
        }
        TransportOp::CreateAnswer => {
            return match transport.create_answer(endpoint).await {
                Ok(description) => TransportReply::description(transaction_id, description),
                Err(err) => TransportReply::failed(transaction_id, err),
            };
        }
        TransportOp::SetLocalDescription(description) => {
            transport.set_local_description(endpoint, description).await
        }
        TransportOp::SetRemoteDescription(description) => {
            transport.set_remote_description(endpoint, description).await
        }
        TransportOp::AddRemoteCandidate(candidate) => {
            transport.add_remote_candidate(endpoint, candidate).await
        }
        TransportOp::InsertTone { tone, duration } => {
            transport.insert_tone(endpoint, tone, duration).await
        }
        TransportOp::SendData(data) => transport.send_data(endpoint, data).await,
        TransportOp::Close => transport.close(endpoint).await,
    };

    match result {
        Ok(()) => TransportReply::done(transaction_id),
        Err(err) => TransportReply::failed(transaction_id, err),
    }
}

/// Feeds notifications and executes commands until neither side has
/// anything left. Timers are not driven; see
/// [`NegotiationSession::poll_timeout`](sansio::Protocol::poll_timeout).
pub async fn run_until_idle<T: Transport>(
    session: &mut NegotiationSession,
    transport: &mut T,
) -> Result<()> {
    loop {
        let mut progressed = false;

        while let Some(notification) = transport.poll_notification() {
            progressed = true;
            session.handle_event(notification)?;
        }

        if let Some(command) = session.poll_write() {
            progressed = true;
            let reply = execute(transport, command).await;
            session.handle_read(reply)?;
        }

        if !progressed {
            return Ok(());
        }
    }
}
