/// Integration test for a full loopback call over the simulated transport
///
/// This test verifies that:
/// - one offer/answer round brings the session to established
/// - every trickled candidate is delivered to the peer, none fail
/// - both endpoints are reported open, then closed on hangup
/// - the offerer receives the answer with the configured cap applied
/// - a data transfer hangs up the call once the answerer has received it all
use anyhow::Result;
use sansio::Protocol;
use std::sync::{Arc, Mutex};

use rtc_session::configuration::{
    BandwidthLimit, CallConfigurationBuilder, MediaKind, TransportFamily,
};
use rtc_session::driver::run_until_idle;
use rtc_session::driver::simulated::{DEFAULT_CANDIDATES_PER_ENDPOINT, SimulatedTransport};
use rtc_session::endpoint::EndpointId;
use rtc_session::event::RTCSessionEvent;
use rtc_session::negotiation::NegotiationSession;
use rtc_session::state::{EndpointState, NegotiationState, RTCSignalingState};
use rtc_session::transfer::{DEFAULT_CHUNK_SIZE, TransferProgress, bytes_to_send};
use rtc_session::transport::TransportOpKind;
use sdp::bandwidth::{BandwidthConstraint, BandwidthModifier};

fn init_logger() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .is_test(true)
        .try_init()
        .ok();
}

#[tokio::test]
async fn test_loopback_call_established_in_one_round() -> Result<()> {
    init_logger();

    let config = CallConfigurationBuilder::new()
        .with_media(MediaKind::Both)
        .with_transport_family(TransportFamily::Chrome)
        .with_bandwidth_limit(BandwidthLimit::Kbps(500))
        .build();

    let mut session = NegotiationSession::new();
    let mut transport = SimulatedTransport::new();

    session.start_call(config)?;
    let opened = Arc::new(Mutex::new(vec![]));
    for id in [EndpointId::Offerer, EndpointId::Answerer] {
        let opened = Arc::clone(&opened);
        session.observe_state_change(
            id,
            Box::new(move |id, state| {
                if let Ok(mut opened) = opened.lock() {
                    opened.push((id, state));
                }
            }),
        )?;
    }

    run_until_idle(&mut session, &mut transport).await?;
    log::info!("call state: {}", session.state());

    assert_eq!(session.state(), NegotiationState::Established);
    let creates = transport
        .history()
        .iter()
        .filter(|(_, kind)| *kind == TransportOpKind::CreateOffer)
        .count();
    assert_eq!(creates, 1, "one offer/answer round");

    for id in [EndpointId::Offerer, EndpointId::Answerer] {
        let endpoint = session.endpoint(id)?;
        assert_eq!(endpoint.signaling_state(), RTCSignalingState::Stable);
        assert_eq!(endpoint.state(), EndpointState::Open);
        assert_eq!(endpoint.pending_candidates(), 0);

        let stats = session.relay_stats(id);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.succeeded, DEFAULT_CANDIDATES_PER_ENDPOINT + 1);
        assert_eq!(
            transport.remote_candidates(id.peer()).len(),
            DEFAULT_CANDIDATES_PER_ENDPOINT + 1
        );
    }

    let applied = transport
        .remote_description(EndpointId::Offerer)
        .map(|d| d.bandwidth())
        .transpose()?
        .flatten();
    assert_eq!(
        applied,
        Some(BandwidthConstraint::new(BandwidthModifier::As, 500))
    );
    // only the hand-over to the offerer is capped
    let answer = transport.local_description(EndpointId::Answerer);
    assert_eq!(answer.map(|d| d.bandwidth()).transpose()?.flatten(), None);

    session.hangup()?;
    run_until_idle(&mut session, &mut transport).await?;
    assert!(transport.is_closed(EndpointId::Offerer));
    assert!(transport.is_closed(EndpointId::Answerer));
    assert_eq!(session.state(), NegotiationState::Closed);

    let opened = opened.lock().unwrap();
    for id in [EndpointId::Offerer, EndpointId::Answerer] {
        let seen: Vec<_> = opened
            .iter()
            .filter(|(e, _)| *e == id)
            .map(|(_, s)| *s)
            .collect();
        assert_eq!(seen, vec![EndpointState::Open, EndpointState::Closed], "{id}");
    }
    Ok(())
}

#[tokio::test]
async fn test_data_channel_call() -> Result<()> {
    init_logger();

    let config = CallConfigurationBuilder::new()
        .with_data_channel("sendDataChannel")
        .with_ordered(false)
        .build();

    let mut session = NegotiationSession::new();
    let mut transport = SimulatedTransport::new().with_candidates(1);
    session.start_call(config)?;
    run_until_idle(&mut session, &mut transport).await?;

    assert_eq!(session.state(), NegotiationState::Established);
    let channel = transport.data_channel(EndpointId::Offerer);
    assert_eq!(channel.map(|dc| dc.ordered), Some(false));
    assert_eq!(
        channel.map(|dc| dc.label.as_str()),
        Some("sendDataChannel")
    );
    assert!(transport.data_channel(EndpointId::Answerer).is_none());

    let offer = transport
        .local_description(EndpointId::Offerer)
        .map(|d| d.sdp.clone())
        .unwrap_or_default();
    assert!(offer.contains("m=application"));
    assert!(!offer.contains("m=audio"));
    Ok(())
}

#[tokio::test]
async fn test_negotiation_failure_then_retry() -> Result<()> {
    init_logger();

    let mut session = NegotiationSession::new();
    let mut transport = SimulatedTransport::new();
    transport.fail_next(
        TransportOpKind::SetRemoteDescription,
        shared::error::Error::ErrDescriptionRejected("unsupported codec".to_owned()),
    );

    session.start_call(
        CallConfigurationBuilder::new()
            .with_media(MediaKind::Audio)
            .build(),
    )?;
    run_until_idle(&mut session, &mut transport).await?;

    assert_eq!(session.state(), NegotiationState::NegotiationFailed);
    let failed = std::iter::from_fn(|| session.poll_event()).any(|e| {
        e == RTCSessionEvent::OnNegotiationFailed(shared::error::Error::ErrDescriptionRejected(
            "unsupported codec".to_owned(),
        ))
    });
    assert!(failed);

    session.retry()?;
    run_until_idle(&mut session, &mut transport).await?;
    assert_eq!(session.state(), NegotiationState::Established);
    Ok(())
}

#[tokio::test]
async fn test_hangup_is_idempotent() -> Result<()> {
    init_logger();

    let mut session = NegotiationSession::new();
    let mut transport = SimulatedTransport::new();
    session.start_call(Default::default())?;

    // hang up half-way through the handshake
    for _ in 0..3 {
        if let Some(command) = session.poll_write() {
            let reply = rtc_session::driver::execute(&mut transport, command).await;
            session.handle_read(reply)?;
        }
    }
    session.hangup()?;
    session.hangup()?;
    run_until_idle(&mut session, &mut transport).await?;

    assert_eq!(session.state(), NegotiationState::Closed);
    let closes = transport
        .history()
        .iter()
        .filter(|(_, kind)| *kind == TransportOpKind::Close)
        .count();
    assert_eq!(closes, 2);
    Ok(())
}

#[tokio::test]
async fn test_data_transfer_closes_call_when_received() -> Result<()> {
    init_logger();

    let mut session = NegotiationSession::new();
    let mut transport = SimulatedTransport::new().with_candidates(1);
    session.start_call(
        CallConfigurationBuilder::new()
            .with_data_channel("sendDataChannel")
            .with_ordered(true)
            .build(),
    )?;
    run_until_idle(&mut session, &mut transport).await?;
    assert_eq!(session.state(), NegotiationState::Established);
    while session.poll_event().is_some() {}

    assert_eq!(
        bytes_to_send(0.0),
        Err(shared::error::Error::ErrInvalidTransferSize)
    );
    let total = bytes_to_send(1.0)?;
    session.send_data(total)?;
    run_until_idle(&mut session, &mut transport).await?;

    assert_eq!(transport.bytes_sent(EndpointId::Offerer), total);
    assert_eq!(transport.bytes_received(EndpointId::Answerer), total);
    let chunks = transport
        .history()
        .iter()
        .filter(|(_, kind)| *kind == TransportOpKind::SendData)
        .count();
    assert_eq!(chunks, total / DEFAULT_CHUNK_SIZE);

    // both connections are closed once everything arrived
    assert_eq!(session.state(), NegotiationState::Closed);
    assert!(transport.is_closed(EndpointId::Offerer));
    assert!(transport.is_closed(EndpointId::Answerer));

    let completed = std::iter::from_fn(|| session.poll_event()).find_map(|e| match e {
        RTCSessionEvent::OnTransferComplete(progress) => Some(progress),
        _ => None,
    });
    assert_eq!(
        completed,
        Some(TransferProgress {
            total,
            sent: total,
            received: total,
        })
    );
    Ok(())
}
