/// Integration test for changing the bandwidth cap of an established call
///
/// This test verifies that:
/// - renegotiation rewrites only the offerer's remote description
/// - a second request while a round is in flight is rejected, and the
///   previous cap stays in effect until the round completes
/// - the cap is written as TIAS (bps) for Firefox-family endpoints
/// - a failed round leaves the call established with the previous cap
use anyhow::Result;
use sansio::Protocol;

use rtc_session::configuration::{
    BandwidthLimit, CallConfiguration, CallConfigurationBuilder, MediaKind, TransportFamily,
};
use rtc_session::driver::run_until_idle;
use rtc_session::driver::simulated::SimulatedTransport;
use rtc_session::endpoint::EndpointId;
use rtc_session::event::RTCSessionEvent;
use rtc_session::negotiation::NegotiationSession;
use rtc_session::state::NegotiationState;
use rtc_session::transport::TransportOpKind;
use sdp::bandwidth::{BandwidthConstraint, BandwidthModifier};
use shared::error::Error;

fn init_logger() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

fn video_call(family: TransportFamily, limit: BandwidthLimit) -> CallConfiguration {
    CallConfigurationBuilder::new()
        .with_media(MediaKind::Video)
        .with_transport_family(family)
        .with_bandwidth_limit(limit)
        .build()
}

async fn established(
    config: CallConfiguration,
) -> Result<(NegotiationSession, SimulatedTransport)> {
    let mut session = NegotiationSession::new();
    let mut transport = SimulatedTransport::new();
    session.start_call(config)?;
    run_until_idle(&mut session, &mut transport).await?;
    assert_eq!(session.state(), NegotiationState::Established);
    while session.poll_event().is_some() {}
    Ok((session, transport))
}

fn applied_cap(
    transport: &SimulatedTransport,
    id: EndpointId,
) -> Result<Option<BandwidthConstraint>> {
    Ok(transport
        .remote_description(id)
        .map(|d| d.bandwidth())
        .transpose()?
        .flatten())
}

#[tokio::test]
async fn test_renegotiate_lowers_cap() -> Result<()> {
    init_logger();
    let (mut session, mut transport) =
        established(video_call(TransportFamily::Chrome, BandwidthLimit::Kbps(500))).await?;
    let answerer_remote = transport
        .remote_description(EndpointId::Answerer)
        .cloned();

    session.renegotiate(BandwidthLimit::Kbps(125))?;
    assert_eq!(
        session.renegotiate(BandwidthLimit::Kbps(250)),
        Err(Error::ErrRenegotiationInProgress)
    );
    assert_eq!(session.bandwidth_limit(), BandwidthLimit::Kbps(500));
    assert!(session.state().is_established());

    run_until_idle(&mut session, &mut transport).await?;
    assert_eq!(session.state(), NegotiationState::Established);
    assert_eq!(session.bandwidth_limit(), BandwidthLimit::Kbps(125));
    assert_eq!(
        applied_cap(&transport, EndpointId::Offerer)?,
        Some(BandwidthConstraint::new(BandwidthModifier::As, 125))
    );
    // the answerer is not part of the round
    assert_eq!(
        transport.remote_description(EndpointId::Answerer).cloned(),
        answerer_remote
    );

    let completed = std::iter::from_fn(|| session.poll_event())
        .any(|e| e == RTCSessionEvent::OnRenegotiationComplete(BandwidthLimit::Kbps(125)));
    assert!(completed);
    Ok(())
}

#[tokio::test]
async fn test_renegotiate_unlimited() -> Result<()> {
    init_logger();
    let (mut session, mut transport) =
        established(video_call(TransportFamily::Chrome, BandwidthLimit::Kbps(500))).await?;

    session.renegotiate(BandwidthLimit::Unlimited)?;
    run_until_idle(&mut session, &mut transport).await?;

    assert_eq!(session.bandwidth_limit(), BandwidthLimit::Unlimited);
    assert_eq!(applied_cap(&transport, EndpointId::Offerer)?, None);
    Ok(())
}

#[tokio::test]
async fn test_firefox_family_uses_tias() -> Result<()> {
    init_logger();
    let (mut session, mut transport) =
        established(video_call(TransportFamily::Firefox, BandwidthLimit::Kbps(500))).await?;
    assert_eq!(
        applied_cap(&transport, EndpointId::Offerer)?,
        Some(BandwidthConstraint::new(BandwidthModifier::Tias, 500_000))
    );

    session.renegotiate(BandwidthLimit::Kbps(2000))?;
    run_until_idle(&mut session, &mut transport).await?;
    let sdp = transport
        .remote_description(EndpointId::Offerer)
        .map(|d| d.sdp.clone())
        .unwrap_or_default();
    assert!(sdp.contains("b=TIAS:2000000\r\n"));
    assert!(!sdp.contains("b=TIAS:500000"));
    Ok(())
}

#[tokio::test]
async fn test_failed_round_keeps_previous_cap() -> Result<()> {
    init_logger();
    let (mut session, mut transport) =
        established(video_call(TransportFamily::Chrome, BandwidthLimit::Kbps(500))).await?;

    transport.fail_next(
        TransportOpKind::SetRemoteDescription,
        Error::ErrDescriptionRejected("bandwidth line rejected".to_owned()),
    );
    session.renegotiate(BandwidthLimit::Kbps(125))?;
    run_until_idle(&mut session, &mut transport).await?;

    assert_eq!(session.state(), NegotiationState::Established);
    assert_eq!(session.bandwidth_limit(), BandwidthLimit::Kbps(500));
    assert_eq!(
        applied_cap(&transport, EndpointId::Offerer)?,
        Some(BandwidthConstraint::new(BandwidthModifier::As, 500))
    );
    let failed = std::iter::from_fn(|| session.poll_event())
        .any(|e| matches!(e, RTCSessionEvent::OnRenegotiationFailed(_)));
    assert!(failed);

    // the offerer is left with a local offer applied; a new round recovers
    session.renegotiate(BandwidthLimit::Kbps(125))?;
    run_until_idle(&mut session, &mut transport).await?;
    assert_eq!(session.bandwidth_limit(), BandwidthLimit::Kbps(125));
    Ok(())
}
