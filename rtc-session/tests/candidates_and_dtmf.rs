use anyhow::Result;
use sansio::Protocol;
use std::time::{Duration, Instant};

use rtc_session::configuration::{CallConfigurationBuilder, MediaKind};
use rtc_session::driver::run_until_idle;
use rtc_session::driver::simulated::SimulatedTransport;
use rtc_session::dtmf::RTCDtmfToneChangeEvent;
use rtc_session::endpoint::EndpointId;
use rtc_session::event::RTCSessionEvent;
use rtc_session::negotiation::NegotiationSession;
use rtc_session::state::NegotiationState;
use shared::error::Error;

fn init_logger() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .is_test(true)
        .try_init()
        .ok();
}

/// Candidate delivery failures are reported and counted but never move the
/// negotiation state.
#[tokio::test]
async fn test_rejected_candidates_do_not_fail_call() -> Result<()> {
    init_logger();

    let mut session = NegotiationSession::new();
    let mut transport = SimulatedTransport::new().with_candidates(3);
    transport.reject_candidates(true);

    session.start_call(
        CallConfigurationBuilder::new()
            .with_media(MediaKind::Audio)
            .build(),
    )?;
    run_until_idle(&mut session, &mut transport).await?;

    assert_eq!(session.state(), NegotiationState::Established);
    for id in [EndpointId::Offerer, EndpointId::Answerer] {
        let stats = session.relay_stats(id);
        assert_eq!(stats.forwarded, 4, "{id}");
        assert_eq!(stats.failed, 4, "{id}");
        assert_eq!(stats.succeeded, 0, "{id}");
    }

    let errors = std::iter::from_fn(|| session.poll_event())
        .filter(|e| matches!(e, RTCSessionEvent::OnIceCandidateError(_)))
        .count();
    assert_eq!(errors, 8);
    Ok(())
}

#[tokio::test]
async fn test_dtmf_tones_reach_transport() -> Result<()> {
    init_logger();

    let mut session = NegotiationSession::new();
    let mut transport = SimulatedTransport::new();
    session.start_call(
        CallConfigurationBuilder::new()
            .with_media(MediaKind::Audio)
            .build(),
    )?;
    run_until_idle(&mut session, &mut transport).await?;
    while session.poll_event().is_some() {}

    assert_eq!(
        session.insert_dtmf("1199##9,9,7::", Duration::from_millis(500), Duration::from_millis(50)),
        Err(Error::ErrInvalidDtmfTone(':'))
    );
    session.insert_dtmf("1199##9,9,7", Duration::from_millis(500), Duration::from_millis(50))?;
    assert_eq!(
        session.dtmf_sender().map(|dtmf| dtmf.tone_buffer()),
        Some("1199##9,9,7".to_owned())
    );

    // play the whole buffer
    let mut now = Instant::now();
    while let Some(at) = session.poll_timeout() {
        now = now.max(at);
        session.handle_timeout(now)?;
        run_until_idle(&mut session, &mut transport).await?;
    }

    assert_eq!(transport.tones(EndpointId::Offerer), "1199##997");
    let tones: Vec<_> = std::iter::from_fn(|| session.poll_event())
        .filter_map(|e| match e {
            RTCSessionEvent::OnToneChange(RTCDtmfToneChangeEvent { tone }) => Some(tone),
            _ => None,
        })
        .collect();
    assert_eq!(
        tones,
        vec!["1", "1", "9", "9", "#", "#", "9", ",", "9", ",", "7", ""]
    );
    Ok(())
}

#[tokio::test]
async fn test_dtmf_unavailable_without_audio() -> Result<()> {
    init_logger();

    let mut session = NegotiationSession::new();
    let mut transport = SimulatedTransport::new();
    assert_eq!(
        session.insert_dtmf("1", Duration::from_millis(100), Duration::from_millis(70)),
        Err(Error::ErrDtmfUnavailable)
    );

    session.start_call(
        CallConfigurationBuilder::new()
            .with_media(MediaKind::Video)
            .build(),
    )?;
    run_until_idle(&mut session, &mut transport).await?;
    assert_eq!(
        session.insert_dtmf("1", Duration::from_millis(100), Duration::from_millis(70)),
        Err(Error::ErrDtmfUnavailable)
    );
    Ok(())
}
