//! dtmf sets up a loopback audio call and plays a string of DTMF tones
//! through the offerer's sender, printing each tone as it starts.

use anyhow::Result;
use clap::Parser;
use sansio::Protocol;
use std::io::Write;
use std::str::FromStr;
use std::time::{Duration, Instant};

use session::configuration::{CallConfigurationBuilder, MediaKind};
use session::driver::run_until_idle;
use session::driver::simulated::SimulatedTransport;
use session::dtmf::{DTMF_DEFAULT_DURATION, DTMF_DEFAULT_GAP};
use session::endpoint::EndpointId;
use session::event::RTCSessionEvent;
use session::negotiation::NegotiationSession;

#[derive(Parser)]
#[command(name = "dtmf")]
#[command(author = "Rain Liu <yliu@webrtc.rs>")]
#[command(version = "0.1.0")]
#[command(about = "An example of sending DTMF tones over a loopback call.", long_about = None)]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(short, long, default_value_t = format!("INFO"))]
    log_level: String,
    #[arg(short, long, default_value_t = format!("1199##9,9,7"))]
    tones: String,
    /// Tone duration in milliseconds
    #[arg(long, default_value_t = DTMF_DEFAULT_DURATION.as_millis() as u64)]
    duration: u64,
    /// Gap between tones in milliseconds
    #[arg(long, default_value_t = DTMF_DEFAULT_GAP.as_millis() as u64)]
    gap: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.debug {
        let log_level = log::LevelFilter::from_str(&cli.log_level)?;
        env_logger::Builder::new()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{}:{} [{}] {} - {}",
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.level(),
                    chrono::Local::now().format("%H:%M:%S.%6f"),
                    record.args()
                )
            })
            .filter(None, log_level)
            .init();
    }

    let mut session = NegotiationSession::new();
    let mut transport = SimulatedTransport::new();

    session.start_call(
        CallConfigurationBuilder::new()
            .with_media(MediaKind::Audio)
            .build(),
    )?;
    run_until_idle(&mut session, &mut transport).await?;
    while session.poll_event().is_some() {}
    if !session.state().is_established() {
        anyhow::bail!("call not established: {}", session.state());
    }

    session.insert_dtmf(
        &cli.tones,
        Duration::from_millis(cli.duration),
        Duration::from_millis(cli.gap),
    )?;
    if let Some(dtmf) = session.dtmf_sender() {
        println!(
            "queued {:?}, {} ms per tone, {} ms gap",
            dtmf.tone_buffer(),
            dtmf.duration().as_millis(),
            dtmf.gap().as_millis()
        );
    }

    let started = Instant::now();
    while let Some(deadline) = session.poll_timeout() {
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
        session.handle_timeout(Instant::now())?;
        run_until_idle(&mut session, &mut transport).await?;

        while let Some(event) = session.poll_event() {
            if let RTCSessionEvent::OnToneChange(change) = event {
                let elapsed = started.elapsed().as_millis();
                if change.tone.is_empty() {
                    println!("{elapsed:>6} ms done");
                } else {
                    println!("{elapsed:>6} ms tone {:?}", change.tone);
                }
            }
        }
    }
    println!("answerer heard {:?}", transport.tones(EndpointId::Offerer));

    session.hangup()?;
    run_until_idle(&mut session, &mut transport).await?;

    Ok(())
}
