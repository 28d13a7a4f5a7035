//! data-channel sets up a loopback call carrying only a data channel, prints
//! every negotiation event including each trickled candidate as it is handed
//! to the peer, then streams `--megs` megabytes from the offerer to the
//! answerer. Both connections close once the answerer has received it all.
//!
//! Pass `--reject` to have the answerer refuse every candidate; the call
//! still establishes and the failures are reported as candidate errors.

use anyhow::Result;
use clap::Parser;
use sansio::Protocol;
use std::io::Write;
use std::str::FromStr;

use session::configuration::{CallConfigurationBuilder, DEFAULT_DATA_CHANNEL_LABEL};
use session::driver::run_until_idle;
use session::driver::simulated::SimulatedTransport;
use session::transfer::bytes_to_send;
use session::endpoint::EndpointId;
use session::event::RTCSessionEvent;
use session::negotiation::NegotiationSession;
use session::state::NegotiationState;

#[derive(Parser)]
#[command(name = "data-channel")]
#[command(author = "Rain Liu <yliu@webrtc.rs>")]
#[command(version = "0.1.0")]
#[command(about = "An example of negotiating a data-channel-only loopback call.", long_about = None)]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(short, long, default_value_t = format!("INFO"))]
    log_level: String,
    #[arg(long, default_value_t = DEFAULT_DATA_CHANNEL_LABEL.to_owned())]
    label: String,
    #[arg(long)]
    unordered: bool,
    #[arg(long, default_value_t = 2)]
    candidates: usize,
    #[arg(long)]
    reject: bool,
    /// Megabytes to send, rounded to a whole number greater than zero
    #[arg(short, long, default_value_t = 1.0, allow_negative_numbers = true)]
    megs: f64,
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

    let total = match bytes_to_send(cli.megs) {
        Ok(total) => total,
        Err(err) => anyhow::bail!("--megs {}: {err}", cli.megs),
    };

    let config = CallConfigurationBuilder::new()
        .with_data_channel(cli.label)
        .with_ordered(!cli.unordered)
        .build();
    println!("{}", serde_json::to_string_pretty(&config)?);

    let mut session = NegotiationSession::new();
    let mut transport = SimulatedTransport::new().with_candidates(cli.candidates);
    transport.reject_candidates(cli.reject);

    session.start_call(config)?;
    for id in [EndpointId::Offerer, EndpointId::Answerer] {
        session.observe_state_change(
            id,
            Box::new(|id, state| println!("{id} endpoint state changed to {state}")),
        )?;
    }
    run_until_idle(&mut session, &mut transport).await?;
    print_events(&mut session);

    if let Some(channel) = transport.data_channel(EndpointId::Offerer) {
        println!(
            "data channel {:?} open, ordered: {}",
            channel.label, channel.ordered
        );
    }
    for id in [EndpointId::Offerer, EndpointId::Answerer] {
        let stats = session.relay_stats(id);
        println!(
            "{id}: {} candidates forwarded, {} accepted, {} failed",
            stats.forwarded, stats.succeeded, stats.failed
        );
    }

    if !session.state().is_established() {
        anyhow::bail!("call not established: {}", session.state());
    }

    session.send_data(total)?;
    run_until_idle(&mut session, &mut transport).await?;
    print_events(&mut session);
    println!(
        "answerer received {} of {total} bytes",
        transport.bytes_received(EndpointId::Answerer)
    );

    if session.state() != NegotiationState::Closed {
        session.hangup()?;
        run_until_idle(&mut session, &mut transport).await?;
        print_events(&mut session);
    }

    Ok(())
}

fn print_events(session: &mut NegotiationSession) {
    while let Some(event) = session.poll_event() {
        match event {
            RTCSessionEvent::OnNegotiationStateChange(state) => {
                println!("negotiation state changed to {state}")
            }
            RTCSessionEvent::OnSignalingStateChange(id, state) => {
                println!("{id} signaling state changed to {state}")
            }
            RTCSessionEvent::OnDescriptionCreated(id, description) => {
                println!("{id} created {}", description.sdp_type)
            }
            RTCSessionEvent::OnIceCandidate(event) => match event.candidate {
                Some(candidate) => println!("{} -> {}", event.source, candidate.candidate),
                None => println!("{} -> end of candidates", event.source),
            },
            RTCSessionEvent::OnIceCandidateError(event) => {
                println!("{} candidate failed: {}", event.source, event.error)
            }
            RTCSessionEvent::OnTransferProgress(progress) => {
                // one line per 256 KiB
                if progress.received % (256 * 1024) == 0 || progress.is_complete() {
                    println!("received {}/{} bytes", progress.received, progress.total)
                }
            }
            RTCSessionEvent::OnTransferComplete(progress) => {
                println!("transfer of {} bytes complete, closing data channels", progress.total)
            }
            event => println!("{event:?}"),
        }
    }
}
