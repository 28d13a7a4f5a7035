//! bandwidth sets up a loopback video call capped at a send bandwidth, then
//! walks it through a list of new caps, printing the outbound bitrate
//! sampled once per second.
//!
//! The simulated sender paces itself to whatever cap is currently
//! negotiated, so the printed bitrate follows each renegotiation.

use anyhow::Result;
use clap::Parser;
use sansio::Protocol;
use std::fs;
use std::io::Write;
use std::str::FromStr;
use std::time::Instant;

use session::configuration::{
    BandwidthLimit, CallConfiguration, CallConfigurationBuilder, MediaKind, TransportFamily,
};
use session::driver::run_until_idle;
use session::driver::simulated::SimulatedTransport;
use session::event::RTCSessionEvent;
use session::negotiation::NegotiationSession;
use session::stats::{BitrateSampler, DEFAULT_STATS_INTERVAL, OutboundRtpSample, StatsReport};

/// Rate the sender settles at when the call is not capped.
const UNCAPPED_RATE_KBPS: u32 = 2000;

#[derive(Parser)]
#[command(name = "bandwidth")]
#[command(author = "Rain Liu <yliu@webrtc.rs>")]
#[command(version = "0.1.0")]
#[command(about = "An example of capping the send bandwidth of a loopback call.", long_about = None)]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(short, long, default_value_t = format!("INFO"))]
    log_level: String,
    /// JSON call configuration; flags below are ignored when set
    #[arg(short, long)]
    config: Option<String>,
    #[arg(short, long, default_value_t = format!("500"))]
    bandwidth: String,
    #[arg(short, long, default_value_t = format!("chrome"))]
    family: String,
    /// Caps to renegotiate to, in order, e.g. `125,unlimited`
    #[arg(short, long, value_delimiter = ',')]
    renegotiate: Vec<String>,
    /// Samples to print under each cap
    #[arg(short, long, default_value_t = 3)]
    samples: usize,
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

    let config = match &cli.config {
        Some(path) => serde_json::from_str::<CallConfiguration>(&fs::read_to_string(path)?)?,
        None => CallConfigurationBuilder::new()
            .with_media(MediaKind::Video)
            .with_transport_family(TransportFamily::from(cli.family.as_str()))
            .with_bandwidth_limit(BandwidthLimit::from_str(&cli.bandwidth)?)
            .build(),
    };
    let caps = cli
        .renegotiate
        .iter()
        .map(|cap| BandwidthLimit::from_str(cap))
        .collect::<shared::error::Result<Vec<_>>>()?;

    let mut session = NegotiationSession::new();
    let mut transport = SimulatedTransport::new();

    session.start_call(config)?;
    run_until_idle(&mut session, &mut transport).await?;
    print_events(&mut session);
    if !session.state().is_established() {
        anyhow::bail!("call not established: {}", session.state());
    }
    println!("call established at {}", session.bandwidth_limit());

    let mut sender = PacedSender::new(Instant::now());
    let mut sampler = BitrateSampler::new(DEFAULT_STATS_INTERVAL, Instant::now());

    sample(&mut sampler, &mut sender, &session, cli.samples).await?;
    for cap in caps {
        println!("renegotiating to {cap}");
        session.renegotiate(cap)?;
        run_until_idle(&mut session, &mut transport).await?;
        print_events(&mut session);
        sample(&mut sampler, &mut sender, &session, cli.samples).await?;
    }

    sampler.close()?;
    session.hangup()?;
    run_until_idle(&mut session, &mut transport).await?;
    print_events(&mut session);

    Ok(())
}

async fn sample(
    sampler: &mut BitrateSampler,
    sender: &mut PacedSender,
    session: &NegotiationSession,
    samples: usize,
) -> Result<()> {
    let mut printed = 0;
    while printed < samples {
        let Some(deadline) = sampler.poll_timeout() else {
            return Ok(());
        };
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
        sampler.handle_timeout(Instant::now())?;

        while let Some(request) = sampler.poll_write() {
            let report = sender.report(request.at, session.bandwidth_limit());
            sampler.handle_read(report)?;
        }
        while let Some(point) = sampler.poll_read() {
            println!(
                "{:>10.0} ms {} {:>8.1} kbps ({} packets)",
                point.timestamp, point.id, point.bitrate_kbps, point.packets
            );
            printed += 1;
        }
    }
    Ok(())
}

fn print_events(session: &mut NegotiationSession) {
    while let Some(event) = session.poll_event() {
        match event {
            RTCSessionEvent::OnDescriptionCreated(id, description) => {
                println!("{id} created {}", description.sdp_type)
            }
            RTCSessionEvent::OnIceCandidate(_) => {}
            event => println!("{event:?}"),
        }
    }
}

/// Stands in for the offerer's video encoder: it sends at the current cap,
/// or at [`UNCAPPED_RATE_KBPS`] when there is none.
struct PacedSender {
    started: Instant,
    last: Instant,
    sample: OutboundRtpSample,
}

impl PacedSender {
    fn new(now: Instant) -> Self {
        PacedSender {
            started: now,
            last: now,
            sample: OutboundRtpSample {
                id: "outbound-video".to_owned(),
                ..Default::default()
            },
        }
    }

    fn report(&mut self, now: Instant, limit: BandwidthLimit) -> StatsReport {
        let rate_kbps = match limit {
            BandwidthLimit::Unlimited => UNCAPPED_RATE_KBPS,
            BandwidthLimit::Kbps(kbps) => kbps.min(UNCAPPED_RATE_KBPS),
        };
        let elapsed = now.saturating_duration_since(self.last);
        self.last = now;

        let bytes = (u64::from(rate_kbps) * 1000 / 8) as f64 * elapsed.as_secs_f64();
        self.sample.bytes_sent += bytes as u64;
        // ~1200 byte packets
        self.sample.packets_sent += (bytes / 1200.0).ceil() as u64;
        self.sample.timestamp = now.saturating_duration_since(self.started).as_secs_f64() * 1000.0;

        StatsReport {
            outbound_rtp: vec![self.sample.clone()],
        }
    }
}
