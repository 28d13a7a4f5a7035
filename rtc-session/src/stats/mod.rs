//! Outbound bitrate sampling.
//!
//! [`BitrateSampler`] asks for a stats report once per interval
//! (`poll_write` yields a [`StatsRequest`]), and turns each
//! [`StatsReport`] fed back through `handle_read` into one
//! [`BitratePoint`] per outbound RTP stream seen in the previous report.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use shared::error::{Error, Result};

pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Cumulative counters of one outbound RTP stream at one point in time.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundRtpSample {
    pub id: String,
    /// Milliseconds, on whatever clock the transport reports.
    pub timestamp: f64,
    pub bytes_sent: u64,
    pub packets_sent: u64,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub outbound_rtp: Vec<OutboundRtpSample>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StatsRequest {
    pub at: Instant,
}

/// Rate of one stream between two consecutive reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitratePoint {
    pub id: String,
    pub timestamp: f64,
    pub bitrate_kbps: f64,
    /// Packets sent since the previous report.
    pub packets: u64,
}

#[derive(Debug)]
pub struct BitrateSampler {
    interval: Duration,
    next_sample_at: Option<Instant>,
    last: HashMap<String, OutboundRtpSample>,
    requests: VecDeque<StatsRequest>,
    points: VecDeque<BitratePoint>,
}

impl BitrateSampler {
    pub fn new(interval: Duration, now: Instant) -> Self {
        BitrateSampler {
            interval,
            next_sample_at: Some(now + interval),
            last: HashMap::new(),
            requests: VecDeque::new(),
            points: VecDeque::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn sample(&mut self, current: &OutboundRtpSample) -> Option<BitratePoint> {
        let previous = self.last.get(&current.id)?;
        let elapsed = current.timestamp - previous.timestamp;
        if elapsed <= 0.0 {
            return None;
        }
        // counters going backwards mean the stream restarted
        let bytes = current.bytes_sent.checked_sub(previous.bytes_sent)?;
        let packets = current.packets_sent.checked_sub(previous.packets_sent)?;

        Some(BitratePoint {
            id: current.id.clone(),
            timestamp: current.timestamp,
            bitrate_kbps: 8.0 * bytes as f64 / elapsed,
            packets,
        })
    }
}

impl sansio::Protocol<StatsReport, (), ()> for BitrateSampler {
    type Rout = BitratePoint;
    type Wout = StatsRequest;
    type Eout = ();
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, report: StatsReport) -> Result<()> {
        for current in &report.outbound_rtp {
            match self.sample(current) {
                Some(point) => {
                    log::trace!(
                        "{} bitrate {:.1} kbps, {} packets",
                        point.id,
                        point.bitrate_kbps,
                        point.packets
                    );
                    self.points.push_back(point);
                }
                None => log::trace!("{} first or invalid sample skipped", current.id),
            }
        }

        self.last = report
            .outbound_rtp
            .into_iter()
            .map(|sample| (sample.id.clone(), sample))
            .collect();
        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.points.pop_front()
    }

    fn handle_write(&mut self, _msg: ()) -> Result<()> {
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.requests.pop_front()
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        None
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        if self.next_sample_at.is_some_and(|at| at <= now) {
            self.requests.push_back(StatsRequest { at: now });
            self.next_sample_at = Some(now + self.interval);
        }
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Self::Time> {
        self.next_sample_at
    }

    fn close(&mut self) -> Result<()> {
        self.next_sample_at = None;
        self.requests.clear();
        Ok(())
    }
}
