//! DTMF tone scheduling for the offering endpoint's audio sender.
//!
//! [`RTCDtmfSender`] owns no clock. Tones are released from
//! [`RTCDtmfSender::handle_timeout`] and picked up with
//! [`RTCDtmfSender::poll_tone`] and [`RTCDtmfSender::poll_event`]; the next
//! deadline is reported by [`RTCDtmfSender::poll_timeout`].
//!
//! ```
//! use std::time::{Duration, Instant};
//! use rtc_session::dtmf::RTCDtmfSender;
//!
//! let now = Instant::now();
//! let mut sender = RTCDtmfSender::default();
//! sender.insert_dtmf("1,2", Duration::from_millis(100), Duration::from_millis(70), now)?;
//! assert_eq!(sender.poll_timeout(), Some(now));
//!
//! sender.handle_timeout(now + Duration::from_secs(10));
//! let tones: Vec<char> = std::iter::from_fn(|| sender.poll_tone()).map(|t| t.tone).collect();
//! assert_eq!(tones, vec!['1', '2']);
//! # Ok::<(), shared::error::Error>(())
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use shared::error::{Error, Result};

pub const DTMF_MIN_DURATION: Duration = Duration::from_millis(40);
pub const DTMF_MAX_DURATION: Duration = Duration::from_millis(6000);
pub const DTMF_DEFAULT_DURATION: Duration = Duration::from_millis(100);
pub const DTMF_MIN_GAP: Duration = Duration::from_millis(30);
pub const DTMF_DEFAULT_GAP: Duration = Duration::from_millis(70);
/// Pause inserted for a `,` in the tone buffer.
pub const DTMF_COMMA_DELAY: Duration = Duration::from_millis(2000);

const DTMF_VALID_TONES: &str = "0123456789ABCD#*,";

/// Fired when a tone starts playing. An empty `tone` marks the end of the buffer.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCDtmfToneChangeEvent {
    pub tone: String,
}

/// A tone the transport should play now.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RTCDtmfTone {
    pub tone: char,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct RTCDtmfSender {
    tone_buffer: VecDeque<char>,
    duration: Duration,
    gap: Duration,
    next_tone_at: Option<Instant>,
    tones: VecDeque<RTCDtmfTone>,
    events: VecDeque<RTCDtmfToneChangeEvent>,
}

impl Default for RTCDtmfSender {
    fn default() -> Self {
        RTCDtmfSender {
            tone_buffer: VecDeque::new(),
            duration: DTMF_DEFAULT_DURATION,
            gap: DTMF_DEFAULT_GAP,
            next_tone_at: None,
            tones: VecDeque::new(),
            events: VecDeque::new(),
        }
    }
}

impl RTCDtmfSender {
    /// Replaces the tone buffer with `tones`.
    ///
    /// Tones are case-insensitive; anything outside `0-9 A-D # * ,` is
    /// rejected and leaves the current buffer untouched. `duration` is
    /// clamped to 40..=6000 ms and `gap` raised to at least 30 ms. An empty
    /// `tones` cancels whatever had not started yet.
    pub fn insert_dtmf(
        &mut self,
        tones: &str,
        duration: Duration,
        gap: Duration,
        now: Instant,
    ) -> Result<()> {
        let mut buffer = VecDeque::with_capacity(tones.len());
        for c in tones.chars() {
            let tone = c.to_ascii_uppercase();
            if !DTMF_VALID_TONES.contains(tone) {
                return Err(Error::ErrInvalidDtmfTone(c));
            }
            buffer.push_back(tone);
        }

        self.tone_buffer = buffer;
        self.duration = duration.clamp(DTMF_MIN_DURATION, DTMF_MAX_DURATION);
        self.gap = gap.max(DTMF_MIN_GAP);
        if !self.tone_buffer.is_empty() && self.next_tone_at.is_none() {
            self.next_tone_at = Some(now);
        }
        Ok(())
    }

    /// Tones not played yet.
    pub fn tone_buffer(&self) -> String {
        self.tone_buffer.iter().collect()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn gap(&self) -> Duration {
        self.gap
    }

    pub fn handle_timeout(&mut self, now: Instant) {
        while let Some(at) = self.next_tone_at {
            if at > now {
                break;
            }

            match self.tone_buffer.pop_front() {
                None => {
                    self.next_tone_at = None;
                    self.events.push_back(RTCDtmfToneChangeEvent::default());
                }
                Some(',') => {
                    self.next_tone_at = Some(at + DTMF_COMMA_DELAY);
                    self.events.push_back(RTCDtmfToneChangeEvent {
                        tone: ",".to_owned(),
                    });
                }
                Some(tone) => {
                    self.next_tone_at = Some(at + self.duration + self.gap);
                    self.tones.push_back(RTCDtmfTone {
                        tone,
                        duration: self.duration,
                    });
                    self.events.push_back(RTCDtmfToneChangeEvent {
                        tone: tone.to_string(),
                    });
                }
            }
        }
    }

    pub fn poll_timeout(&self) -> Option<Instant> {
        self.next_tone_at
    }

    pub fn poll_tone(&mut self) -> Option<RTCDtmfTone> {
        self.tones.pop_front()
    }

    pub fn poll_event(&mut self) -> Option<RTCDtmfToneChangeEvent> {
        self.events.pop_front()
    }
}
