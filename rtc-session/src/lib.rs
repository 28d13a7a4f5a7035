//! # RTC Session - Sans-I/O Loopback Call Negotiation
//!
//! Drives two endpoints of one process through a WebRTC-style offer/answer
//! exchange, relays their trickled ICE candidates, and lets the caller cap
//! the offerer's send bandwidth by rewriting the session description it
//! receives.
//!
//! The crate performs no I/O. [`negotiation::NegotiationSession`] emits
//! [`transport::TransportCommand`]s and consumes the matching
//! [`transport::TransportReply`]s; anything that can carry them out (a real
//! media stack, or the in-process [`driver::simulated::SimulatedTransport`])
//! plugs in underneath.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rtc_session::configuration::{BandwidthLimit, CallConfigurationBuilder, MediaKind};
//! use rtc_session::driver::{run_until_idle, simulated::SimulatedTransport};
//! use rtc_session::negotiation::NegotiationSession;
//!
//! # async fn example() -> shared::error::Result<()> {
//! let config = CallConfigurationBuilder::new()
//!     .with_media(MediaKind::Video)
//!     .with_bandwidth_limit(BandwidthLimit::Kbps(500))
//!     .build();
//!
//! let mut session = NegotiationSession::new();
//! let mut transport = SimulatedTransport::new();
//!
//! session.start_call(config)?;
//! run_until_idle(&mut session, &mut transport).await?;
//!
//! // cap the call at 125 kbps instead
//! session.renegotiate(BandwidthLimit::Kbps(125))?;
//! run_until_idle(&mut session, &mut transport).await?;
//!
//! session.hangup()?;
//! run_until_idle(&mut session, &mut transport).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`negotiation`] - the session state machine
//! - [`relay`] - trickled candidate hand-over between the endpoints
//! - [`endpoint`] - endpoint creation, observation and teardown
//! - [`transport`] - commands, replies and notifications exchanged with a transport
//! - [`driver`] - async [`driver::Transport`] trait and run loop
//! - [`dtmf`] / [`stats`] - DTMF tone scheduling and outbound bitrate sampling
//! - [`transfer`] - chunked bulk transfer over the data channel

#![warn(rust_2018_idioms)]

pub mod configuration;
pub mod driver;
pub mod dtmf;
pub mod endpoint;
pub mod event;
pub mod negotiation;
pub mod relay;
pub mod sdp;
pub mod state;
pub mod stats;
pub mod transfer;
pub mod transport;
