//! Text transforms over SDP-like session description bodies.
//!
//! The codec never interprets a body beyond its line structure: it splits
//! the body into a session section and media sections ([`lines`]), finds
//! lines by their type prefix and splices in, rewrites, or drops
//! bandwidth-constraint lines ([`bandwidth`]). Every transform returns a new
//! body; inputs are never modified.

#![warn(rust_2018_idioms)]

pub mod bandwidth;
pub mod lines;

pub use bandwidth::{
    BandwidthConstraint, BandwidthModifier, TransportFamily, apply_bandwidth, parse_bandwidth,
    remove_bandwidth, select_modifier,
};
pub use lines::{LineEnding, SdpDocument, SdpLine, SdpSection};
