//! Session and endpoint state types.
//!
//! - **[`NegotiationState`]** - progress of the two-endpoint session (idle, offering, ...)
//! - **[`RTCSignalingState`]** - offer/answer progress of one endpoint (stable, have-local-offer, ...)
//! - **[`EndpointState`]** - readiness of one endpoint's channel or sender (new, open, closed)
//!
//! Every state converts to and from its lower-case string form:
//!
//! ```
//! use rtc_session::state::{EndpointState, NegotiationState, RTCSignalingState};
//!
//! assert_eq!(NegotiationState::NegotiationFailed.to_string(), "negotiation-failed");
//!
//! let state: RTCSignalingState = "have-local-offer".into();
//! assert_eq!(state, RTCSignalingState::HaveLocalOffer);
//!
//! let state: EndpointState = "open".into();
//! assert_eq!(state, EndpointState::Open);
//! ```

pub(crate) mod endpoint_state;
pub(crate) mod negotiation_state;
pub(crate) mod signaling_state;

pub use endpoint_state::EndpointState;
pub use negotiation_state::NegotiationState;
pub use signaling_state::{RTCSignalingState, StateChangeOp};
