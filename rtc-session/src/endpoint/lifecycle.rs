use std::collections::HashMap;

use shared::error::{Error, Result};

use super::{Endpoint, EndpointConfig, EndpointId};
use crate::state::{EndpointState, RTCSignalingState};

pub type OnStateChangeHdlrFn = Box<dyn FnMut(EndpointId, EndpointState) + Send>;

/// Creates, observes and closes the two endpoints of a call.
///
/// The first endpoint created is the offerer, the second the answerer.
/// Observers registered on an endpoint are invoked exactly once per
/// transition, in registration order, and released when the endpoint closes.
#[derive(Default)]
pub struct EndpointLifecycle {
    endpoints: Vec<Endpoint>,
    observers: HashMap<EndpointId, Vec<OnStateChangeHdlrFn>>,
}

impl EndpointLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, config: EndpointConfig) -> Result<EndpointId> {
        let id = match self.endpoints.len() {
            0 => EndpointId::Offerer,
            1 => EndpointId::Answerer,
            _ => return Err(Error::ErrEndpointLimitReached),
        };
        log::debug!("Created {id} endpoint {}", config.label);
        self.endpoints.push(Endpoint::new(id, config));
        Ok(id)
    }

    pub fn observe_state_change(&mut self, id: EndpointId, f: OnStateChangeHdlrFn) -> Result<()> {
        self.get(id)?;
        self.observers.entry(id).or_default().push(f);
        Ok(())
    }

    /// The endpoint, unless it was never created or is already closed.
    pub fn get(&self, id: EndpointId) -> Result<&Endpoint> {
        let endpoint = self.find(id).ok_or(Error::ErrUnknownEndpoint)?;
        if endpoint.state() == EndpointState::Closed {
            Err(Error::ErrEndpointClosed)
        } else {
            Ok(endpoint)
        }
    }

    pub(crate) fn get_mut(&mut self, id: EndpointId) -> Result<&mut Endpoint> {
        let endpoint = self
            .endpoints
            .iter_mut()
            .find(|e| e.id() == id)
            .ok_or(Error::ErrUnknownEndpoint)?;
        if endpoint.state() == EndpointState::Closed {
            Err(Error::ErrEndpointClosed)
        } else {
            Ok(endpoint)
        }
    }

    /// The endpoint in any state, including closed.
    pub fn find(&self, id: EndpointId) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Applies a state reported by the transport. Returns whether observers
    /// heard about it; repeated or backward reports are ignored.
    pub fn transition(&mut self, id: EndpointId, next: EndpointState) -> Result<bool> {
        let endpoint = self
            .endpoints
            .iter_mut()
            .find(|e| e.id() == id)
            .ok_or(Error::ErrUnknownEndpoint)?;
        if !endpoint.state().can_transition_to(next) {
            log::trace!(
                "{} ignoring state change {} -> {next}",
                endpoint.label(),
                endpoint.state()
            );
            return Ok(false);
        }

        log::debug!("{} state change: {next}", endpoint.label());
        endpoint.set_state(next);
        if next == EndpointState::Closed {
            endpoint.release();
        }
        self.notify(id, next);
        if next == EndpointState::Closed {
            self.observers.remove(&id);
        }
        Ok(true)
    }

    /// Releases the endpoint's descriptions and queued candidates.
    pub fn close(&mut self, id: EndpointId) -> Result<()> {
        self.get(id)?;
        self.transition(id, EndpointState::Closed)?;
        Ok(())
    }

    /// Closes every endpoint still open, returning those that transitioned.
    pub fn close_all(&mut self) -> Vec<EndpointId> {
        let open: Vec<EndpointId> = self
            .endpoints
            .iter()
            .filter(|e| e.state() != EndpointState::Closed)
            .map(|e| e.id())
            .collect();

        open.into_iter()
            .filter(|id| matches!(self.transition(*id, EndpointState::Closed), Ok(true)))
            .collect()
    }

    pub fn signaling_state(&self, id: EndpointId) -> RTCSignalingState {
        self.find(id)
            .map(|e| e.signaling_state())
            .unwrap_or(RTCSignalingState::Unspecified)
    }

    fn notify(&mut self, id: EndpointId, state: EndpointState) {
        if let Some(observers) = self.observers.get_mut(&id) {
            for f in observers.iter_mut() {
                f(id, state);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn config(label: &str) -> EndpointConfig {
        EndpointConfig {
            label: label.to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_assigns_roles() -> Result<()> {
        let mut lifecycle = EndpointLifecycle::new();
        assert!(lifecycle.is_empty());

        assert_eq!(lifecycle.create(config("pc1"))?, EndpointId::Offerer);
        assert_eq!(lifecycle.create(config("pc2"))?, EndpointId::Answerer);
        assert_eq!(
            lifecycle.create(config("pc3")),
            Err(Error::ErrEndpointLimitReached)
        );

        assert_eq!(lifecycle.get(EndpointId::Offerer)?.label(), "pc1");
        assert_eq!(lifecycle.get(EndpointId::Answerer)?.label(), "pc2");
        Ok(())
    }

    #[test]
    fn test_unknown_endpoint() {
        let mut lifecycle = EndpointLifecycle::new();
        assert!(matches!(
            lifecycle.get(EndpointId::Offerer),
            Err(Error::ErrUnknownEndpoint)
        ));
        assert_eq!(
            lifecycle.transition(EndpointId::Answerer, EndpointState::Open),
            Err(Error::ErrUnknownEndpoint)
        );
    }

    #[test]
    fn test_observers_fire_once_per_transition() -> Result<()> {
        let seen = Arc::new(Mutex::new(vec![]));
        let mut lifecycle = EndpointLifecycle::new();
        let id = lifecycle.create(config("pc1"))?;

        for observer in ["first", "second"] {
            let seen = Arc::clone(&seen);
            lifecycle.observe_state_change(
                id,
                Box::new(move |id, state| {
                    if let Ok(mut seen) = seen.lock() {
                        seen.push((observer, id, state));
                    }
                }),
            )?;
        }

        let tests = vec![
            (EndpointState::Open, true),
            (EndpointState::Open, false),
            (EndpointState::New, false),
            (EndpointState::Closed, true),
            (EndpointState::Closed, false),
        ];
        for (state, fired) in tests {
            assert_eq!(lifecycle.transition(id, state)?, fired, "{state}");
        }

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ("first", id, EndpointState::Open),
                ("second", id, EndpointState::Open),
                ("first", id, EndpointState::Closed),
                ("second", id, EndpointState::Closed),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_close_releases_endpoint() -> Result<()> {
        let mut lifecycle = EndpointLifecycle::new();
        let id = lifecycle.create(config("pc1"))?;
        lifecycle.get_mut(id)?.pending_candidates.push_back(None);

        lifecycle.close(id)?;
        assert!(matches!(lifecycle.get(id), Err(Error::ErrEndpointClosed)));
        assert_eq!(lifecycle.close(id), Err(Error::ErrEndpointClosed));
        assert!(matches!(
            lifecycle.observe_state_change(id, Box::new(|_, _| {})),
            Err(Error::ErrEndpointClosed)
        ));

        let endpoint = lifecycle.find(id).unwrap();
        assert_eq!(endpoint.state(), EndpointState::Closed);
        assert_eq!(endpoint.signaling_state(), RTCSignalingState::Closed);
        assert_eq!(endpoint.pending_candidates(), 0);
        Ok(())
    }

    #[test]
    fn test_close_all() -> Result<()> {
        let mut lifecycle = EndpointLifecycle::new();
        let offerer = lifecycle.create(config("pc1"))?;
        let answerer = lifecycle.create(config("pc2"))?;
        lifecycle.close(answerer)?;

        assert_eq!(lifecycle.close_all(), vec![offerer]);
        assert!(lifecycle.close_all().is_empty());
        Ok(())
    }
}
