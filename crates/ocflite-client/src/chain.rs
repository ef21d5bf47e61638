use ocflite::representation::{Representation, Value};
use ocflite::resource::ResourceHandle;
use ocflite::status::Status;

use tracing::{debug, error, info, warn};

use crate::scheduler::TimerHandle;
use crate::transport::{Method, ObserveAction, Token};

/// An update request sent by the chain before observing.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStep {
    /// Request method.
    pub method: Method,
    /// Request body.
    pub body: Representation,
}

/// The update requests sent to a resource between its first read and its
/// observation.
///
/// The default script drives a light: it turns it on at power 15 with a
/// `PUT`, off at power 105 with a `POST`, and finally on at power 55 with
/// another `POST`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserveScript {
    steps: Vec<UpdateStep>,
}

impl Default for ObserveScript {
    fn default() -> Self {
        Self::empty()
            .step(Method::Put, light_state(true, 15))
            .step(Method::Post, light_state(false, 105))
            .step(Method::Post, light_state(true, 55))
    }
}

impl ObserveScript {
    /// Creates an [`ObserveScript`] observing right after the first read.
    #[must_use]
    #[inline]
    pub const fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// Appends an update step.
    #[must_use]
    #[inline]
    pub fn step(mut self, method: Method, body: Representation) -> Self {
        self.steps.push(UpdateStep { method, body });
        self
    }

    /// Returns the update steps.
    #[must_use]
    pub fn steps(&self) -> &[UpdateStep] {
        &self.steps
    }

    /// Returns the number of update steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Checks whether the script has no update steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn light_state(state: bool, power: i64) -> Representation {
    let mut body = Representation::new();
    for (name, value) in [("state", Value::Bool(state)), ("power", Value::Int(power))] {
        if let Err(e) = body.insert(name, value) {
            error!("Impossible to add `{name}` to a light update: {e}");
        }
    }
    body
}

/// Actions scheduled on the engine time base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayedAction {
    /// Stops the observation of the chained resource.
    StopObserve,
}

/// Why an observation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum StopReason {
    /// The observation delay elapsed.
    Expired,
    /// The foreground asked to stop.
    Requested,
    /// The device answered without an observe sequence number.
    Refused,
}

/// The progress of an [`ObserveChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// Waiting for the response to the first read.
    AwaitingRead,
    /// Waiting for the response to the update step at the given index.
    Updating(usize),
    /// The resource is observed.
    Observing,
    /// The chain is over.
    Stopped,
}

/// A request the engine sends on behalf of an [`ObserveChain`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRequest {
    /// Position in the chain: `0` is the first read, update steps follow.
    pub index: usize,
    /// Request method.
    pub method: Method,
    /// Request body.
    pub body: Option<Representation>,
    /// Observe option.
    pub observe: Option<ObserveAction>,
}

impl ChainRequest {
    const fn observe(index: usize, action: ObserveAction) -> Self {
        Self {
            index,
            method: Method::Get,
            body: None,
            observe: Some(action),
        }
    }
}

/// What an [`ObserveChain`] does with a response.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainProgress {
    /// The chain does not wait for this response.
    Ignored,
    /// The chain goes on with the given request.
    Next(ChainRequest),
    /// The response ended the chain.
    Ended,
}

/// What is left to clean up once an [`ObserveChain`] is stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct StoppedChain {
    /// Token of the request still waiting for its response.
    pub step: Option<Token>,
    /// The running observation, with the request deregistering it.
    pub observation: Option<(ChainRequest, Observation)>,
}

/// A running observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Token of the observe registration.
    pub token: Token,
    /// Delayed callback stopping the observation.
    pub timer: Option<TimerHandle>,
}

/// The scripted interaction with a discovered resource.
///
/// The chain starts with the read issued when the resource is discovered. It
/// then runs the update steps of its [`ObserveScript`] one response at a
/// time, and observes the resource until the observation is stopped.
///
/// A single request is outstanding at a time: the chain only accepts the
/// response carrying the token recorded with [`ObserveChain::sent`].
///
/// A read answered with an error status ends the chain. An update answered
/// with any status other than `CHANGED` or `CREATED` is logged and the chain
/// goes on.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserveChain {
    resource: ResourceHandle,
    script: ObserveScript,
    state: ChainState,
    step: Option<Token>,
    observation: Option<Observation>,
}

impl ObserveChain {
    /// Creates an [`ObserveChain`] on a resource.
    #[must_use]
    pub const fn new(resource: ResourceHandle, script: ObserveScript) -> Self {
        Self {
            resource,
            script,
            state: ChainState::AwaitingRead,
            step: None,
            observation: None,
        }
    }

    /// Returns the chained resource.
    #[must_use]
    pub const fn resource(&self) -> &ResourceHandle {
        &self.resource
    }

    /// Returns the chain progress.
    #[must_use]
    pub const fn state(&self) -> ChainState {
        self.state
    }

    /// Returns the running observation.
    #[must_use]
    pub const fn observation(&self) -> Option<&Observation> {
        self.observation.as_ref()
    }

    /// Returns the token of the request waiting for its response.
    #[must_use]
    pub const fn step(&self) -> Option<Token> {
        self.step
    }

    /// Records the token of the request just sent for the current step.
    pub fn sent(&mut self, token: Token) {
        self.step = Some(token);
    }

    /// Handles the response to the request at `index`.
    ///
    /// Responses whose token is not the one of the outstanding request, or
    /// whose index is not the awaited one, are ignored.
    pub fn on_response(&mut self, token: Token, index: usize, status: Status) -> ChainProgress {
        let expected = match self.state {
            ChainState::AwaitingRead => 0,
            ChainState::Updating(step) => step + 1,
            ChainState::Observing | ChainState::Stopped => {
                debug!("Chain on `{}` ignores response {index}", self.resource.uri);
                return ChainProgress::Ignored;
            }
        };
        if self.step != Some(token) || index != expected {
            debug!(
                "Chain on `{}` waits for response {expected}, ignores {index} ({token})",
                self.resource.uri
            );
            return ChainProgress::Ignored;
        }
        self.step = None;

        if index == 0 {
            if !status.is_success() {
                warn!("GET `{}` failed with {status}, chain ended", self.resource.uri);
                self.state = ChainState::Stopped;
                return ChainProgress::Ended;
            }
            info!("GET `{}` succeeded with {status}", self.resource.uri);
        } else {
            match status {
                Status::Changed | Status::Created => {
                    info!("Update {index} of `{}` succeeded with {status}", self.resource.uri);
                }
                _ => warn!(
                    "Update {index} of `{}` answered {status}, chain goes on",
                    self.resource.uri
                ),
            }
        }

        ChainProgress::Next(self.next(index))
    }

    fn next(&mut self, completed: usize) -> ChainRequest {
        match self.script.steps().get(completed) {
            Some(step) => {
                self.state = ChainState::Updating(completed);
                ChainRequest {
                    index: completed + 1,
                    method: step.method,
                    body: Some(step.body.clone()),
                    observe: None,
                }
            }
            None => {
                self.state = ChainState::Observing;
                ChainRequest::observe(completed + 1, ObserveAction::Register)
            }
        }
    }

    /// Records the observation registered by the engine.
    pub fn observing(&mut self, observation: Observation) {
        self.observation = Some(observation);
    }

    /// Stops the chain, returning what is left to clean up.
    ///
    /// Returns [`None`] when the chain was already over.
    pub fn stop(&mut self) -> Option<StoppedChain> {
        if self.state == ChainState::Stopped {
            return None;
        }
        self.state = ChainState::Stopped;

        let observation = self.observation.take().map(|observation| {
            (
                ChainRequest::observe(self.script.len() + 1, ObserveAction::Deregister),
                observation,
            )
        });
        Some(StoppedChain {
            step: self.step.take(),
            observation,
        })
    }
}

#[cfg(test)]
mod tests {
    use ocflite::endpoint::{Endpoint, EndpointList, TransportFlags};
    use ocflite::representation::Representation;
    use ocflite::resource::ResourceHandle;
    use ocflite::status::Status;

    use crate::transport::{Method, ObserveAction, Token};

    use super::{ChainProgress, ChainRequest, ChainState, ObserveChain, ObserveScript, Observation};

    fn light() -> ResourceHandle {
        ResourceHandle::new(
            "ocf://light",
            "/a/light",
            EndpointList::from_endpoints([Endpoint::ipv4(
                [10, 0, 0, 2],
                5683,
                TransportFlags::empty(),
            )]),
        )
        .resource_type("core.light")
    }

    fn power(power: i64) -> Representation {
        let mut body = Representation::new();
        body.insert("power", power).unwrap();
        body
    }

    fn token(id: u8) -> Token {
        Token::new([id; 8])
    }

    // Sends the request for the current step under the given token.
    fn respond(chain: &mut ObserveChain, id: u8, index: usize, status: Status) -> ChainProgress {
        chain.sent(token(id));
        chain.on_response(token(id), index, status)
    }

    fn next(progress: ChainProgress) -> ChainRequest {
        match progress {
            ChainProgress::Next(request) => request,
            progress => panic!("Unexpected {progress:?}"),
        }
    }

    #[test]
    fn default_script() {
        let script = ObserveScript::default();
        let methods: Vec<_> = script.steps().iter().map(|step| step.method).collect();
        assert_eq!(methods, [Method::Put, Method::Post, Method::Post]);

        let last = &script.steps()[2].body;
        assert_eq!(last.get_bool("state"), Some(true));
        assert_eq!(last.get_int("power"), Some(55));

        assert!(ObserveScript::empty().is_empty());
    }

    #[test]
    fn full_chain() {
        let script = ObserveScript::empty()
            .step(Method::Put, power(15))
            .step(Method::Post, power(55));
        let mut chain = ObserveChain::new(light(), script);

        let put = next(respond(&mut chain, 1, 0, Status::Ok));
        assert_eq!((put.index, put.method), (1, Method::Put));
        assert_eq!(put.body, Some(power(15)));
        assert_eq!(chain.state(), ChainState::Updating(0));
        assert_eq!(chain.step(), None);

        let post = next(respond(&mut chain, 2, 1, Status::Changed));
        assert_eq!((post.index, post.method), (2, Method::Post));

        let observe = next(respond(&mut chain, 3, 2, Status::Created));
        assert_eq!(observe.index, 3);
        assert_eq!(observe.observe, Some(ObserveAction::Register));
        assert_eq!(chain.state(), ChainState::Observing);
    }

    #[test]
    fn failed_read_ends_chain() {
        let mut chain = ObserveChain::new(light(), ObserveScript::default());

        assert_eq!(respond(&mut chain, 1, 0, Status::NotFound), ChainProgress::Ended);
        assert_eq!(chain.state(), ChainState::Stopped);
        assert_eq!(respond(&mut chain, 2, 1, Status::Changed), ChainProgress::Ignored);
        assert_eq!(chain.stop(), None);
    }

    #[test]
    fn failed_update_goes_on() {
        let script = ObserveScript::empty().step(Method::Post, power(55));
        let mut chain = ObserveChain::new(light(), script);

        let _post = next(respond(&mut chain, 1, 0, Status::Ok));
        let observe = next(respond(&mut chain, 2, 1, Status::Forbidden));
        assert_eq!(observe.observe, Some(ObserveAction::Register));
    }

    #[test]
    fn stale_responses_ignored() {
        let mut chain = ObserveChain::new(light(), ObserveScript::default());
        chain.sent(token(1));

        // Wrong index.
        assert_eq!(chain.on_response(token(1), 2, Status::Changed), ChainProgress::Ignored);
        // Wrong token.
        assert_eq!(chain.on_response(token(7), 0, Status::NotFound), ChainProgress::Ignored);
        assert_eq!(chain.state(), ChainState::AwaitingRead);
        assert_eq!(chain.step(), Some(token(1)));

        let _put = next(chain.on_response(token(1), 0, Status::Ok));
        assert_eq!(chain.on_response(token(1), 0, Status::Ok), ChainProgress::Ignored);
    }

    #[test]
    fn stop_observation() {
        let mut chain = ObserveChain::new(light(), ObserveScript::empty());
        let _observe = next(respond(&mut chain, 1, 0, Status::Ok));

        let observation = Observation {
            token: token(9),
            timer: None,
        };
        chain.observing(observation);
        assert_eq!(chain.observation(), Some(&observation));

        let stopped = chain.stop().unwrap();
        assert_eq!(stopped.step, None);
        let (request, stopped) = stopped.observation.unwrap();
        assert_eq!(request.observe, Some(ObserveAction::Deregister));
        assert_eq!(stopped, observation);
        assert_eq!(chain.state(), ChainState::Stopped);

        // Exactly once.
        assert_eq!(chain.stop(), None);
    }

    #[test]
    fn stop_before_observing() {
        let mut chain = ObserveChain::new(light(), ObserveScript::default());
        chain.sent(token(1));

        let stopped = chain.stop().unwrap();
        assert_eq!(stopped.step, Some(token(1)));
        assert_eq!(stopped.observation, None);
        assert_eq!(chain.state(), ChainState::Stopped);

        assert_eq!(chain.on_response(token(1), 0, Status::Ok), ChainProgress::Ignored);
        assert_eq!(chain.stop(), None);
    }
}
