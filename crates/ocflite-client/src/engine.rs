use ocflite::ace::AccessControlEntry;
use ocflite::codec::RepBuffer;
use ocflite::endpoint::EndpointList;
use ocflite::identity::DeviceId;
use ocflite::representation::Representation;
use ocflite::resource::ResourceHandle;

use bytes::Bytes;

use tokio::sync::oneshot;

use tracing::{debug, error, info, warn};

use crate::chain::{
    ChainProgress, ChainRequest, DelayedAction, ObserveChain, ObserveScript, Observation,
    StopReason,
};
use crate::config::ClientConfig;
use crate::discovery::{DiscoveryActions, DiscoveryDispatcher, DiscoveryFlow};
use crate::error::{Error, ErrorKind, Result};
use crate::events::ClientEvent;
use crate::provisioning::Provisioner;
use crate::registry::DeviceRegistry;
use crate::request::{PendingOperation, PendingRequests};
use crate::response::{ClientResponse, InboundEvent};
use crate::scheduler::Scheduler;
use crate::transport::{Method, ObserveAction, Onboarding, OutboundRequest, Qos, Token, Transport};

// A foreground command.
#[derive(Debug)]
pub(crate) enum CommandKind {
    DiscoverResource(String),
    DiscoverUnowned,
    DiscoverOwned,
    TakeOwnership(DeviceId),
    ProvisionCredentials(DeviceId, DeviceId),
    ProvisionAce(DeviceId, Box<AccessControlEntry>),
    ResetDevice(DeviceId),
    StopObserve,
}

// A foreground command with the channel acknowledging its dispatch.
#[derive(Debug)]
pub(crate) struct Command {
    pub(crate) kind: CommandKind,
    pub(crate) ack: oneshot::Sender<Result<()>>,
}

// The running discovery.
struct ActiveDiscovery {
    token: Token,
    dispatcher: DiscoveryDispatcher,
}

// The collaborators a discovery dispatcher acts upon.
struct DiscoveryLink<'a, T: Transport> {
    transport: &'a mut T,
    pending: &'a mut PendingRequests,
    // Token of the read sent to the matched resource.
    sent: Option<Token>,
}

impl<T: Transport> DiscoveryActions for DiscoveryLink<'_, T> {
    fn request_resource(&mut self, resource: &ResourceHandle, qos: Qos) -> Result<()> {
        let endpoint = *resource.endpoints.first().ok_or_else(|| {
            Error::new(
                ErrorKind::Transport,
                format!("Resource `{}` has no endpoints.", resource.uri),
            )
        })?;

        let token = self.pending.register(PendingOperation::ChainStep {
            method: Method::Get,
            index: 0,
        });
        let request = OutboundRequest::unicast(token, Method::Get, endpoint, &resource.uri, qos);
        if let Err(e) = self.transport.send(request) {
            let _operation = self.pending.remove(token);
            return Err(e);
        }
        self.sent = Some(token);
        Ok(())
    }

    fn release_endpoints(&mut self, endpoints: EndpointList) {
        self.transport.free_endpoints(endpoints);
    }
}

// The synchronous core of the client engine.
//
// Time is given in ticks by the worker driving the engine.
pub(crate) struct Engine<T: Transport, O: Onboarding> {
    transport: T,
    onboarding: O,
    pending: PendingRequests,
    scheduler: Scheduler<DelayedAction>,
    provisioner: Provisioner,
    discovery: Option<ActiveDiscovery>,
    chain: Option<ObserveChain>,
    buffer: RepBuffer,
    qos: Qos,
    script: ObserveScript,
    stop_observe_delay: u64,
    events: flume::Sender<ClientEvent>,
}

impl<T: Transport, O: Onboarding> Engine<T, O> {
    pub(crate) fn new(
        config: &ClientConfig,
        transport: T,
        onboarding: O,
        registry: DeviceRegistry,
        events: flume::Sender<ClientEvent>,
    ) -> Self {
        Self {
            transport,
            onboarding,
            pending: PendingRequests::new(),
            scheduler: Scheduler::new(),
            provisioner: Provisioner::new(registry),
            discovery: None,
            chain: None,
            buffer: RepBuffer::new(config.payload_capacity),
            qos: config.qos,
            script: config.script.clone(),
            stop_observe_delay: config.stop_observe_delay,
            events,
        }
    }

    pub(crate) fn handle_command(&mut self, now: u64, command: CommandKind) -> Result<()> {
        debug!("Command {command:?} at tick {now}");
        match command {
            CommandKind::DiscoverResource(resource_type) => self.discover(resource_type),
            CommandKind::DiscoverUnowned => self.onboarding.discover_unowned(),
            CommandKind::DiscoverOwned => self.onboarding.discover_owned(),
            CommandKind::TakeOwnership(device) => {
                self.provisioner.take_ownership(&mut self.onboarding, device)
            }
            CommandKind::ProvisionCredentials(first, second) => {
                self.provisioner
                    .provision_credentials(&mut self.onboarding, first, second)
            }
            CommandKind::ProvisionAce(device, ace) => {
                self.provisioner
                    .provision_ace(&mut self.onboarding, device, &ace)
            }
            CommandKind::ResetDevice(device) => {
                self.provisioner.reset_device(&mut self.onboarding, device)
            }
            CommandKind::StopObserve => {
                if !self.stop_observe(StopReason::Requested) {
                    info!("No chain to stop");
                }
                Ok(())
            }
        }
    }

    pub(crate) fn handle_inbound(&mut self, now: u64, event: InboundEvent) {
        match event {
            InboundEvent::Onboarding(event) => {
                for event in self.provisioner.apply(event) {
                    self.emit(event);
                }
            }
            InboundEvent::Response(response) => self.handle_response(now, response),
        }
    }

    pub(crate) fn fire_timers(&mut self, now: u64) {
        for (handle, action) in self.scheduler.expired(now) {
            debug!("Run {action:?} of timer {handle:?}");
            match action {
                DelayedAction::StopObserve => {
                    if !self.stop_observe(StopReason::Expired) {
                        debug!("Observation already stopped");
                    }
                }
            }
        }
    }

    pub(crate) fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    // Drops every delayed callback and pending request without running them.
    pub(crate) fn shutdown(&mut self) {
        let timers = self.scheduler.clear();
        let requests = self.pending.clear();
        self.discovery = None;
        self.chain = None;
        info!("Engine stopped, {timers} delayed callbacks and {requests} requests dropped");
    }

    fn discover(&mut self, resource_type: String) -> Result<()> {
        if let Some(previous) = self.discovery.take() {
            debug!(
                "Discovery of `{}` replaced",
                previous.dispatcher.resource_type()
            );
            let _operation = self.pending.remove(previous.token);
        }

        let token = self.pending.register(PendingOperation::Discovery);
        let request = OutboundRequest::discovery(token, Some(&resource_type));
        if let Err(e) = self.transport.send(request) {
            let _operation = self.pending.remove(token);
            return Err(e);
        }

        info!("Discovering resources of type `{resource_type}`");
        self.discovery = Some(ActiveDiscovery {
            token,
            dispatcher: DiscoveryDispatcher::new(resource_type),
        });
        Ok(())
    }

    fn handle_response(&mut self, now: u64, response: ClientResponse) {
        let Some(operation) = self.pending.correlate(response.token, response.observe) else {
            debug!("Response for unknown token {} dropped", response.token);
            return;
        };

        match operation {
            PendingOperation::Discovery => self.handle_discovery(response),
            PendingOperation::ChainStep { method, index } => {
                self.handle_chain_step(now, method, index, &response);
            }
            PendingOperation::Observe => self.handle_notification(&response),
        }
    }

    fn handle_discovery(&mut self, response: ClientResponse) {
        let Some(discovery) = self
            .discovery
            .as_mut()
            .filter(|discovery| discovery.token == response.token)
        else {
            debug!("Discovery response {} without discovery", response.token);
            return;
        };

        let payload = match response.decode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Discovery response discarded: {e}");
                return;
            }
        };

        let mut link = DiscoveryLink {
            transport: &mut self.transport,
            pending: &mut self.pending,
            sent: None,
        };
        if discovery.dispatcher.on_payload(&payload, &mut link) == DiscoveryFlow::Continue {
            return;
        }
        let read = link.sent;

        let Some(discovery) = self.discovery.take() else {
            return;
        };
        let _operation = self.pending.remove(discovery.token);
        let Some(resource) = discovery.dispatcher.matched().cloned() else {
            return;
        };

        if self.chain.is_some() && !self.stop_observe(StopReason::Requested) {
            debug!("Previous chain dropped");
        }
        self.chain = match read {
            Some(token) => {
                let mut chain = ObserveChain::new(resource.clone(), self.script.clone());
                chain.sent(token);
                Some(chain)
            }
            None => {
                warn!("No read sent to `{}`, chain not started", resource.uri);
                None
            }
        };
        self.emit(ClientEvent::ResourceDiscovered(resource));
    }

    fn handle_chain_step(
        &mut self,
        now: u64,
        method: Method,
        index: usize,
        response: &ClientResponse,
    ) {
        let Some(chain) = self.chain.as_mut() else {
            debug!("Chained response {index} without chain");
            return;
        };

        match chain.on_response(response.token, index, response.status) {
            ChainProgress::Ignored => return,
            ChainProgress::Next(request) => {
                if let Err(e) = self.send_chain_request(now, request) {
                    error!("Impossible to send the next chained request: {e}");
                }
            }
            ChainProgress::Ended => {}
        }

        self.emit(ClientEvent::ChainResponse {
            index,
            method,
            status: response.status,
            representation: representation(response),
        });
    }

    fn handle_notification(&mut self, response: &ClientResponse) {
        match response.observe {
            Some(sequence) => self.emit(ClientEvent::Notification {
                sequence,
                status: response.status,
                representation: representation(response),
            }),
            None => {
                warn!("Observation ended by the device with {}", response.status);
                if !self.stop_observe(StopReason::Refused) {
                    debug!("Observation already stopped");
                }
            }
        }
    }

    fn send_chain_request(&mut self, now: u64, request: ChainRequest) -> Result<()> {
        let Some(chain) = self.chain.as_ref() else {
            return Err(Error::new(ErrorKind::Transport, "No chained resource."));
        };
        let resource = chain.resource();
        let endpoint = *resource.endpoints.first().ok_or_else(|| {
            Error::new(
                ErrorKind::Transport,
                format!("Resource `{}` has no endpoints.", resource.uri),
            )
        })?;

        let payload = match &request.body {
            Some(body) => {
                let _len = self.buffer.encode(body)?;
                Bytes::copy_from_slice(self.buffer.as_bytes())
            }
            None => Bytes::new(),
        };

        let operation = match request.observe {
            Some(_) => PendingOperation::Observe,
            None => PendingOperation::ChainStep {
                method: request.method,
                index: request.index,
            },
        };
        let token = self.pending.register(operation);

        let mut outbound =
            OutboundRequest::unicast(token, request.method, endpoint, &resource.uri, self.qos)
                .payload(payload);
        if let Some(action) = request.observe {
            outbound = outbound.observe(action);
        }

        info!("{} `{}` (step {})", request.method, resource.uri, request.index);
        if let Err(e) = self.transport.send(outbound) {
            let _operation = self.pending.remove(token);
            return Err(e);
        }

        let Some(chain) = self.chain.as_mut() else {
            return Ok(());
        };
        if request.observe == Some(ObserveAction::Register) {
            let timer = self
                .scheduler
                .schedule(now, self.stop_observe_delay, DelayedAction::StopObserve);
            chain.observing(Observation {
                token,
                timer: Some(timer),
            });
        } else {
            chain.sent(token);
        }
        Ok(())
    }

    // Stops the running chain, returning whether it was still running.
    //
    // The outstanding chained request is forgotten, so its response is
    // dropped as unknown.
    fn stop_observe(&mut self, reason: StopReason) -> bool {
        let Some(chain) = self.chain.as_mut() else {
            return false;
        };
        let Some(stopped) = chain.stop() else {
            return false;
        };

        if let Some(token) = stopped.step
            && self.pending.remove(token).is_some()
        {
            debug!("Chained request {token} abandoned");
        }

        if let Some((request, observation)) = stopped.observation {
            if reason != StopReason::Expired
                && let Some(timer) = observation.timer
                && self.scheduler.cancel(timer).is_none()
            {
                debug!("Timer {timer:?} already fired");
            }
            let _operation = self.pending.remove(observation.token);

            if reason != StopReason::Refused {
                let resource = chain.resource();
                if let Some(&endpoint) = resource.endpoints.first() {
                    let outbound = OutboundRequest::unicast(
                        observation.token,
                        request.method,
                        endpoint,
                        &resource.uri,
                        self.qos,
                    )
                    .observe(ObserveAction::Deregister);
                    if let Err(e) = self.transport.send(outbound) {
                        warn!("Impossible to deregister the observation: {e}");
                    }
                }
            }
        }

        info!("Observation stopped: {reason:?}");
        self.emit(ClientEvent::ObservationStopped(reason));
        true
    }

    fn emit(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            debug!("No receiver for client events");
        }
    }
}

fn representation(response: &ClientResponse) -> Representation {
    response.representation().unwrap_or_else(|e| {
        warn!("Response {} payload discarded: {e}", response.token);
        Representation::new()
    })
}

#[cfg(test)]
mod tests {
    use ocflite::status::Status;

    use crate::chain::{ObserveScript, StopReason};
    use crate::config::ClientConfig;
    use crate::error::ErrorKind;
    use crate::events::ClientEvent;
    use crate::registry::{DeviceRegistry, ProvisioningState};
    use crate::response::ClientResponse;
    use crate::tests::{
        MockOnboarding, MockTransport, OnboardingCall, device, discovery_payload, encode,
        light_update,
    };
    use crate::transport::{Method, ObserveAction, OnboardingEvent, Token};

    use super::{CommandKind, Engine};

    struct Harness {
        engine: Engine<MockTransport, MockOnboarding>,
        transport: MockTransport,
        onboarding: MockOnboarding,
        registry: DeviceRegistry,
        events: flume::Receiver<ClientEvent>,
    }

    impl Harness {
        fn new(script: ObserveScript) -> Self {
            let config = ClientConfig::new("/tmp/ocflite").script(script);
            let transport = MockTransport::default();
            let onboarding = MockOnboarding::default();
            let registry = DeviceRegistry::new();
            let (sender, events) = flume::unbounded();
            let engine = Engine::new(
                &config,
                transport.clone(),
                onboarding.clone(),
                registry.clone(),
                sender,
            );
            Self {
                engine,
                transport,
                onboarding,
                registry,
                events,
            }
        }

        fn respond(&mut self, now: u64, response: ClientResponse) {
            self.engine.handle_inbound(now, response.into());
        }

        fn last_token(&self) -> Token {
            self.transport.requests().last().unwrap().token
        }

        fn drain(&self) -> Vec<ClientEvent> {
            self.events.try_iter().collect()
        }

        // Runs discovery and the chain up to the observation.
        fn observe(&mut self) -> Token {
            self.engine
                .handle_command(0, CommandKind::DiscoverResource("core.light".into()))
                .unwrap();
            let discovery = self.last_token();
            self.respond(0, ClientResponse::new(discovery, Status::Ok, discovery_payload()));

            let get = self.last_token();
            self.respond(0, ClientResponse::new(get, Status::Ok, encode(&light_update(true, 15))));

            let post = self.last_token();
            self.respond(0, ClientResponse::new(post, Status::Created, Vec::new()));

            let _events = self.drain();
            self.last_token()
        }
    }

    fn post_script() -> ObserveScript {
        ObserveScript::empty().step(Method::Post, light_update(true, 55))
    }

    #[test]
    fn discovery_starts_chain() {
        let mut harness = Harness::new(post_script());
        harness
            .engine
            .handle_command(0, CommandKind::DiscoverResource("core.light".into()))
            .unwrap();

        let discovery = harness.transport.requests()[0].clone();
        assert_eq!(discovery.query.as_deref(), Some("rt=core.light"));

        harness.respond(
            0,
            ClientResponse::new(discovery.token, Status::Ok, discovery_payload()),
        );

        let requests = harness.transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method, Method::Get);
        assert_eq!(requests[1].uri, "/a/light");
        // The unmatched device resource has been released.
        assert_eq!(harness.transport.freed().len(), 1);

        let events = harness.drain();
        assert!(matches!(
            events.as_slice(),
            [ClientEvent::ResourceDiscovered(resource)] if resource.uri == "/a/light"
        ));

        // Later discovery responses are dropped.
        harness.respond(
            0,
            ClientResponse::new(discovery.token, Status::Ok, discovery_payload()),
        );
        assert_eq!(harness.transport.requests().len(), 2);
    }

    #[test]
    fn chain_then_timed_stop() {
        let mut harness = Harness::new(post_script());
        harness
            .engine
            .handle_command(0, CommandKind::DiscoverResource("core.light".into()))
            .unwrap();
        let discovery = harness.last_token();
        harness.respond(0, ClientResponse::new(discovery, Status::Ok, discovery_payload()));

        let get = harness.last_token();
        harness.respond(
            0,
            ClientResponse::new(get, Status::Ok, encode(&light_update(false, 0))),
        );
        let post = harness.transport.requests().last().unwrap().clone();
        assert_eq!(post.method, Method::Post);
        assert_eq!(post.payload.as_ref(), encode(&light_update(true, 55)).as_slice());

        harness.respond(1, ClientResponse::new(post.token, Status::Created, Vec::new()));
        let observe = harness.transport.requests().last().unwrap().clone();
        assert_eq!(observe.observe, Some(ObserveAction::Register));
        assert_eq!(harness.engine.next_deadline(), Some(6));

        harness.respond(
            2,
            ClientResponse::new(observe.token, Status::Ok, encode(&light_update(true, 55)))
                .observe(1),
        );

        let events = harness.drain();
        assert_eq!(events.len(), 4);
        assert!(matches!(
            &events[1],
            ClientEvent::ChainResponse { index: 0, status: Status::Ok, representation, .. }
                if representation.get_bool("state") == Some(false)
        ));
        assert!(matches!(
            events[2],
            ClientEvent::ChainResponse {
                index: 1,
                method: Method::Post,
                status: Status::Created,
                ..
            }
        ));
        assert!(matches!(
            events[3],
            ClientEvent::Notification { sequence: 1, .. }
        ));

        harness.engine.fire_timers(5);
        assert!(harness.drain().is_empty());

        harness.engine.fire_timers(6);
        assert_eq!(
            harness.drain(),
            [ClientEvent::ObservationStopped(StopReason::Expired)]
        );
        let deregister = harness.transport.requests().last().unwrap().clone();
        assert_eq!(deregister.observe, Some(ObserveAction::Deregister));
        assert_eq!(deregister.token, observe.token);

        // No notification is delivered after the stop.
        harness.respond(
            7,
            ClientResponse::new(observe.token, Status::Ok, Vec::new()).observe(2),
        );
        harness.engine.fire_timers(100);
        assert!(harness.drain().is_empty());
    }

    #[test]
    fn failed_get_ends_chain() {
        let mut harness = Harness::new(post_script());
        harness
            .engine
            .handle_command(0, CommandKind::DiscoverResource("core.light".into()))
            .unwrap();
        let discovery = harness.last_token();
        harness.respond(0, ClientResponse::new(discovery, Status::Ok, discovery_payload()));

        let get = harness.last_token();
        harness.respond(0, ClientResponse::new(get, Status::NotFound, Vec::new()));

        assert_eq!(harness.transport.requests().len(), 2);
        assert_eq!(harness.engine.next_deadline(), None);
    }

    #[test]
    fn requested_stop_cancels_timer() {
        let mut harness = Harness::new(post_script());
        let observe = harness.observe();

        harness
            .engine
            .handle_command(1, CommandKind::StopObserve)
            .unwrap();
        assert_eq!(harness.engine.next_deadline(), None);
        assert_eq!(
            harness.drain(),
            [ClientEvent::ObservationStopped(StopReason::Requested)]
        );

        // Stopping twice is harmless.
        harness
            .engine
            .handle_command(2, CommandKind::StopObserve)
            .unwrap();
        assert!(harness.drain().is_empty());

        harness.respond(3, ClientResponse::new(observe, Status::Ok, Vec::new()).observe(4));
        assert!(harness.drain().is_empty());
    }

    #[test]
    fn refused_observation() {
        let mut harness = Harness::new(post_script());
        let observe = harness.observe();
        let sent = harness.transport.requests().len();

        harness.respond(1, ClientResponse::new(observe, Status::Ok, Vec::new()));

        assert_eq!(
            harness.drain(),
            [ClientEvent::ObservationStopped(StopReason::Refused)]
        );
        assert_eq!(harness.engine.next_deadline(), None);
        // Nothing to deregister.
        assert_eq!(harness.transport.requests().len(), sent);
    }

    #[test]
    fn shutdown_drops_everything() {
        let mut harness = Harness::new(post_script());
        let observe = harness.observe();

        harness.engine.shutdown();
        assert_eq!(harness.engine.next_deadline(), None);

        harness.engine.fire_timers(u64::MAX);
        harness.respond(10, ClientResponse::new(observe, Status::Ok, Vec::new()).observe(3));
        assert!(harness.drain().is_empty());
    }

    #[test]
    fn replaced_chain_forgets_its_read() {
        let mut harness = Harness::new(post_script());
        harness
            .engine
            .handle_command(0, CommandKind::DiscoverResource("core.light".into()))
            .unwrap();
        let first_discovery = harness.last_token();
        harness.respond(
            0,
            ClientResponse::new(first_discovery, Status::Ok, discovery_payload()),
        );
        let first_get = harness.last_token();

        harness
            .engine
            .handle_command(1, CommandKind::DiscoverResource("core.light".into()))
            .unwrap();
        let second_discovery = harness.last_token();
        harness.respond(
            1,
            ClientResponse::new(second_discovery, Status::Ok, discovery_payload()),
        );
        let second_get = harness.last_token();
        assert_ne!(first_get, second_get);
        let _events = harness.drain();

        // The read of the replaced chain does not drive the new one.
        harness.respond(2, ClientResponse::new(first_get, Status::NotFound, Vec::new()));
        assert!(harness.drain().is_empty());
        assert_eq!(harness.transport.requests().len(), 4);

        harness.respond(
            2,
            ClientResponse::new(second_get, Status::Ok, encode(&light_update(true, 15))),
        );
        let requests = harness.transport.requests();
        assert_eq!(requests.len(), 5);
        assert_eq!(requests[4].method, Method::Post);
        assert!(matches!(
            harness.drain().as_slice(),
            [ClientEvent::ChainResponse { index: 0, status: Status::Ok, .. }]
        ));
    }

    #[test]
    fn stop_during_updates() {
        let mut harness = Harness::new(post_script());
        harness
            .engine
            .handle_command(0, CommandKind::DiscoverResource("core.light".into()))
            .unwrap();
        let discovery = harness.last_token();
        harness.respond(0, ClientResponse::new(discovery, Status::Ok, discovery_payload()));
        let get = harness.last_token();
        let _events = harness.drain();

        harness
            .engine
            .handle_command(1, CommandKind::StopObserve)
            .unwrap();
        assert_eq!(
            harness.drain(),
            [ClientEvent::ObservationStopped(StopReason::Requested)]
        );

        // The pending read is forgotten and nothing else is sent.
        harness.respond(2, ClientResponse::new(get, Status::Ok, Vec::new()));
        assert!(harness.drain().is_empty());
        assert_eq!(harness.transport.requests().len(), 2);
        assert_eq!(harness.engine.next_deadline(), None);

        harness
            .engine
            .handle_command(3, CommandKind::StopObserve)
            .unwrap();
        assert!(harness.drain().is_empty());
    }

    #[test]
    fn unknown_tokens_dropped() {
        let mut harness = Harness::new(post_script());
        harness.respond(
            0,
            ClientResponse::new(Token::new([7; 8]), Status::Ok, Vec::new()),
        );
        assert!(harness.drain().is_empty());
    }

    #[test]
    fn provisioning_commands() {
        let mut harness = Harness::new(ObserveScript::default());

        let error = harness
            .engine
            .handle_command(0, CommandKind::TakeOwnership(device(1)))
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UnknownDevice);

        harness
            .engine
            .handle_command(0, CommandKind::DiscoverUnowned)
            .unwrap();
        harness.engine.handle_inbound(
            0,
            OnboardingEvent::UnownedDevice {
                device: device(1),
                endpoints: Default::default(),
            }
            .into(),
        );
        harness
            .engine
            .handle_command(0, CommandKind::TakeOwnership(device(1)))
            .unwrap();
        harness.engine.handle_inbound(
            0,
            OnboardingEvent::OwnershipTransferred {
                device: device(1),
                status: 0,
            }
            .into(),
        );

        assert_eq!(
            harness.onboarding.calls(),
            [
                OnboardingCall::DiscoverUnowned,
                OnboardingCall::TakeOwnership(device(1)),
            ]
        );
        assert_eq!(harness.registry.state(device(1)), Some(ProvisioningState::Owned));
        assert_eq!(harness.drain().len(), 2);
    }

    #[test]
    fn malformed_discovery_response() {
        let mut harness = Harness::new(post_script());
        harness
            .engine
            .handle_command(0, CommandKind::DiscoverResource("core.light".into()))
            .unwrap();
        let discovery = harness.last_token();

        harness.respond(0, ClientResponse::new(discovery, Status::Ok, vec![0xa1]));
        assert_eq!(harness.transport.requests().len(), 1);

        // The discovery goes on.
        harness.respond(0, ClientResponse::new(discovery, Status::Ok, discovery_payload()));
        assert_eq!(harness.transport.requests().len(), 2);
    }
}
