use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ocflite::ace::AccessControlEntry;
use ocflite::codec::RepBuffer;
use ocflite::endpoint::EndpointList;
use ocflite::identity::DeviceId;
use ocflite::representation::{Payload, Representation, Value};

use crate::error::{Error, ErrorKind, Result};
use crate::transport::{Onboarding, OutboundRequest, Transport};

pub(crate) fn init_tracing() {
    if tracing_subscriber::fmt()
        .with_test_writer()
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
    }
}

pub(crate) fn device(last: u8) -> DeviceId {
    let mut bytes = [0x5a; 16];
    bytes[15] = last;
    DeviceId::from_bytes(bytes)
}

pub(crate) fn light_update(state: bool, power: i64) -> Representation {
    let mut light = Representation::new();
    light.insert("state", state).unwrap();
    light.insert("power", power).unwrap();
    light
}

pub(crate) fn encode(representation: &Representation) -> Vec<u8> {
    let mut buffer = RepBuffer::default();
    let _len = buffer.encode(representation).unwrap();
    buffer.as_bytes().to_vec()
}

fn link(href: &str, resource_type: &str) -> Representation {
    let mut endpoint = Representation::new();
    endpoint.insert("ep", "coap://192.168.1.7:5683").unwrap();

    let mut policy = Representation::new();
    policy.insert("bm", 3).unwrap();

    let mut link = Representation::new();
    link.insert("anchor", "ocf://5a5a5a5a-5a5a-5a5a-5a5a-5a5a5a5a5a01")
        .unwrap();
    link.insert("href", href).unwrap();
    link.insert("rt", Value::Array(vec![resource_type.into()]))
        .unwrap();
    link.insert("if", Value::Array(vec!["oic.if.baseline".into()]))
        .unwrap();
    link.insert("p", policy).unwrap();
    link.insert("eps", vec![endpoint]).unwrap();
    link
}

// A `/oic/res` response advertising a device resource and a light.
pub(crate) fn discovery_payload() -> Vec<u8> {
    let mut buffer = RepBuffer::default();
    let _len = buffer
        .encode_payload(&Payload::Objects(vec![
            link("/oic/d", "oic.wk.d"),
            link("/a/light", "core.light"),
        ]))
        .unwrap();
    buffer.as_bytes().to_vec()
}

// Records the sent requests and the released endpoints.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockTransport {
    requests: Arc<Mutex<Vec<OutboundRequest>>>,
    freed: Arc<Mutex<Vec<EndpointList>>>,
}

impl MockTransport {
    pub(crate) fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn freed(&self) -> Vec<EndpointList> {
        self.freed.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn send(&mut self, request: OutboundRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request);
        Ok(())
    }

    fn free_endpoints(&mut self, endpoints: EndpointList) {
        self.freed.lock().unwrap().push(endpoints);
    }
}

// Fields are only compared.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OnboardingCall {
    ConfigureStorage(PathBuf),
    DiscoverUnowned,
    DiscoverOwned,
    TakeOwnership(DeviceId),
    PairwiseCredentials(DeviceId, DeviceId),
    Ace(DeviceId, AccessControlEntry),
    Reset(DeviceId),
}

// Records the onboarding operations.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockOnboarding {
    calls: Arc<Mutex<Vec<OnboardingCall>>>,
    fail: bool,
}

impl MockOnboarding {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<OnboardingCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: OnboardingCall) -> Result<()> {
        if self.fail {
            return Err(Error::new(ErrorKind::Transport, "Onboarding unavailable."));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl Onboarding for MockOnboarding {
    fn configure_storage(&mut self, path: &Path) -> Result<()> {
        self.record(OnboardingCall::ConfigureStorage(path.to_path_buf()))
    }

    fn discover_unowned(&mut self) -> Result<()> {
        self.record(OnboardingCall::DiscoverUnowned)
    }

    fn discover_owned(&mut self) -> Result<()> {
        self.record(OnboardingCall::DiscoverOwned)
    }

    fn take_ownership(&mut self, device: DeviceId) -> Result<()> {
        self.record(OnboardingCall::TakeOwnership(device))
    }

    fn provision_pairwise_credentials(&mut self, first: DeviceId, second: DeviceId) -> Result<()> {
        self.record(OnboardingCall::PairwiseCredentials(first, second))
    }

    fn provision_ace(&mut self, device: DeviceId, ace: &AccessControlEntry) -> Result<()> {
        self.record(OnboardingCall::Ace(device, ace.clone()))
    }

    fn reset_device(&mut self, device: DeviceId) -> Result<()> {
        self.record(OnboardingCall::Reset(device))
    }
}
