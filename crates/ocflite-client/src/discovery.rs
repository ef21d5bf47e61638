use ocflite::endpoint::{Endpoint, EndpointList};
use ocflite::representation::{Payload, Representation};
use ocflite::resource::{InterfaceMask, ResourceHandle, ResourceProperties};

use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::transport::Qos;

/// Whether a discovery goes on after a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryFlow {
    /// Keep delivering discovered resources.
    Continue,
    /// Stop the discovery.
    Stop,
}

/// Actions a [`DiscoveryDispatcher`] asks of the engine.
pub trait DiscoveryActions {
    /// Sends a `GET` request to a discovered resource.
    ///
    /// # Errors
    ///
    /// An error is returned when the request cannot be sent.
    fn request_resource(&mut self, resource: &ResourceHandle, qos: Qos) -> Result<()>;

    /// Releases the endpoints of a resource which is not retained.
    fn release_endpoints(&mut self, endpoints: EndpointList);
}

/// A dispatcher looking for the first resource of a given type.
///
/// The first matching resource is retained and read once, then the discovery
/// stops. The endpoints of every other resource are released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryDispatcher {
    resource_type: String,
    matched: Option<ResourceHandle>,
}

impl DiscoveryDispatcher {
    /// Creates a [`DiscoveryDispatcher`] looking for the given resource type.
    #[must_use]
    #[inline]
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            matched: None,
        }
    }

    /// Returns the resource type of interest.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the retained resource, if one matched.
    #[must_use]
    pub const fn matched(&self) -> Option<&ResourceHandle> {
        self.matched.as_ref()
    }

    /// Handles a discovered resource.
    pub fn on_discovered(
        &mut self,
        resource: ResourceHandle,
        actions: &mut impl DiscoveryActions,
    ) -> DiscoveryFlow {
        info!(
            "Discovered resource `{}` anchored at `{}`",
            resource.uri, resource.anchor
        );
        debug!("\ttypes: {:?}", resource.types);
        debug!("\tinterfaces: {}", resource.interfaces.names().join(" | "));
        debug!(
            "\tresource properties: {}",
            resource.properties.names().join(" | ")
        );

        if self.matched.is_some() {
            debug!("Discovery already stopped, resource `{}` ignored", resource.uri);
            actions.release_endpoints(resource.endpoints);
            return DiscoveryFlow::Stop;
        }

        if !resource.has_type(&self.resource_type) {
            actions.release_endpoints(resource.endpoints);
            return DiscoveryFlow::Continue;
        }

        info!("Resource `{}` hosted at endpoints:", resource.uri);
        for endpoint in &resource.endpoints {
            log_endpoint(endpoint);
        }

        if let Err(e) = actions.request_resource(&resource, Qos::Low) {
            error!("Impossible to send a GET request to `{}`: {e}", resource.uri);
        } else {
            info!("Sent GET request to `{}`", resource.uri);
        }

        self.matched = Some(resource);
        DiscoveryFlow::Stop
    }

    /// Handles every resource of a discovery payload, in order, until the
    /// discovery stops.
    pub fn on_payload(
        &mut self,
        payload: &Payload,
        actions: &mut impl DiscoveryActions,
    ) -> DiscoveryFlow {
        for resource in parse_discovery_payload(payload) {
            if self.on_discovered(resource, actions) == DiscoveryFlow::Stop {
                return DiscoveryFlow::Stop;
            }
        }
        DiscoveryFlow::Continue
    }
}

fn log_endpoint(endpoint: &Endpoint) {
    debug!("\t\tendpoint.device {}", endpoint.device);
    debug!("\t\tendpoint.flags {:?}", endpoint.flags);
    debug!("\t\tendpoint.interface_index {}", endpoint.interface_index);
    debug!("\t\tendpoint.version {}", endpoint.version);
    match endpoint.address_string() {
        Some(address) => info!("\t\t{address}"),
        None => info!("\t\t{endpoint}"),
    }
}

/// Turns a decoded discovery payload into the resources it advertises.
///
/// The root is either the array of links or objects holding their links in a
/// `links` property. Links without a path or without any valid endpoint are
/// skipped.
#[must_use]
pub fn parse_discovery_payload(payload: &Payload) -> Vec<ResourceHandle> {
    let mut resources = Vec::new();
    for object in payload.objects() {
        match object.get_object_array("links") {
            Some(links) => resources.extend(links.iter().filter_map(parse_link)),
            None => resources.extend(parse_link(object)),
        }
    }
    resources
}

fn parse_link(link: &Representation) -> Option<ResourceHandle> {
    let Some(href) = link.get_string("href") else {
        warn!("Link without `href`, skip it");
        return None;
    };

    let mut endpoints = EndpointList::new();
    for ep in link.get_object_array("eps").unwrap_or_default() {
        let Some(text) = ep.get_string("ep") else {
            continue;
        };
        match text.parse::<Endpoint>() {
            Ok(endpoint) => endpoints.push(endpoint),
            Err(e) => warn!("Invalid endpoint `{text}` for `{href}`: {e}"),
        }
    }

    if endpoints.is_empty() {
        debug!("Link `{href}` has no reachable endpoints, skip it");
        return None;
    }

    let interfaces = link
        .get_string_array("if")
        .map_or(InterfaceMask::empty(), |names| InterfaceMask::from_names(names));

    let properties = link
        .get_object("p")
        .and_then(|policy| policy.get_int("bm"))
        .and_then(|bits| u8::try_from(bits).ok())
        .map_or(ResourceProperties::empty(), ResourceProperties::from_bits_truncate);

    let mut resource =
        ResourceHandle::new(link.get_string("anchor").unwrap_or_default(), href, endpoints)
            .interfaces(interfaces)
            .properties(properties);
    for resource_type in link.get_string_array("rt").unwrap_or_default() {
        resource = resource.resource_type(resource_type);
    }

    Some(resource)
}

#[cfg(test)]
mod tests {
    use ocflite::endpoint::{Endpoint, EndpointList, TransportFlags};
    use ocflite::representation::{Payload, Representation, Value};
    use ocflite::resource::{InterfaceMask, ResourceHandle, ResourceProperties};

    use crate::error::{Error, ErrorKind, Result};
    use crate::transport::Qos;

    use super::{DiscoveryActions, DiscoveryDispatcher, DiscoveryFlow, parse_discovery_payload};

    #[derive(Default)]
    struct RecordingActions {
        requests: Vec<(String, Qos)>,
        released: Vec<EndpointList>,
        fail: bool,
    }

    impl DiscoveryActions for RecordingActions {
        fn request_resource(&mut self, resource: &ResourceHandle, qos: Qos) -> Result<()> {
            self.requests.push((resource.uri.clone(), qos));
            if self.fail {
                return Err(Error::new(ErrorKind::Transport, "Network unreachable."));
            }
            Ok(())
        }

        fn release_endpoints(&mut self, endpoints: EndpointList) {
            self.released.push(endpoints);
        }
    }

    fn link(href: &str, resource_type: &str, eps: &[&str]) -> Representation {
        let mut link = Representation::new();
        link.insert("anchor", "ocf://2d2c8b3e-1f7a-4b0e-9c66-0123456789ab")
            .unwrap();
        link.insert("href", href).unwrap();
        link.insert("rt", Value::Array(vec![resource_type.into()]))
            .unwrap();
        link.insert(
            "if",
            Value::Array(vec!["oic.if.rw".into(), "oic.if.baseline".into()]),
        )
        .unwrap();
        let mut policy = Representation::new();
        policy.insert("bm", 3).unwrap();
        link.insert("p", policy).unwrap();
        let eps = eps
            .iter()
            .map(|ep| {
                let mut object = Representation::new();
                object.insert("ep", *ep).unwrap();
                object
            })
            .collect::<Vec<_>>();
        link.insert("eps", eps).unwrap();
        link
    }

    fn resource(resource_type: &str) -> ResourceHandle {
        ResourceHandle::new(
            "ocf://light",
            "/a/light",
            EndpointList::from_endpoints([Endpoint::ipv4(
                [192, 168, 1, 7],
                5683,
                TransportFlags::empty(),
            )]),
        )
        .resource_type(resource_type)
    }

    #[test]
    fn stop_on_matching_type() {
        let mut dispatcher = DiscoveryDispatcher::new("core.light");
        let mut actions = RecordingActions::default();

        let flow = dispatcher.on_discovered(resource("core.light"), &mut actions);

        assert_eq!(flow, DiscoveryFlow::Stop);
        assert_eq!(actions.requests, [("/a/light".to_string(), Qos::Low)]);
        assert!(actions.released.is_empty());
        assert_eq!(dispatcher.matched(), Some(&resource("core.light")));

        // Already stopped: nothing else is requested.
        let flow = dispatcher.on_discovered(resource("core.light"), &mut actions);
        assert_eq!(flow, DiscoveryFlow::Stop);
        assert_eq!(actions.requests.len(), 1);
        assert_eq!(actions.released.len(), 1);
    }

    #[test]
    fn continue_and_release_otherwise() {
        let mut dispatcher = DiscoveryDispatcher::new("core.light");
        let mut actions = RecordingActions::default();

        let unmatched = resource("core.fan");
        let flow = dispatcher.on_discovered(unmatched.clone(), &mut actions);

        assert_eq!(flow, DiscoveryFlow::Continue);
        assert!(actions.requests.is_empty());
        assert_eq!(actions.released, [unmatched.endpoints]);
        assert_eq!(dispatcher.matched(), None);
    }

    #[test]
    fn stop_even_when_request_fails() {
        let mut dispatcher = DiscoveryDispatcher::new("core.light");
        let mut actions = RecordingActions {
            fail: true,
            ..RecordingActions::default()
        };

        let flow = dispatcher.on_discovered(resource("core.light"), &mut actions);
        assert_eq!(flow, DiscoveryFlow::Stop);
        assert_eq!(actions.requests.len(), 1);
    }

    #[test]
    fn parse_link_array() {
        let payload = Payload::Objects(vec![
            link("/oic/d", "oic.wk.d", &["coap://[fe80::1]:5683"]),
            link(
                "/a/light",
                "core.light",
                &["coap://192.168.1.7:5683", "coaps://192.168.1.7:5684"],
            ),
        ]);

        let resources = parse_discovery_payload(&payload);
        assert_eq!(resources.len(), 2);

        let light = &resources[1];
        assert_eq!(light.uri, "/a/light");
        assert_eq!(light.anchor, "ocf://2d2c8b3e-1f7a-4b0e-9c66-0123456789ab");
        assert!(light.has_type("core.light"));
        assert_eq!(light.interfaces, InterfaceMask::RW | InterfaceMask::BASELINE);
        assert_eq!(
            light.properties,
            ResourceProperties::DISCOVERABLE | ResourceProperties::OBSERVABLE
        );
        assert_eq!(light.endpoints.len(), 2);
        assert!(light.endpoints.iter().nth(1).unwrap().is_secured());
    }

    #[test]
    fn parse_baseline_object() {
        let mut baseline = Representation::new();
        baseline.insert("rt", Value::Array(vec!["oic.wk.res".into()]))
            .unwrap();
        baseline
            .insert(
                "links",
                vec![link("/a/light", "core.light", &["coap://10.0.0.1:5683"])],
            )
            .unwrap();

        let resources = parse_discovery_payload(&Payload::Object(baseline));
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].uri, "/a/light");
    }

    #[test]
    fn links_without_endpoints_skipped() {
        let mut no_href = Representation::new();
        for (name, value) in link("/x", "core.light", &["coap://10.0.0.1:5683"])
            .iter()
            .filter(|(name, _)| *name != "href")
        {
            no_href.insert(name, value.clone()).unwrap();
        }

        let payload = Payload::Objects(vec![
            link("/a/bad", "core.light", &["http://10.0.0.1:80"]),
            link("/a/none", "core.light", &[]),
            no_href,
            link("/a/good", "core.light", &["bogus", "coap://10.0.0.1:5683"]),
        ]);

        let resources = parse_discovery_payload(&payload);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].uri, "/a/good");
        assert_eq!(resources[0].endpoints.len(), 1);
    }

    #[test]
    fn payload_dispatch_stops_at_first_match() {
        let payload = Payload::Objects(vec![
            link("/oic/p", "oic.wk.p", &["coap://10.0.0.1:5683"]),
            link("/a/light", "core.light", &["coap://10.0.0.1:5683"]),
            link("/a/light2", "core.light", &["coap://10.0.0.1:5683"]),
        ]);

        let mut dispatcher = DiscoveryDispatcher::new("core.light");
        let mut actions = RecordingActions::default();

        assert_eq!(
            dispatcher.on_payload(&payload, &mut actions),
            DiscoveryFlow::Stop
        );
        assert_eq!(actions.requests.len(), 1);
        assert_eq!(actions.requests[0].0, "/a/light");
        assert_eq!(actions.released.len(), 1);
    }
}
