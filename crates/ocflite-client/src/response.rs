use ocflite::codec::decode;
use ocflite::representation::{Payload, Representation};
use ocflite::status::Status;

use bytes::Bytes;

use crate::error::Result;
use crate::transport::{OnboardingEvent, Token};

/// A response received from a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientResponse {
    /// Token of the request the response belongs to.
    pub token: Token,
    /// Response status.
    pub status: Status,
    /// Observe sequence number, present on observe notifications.
    pub observe: Option<u32>,
    /// Encoded payload.
    pub payload: Bytes,
}

impl ClientResponse {
    /// Creates a [`ClientResponse`] without observe option.
    #[must_use]
    pub fn new(token: Token, status: Status, payload: impl Into<Bytes>) -> Self {
        Self {
            token,
            status,
            observe: None,
            payload: payload.into(),
        }
    }

    /// Sets the observe sequence number.
    #[must_use]
    #[inline]
    pub fn observe(mut self, sequence: u32) -> Self {
        self.observe = Some(sequence);
        self
    }

    /// Decodes the payload.
    ///
    /// # Errors
    ///
    /// An error is returned when the payload is malformed.
    pub fn decode(&self) -> Result<Payload> {
        Ok(decode(&self.payload)?)
    }

    /// Decodes the payload as a single object.
    ///
    /// An array root yields its first object, an empty array an empty
    /// object.
    ///
    /// # Errors
    ///
    /// An error is returned when the payload is malformed.
    pub fn representation(&self) -> Result<Representation> {
        Ok(match self.decode()? {
            Payload::Object(object) => object,
            Payload::Objects(objects) => objects.into_iter().next().unwrap_or_default(),
        })
    }
}

/// An event delivered to the client engine by its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A response, discovery responses included.
    Response(ClientResponse),
    /// An onboarding outcome.
    Onboarding(OnboardingEvent),
}

impl From<ClientResponse> for InboundEvent {
    fn from(response: ClientResponse) -> Self {
        Self::Response(response)
    }
}

impl From<OnboardingEvent> for InboundEvent {
    fn from(event: OnboardingEvent) -> Self {
        Self::Onboarding(event)
    }
}
