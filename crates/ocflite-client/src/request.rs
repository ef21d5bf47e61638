use hashbrown::HashMap;

use tracing::debug;

use crate::transport::{Method, Token};

/// An operation waiting for its responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOperation {
    /// A multicast discovery. It collects responses until the dispatcher
    /// stops it.
    Discovery,
    /// A step of the observe chain.
    ChainStep {
        /// Request method.
        method: Method,
        /// Index of the step in the chain.
        index: usize,
    },
    /// An observation.
    Observe,
}

/// The requests sent and still waiting for responses, keyed by token.
///
/// A discovery stays registered until removed. An observation stays
/// registered while its responses carry an observe sequence number. Any other
/// request is removed by its first response.
#[derive(Debug, Default)]
pub struct PendingRequests {
    requests: HashMap<Token, PendingOperation>,
    next_token: u64,
}

impl PendingRequests {
    /// Creates an empty [`PendingRequests`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operation under a fresh token.
    pub fn register(&mut self, operation: PendingOperation) -> Token {
        self.next_token = self.next_token.wrapping_add(1);
        let token = Token::new(self.next_token.to_be_bytes());

        debug!("Request {token} registered as {operation:?}");
        if let Some(previous) = self.requests.insert(token, operation) {
            debug!("Request {token} replaced {previous:?}");
        }
        token
    }

    /// Correlates a response with its operation.
    ///
    /// Returns [`None`] when the token is unknown.
    pub fn correlate(&mut self, token: Token, observe: Option<u32>) -> Option<PendingOperation> {
        let operation = self.requests.get(&token)?;

        let retained = match operation {
            PendingOperation::Discovery => true,
            PendingOperation::Observe => observe.is_some(),
            PendingOperation::ChainStep { .. } => false,
        };

        if retained {
            Some(operation.clone())
        } else {
            debug!("Request {token} completed");
            self.requests.remove(&token)
        }
    }

    /// Removes an operation.
    pub fn remove(&mut self, token: Token) -> Option<PendingOperation> {
        self.requests.remove(&token)
    }

    /// Checks whether a token is registered.
    #[must_use]
    pub fn contains(&self, token: Token) -> bool {
        self.requests.contains_key(&token)
    }

    /// Drops every registered operation, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.requests.len();
        self.requests.clear();
        dropped
    }

    /// Returns the number of registered operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Checks whether no operations are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
