use std::path::{Path, PathBuf};
use std::time::Duration;

use ocflite::codec::DEFAULT_CAPACITY;

use crate::chain::ObserveScript;
use crate::transport::Qos;

// Engine time base.
const TICK: Duration = Duration::from_secs(1);

// Number of ticks an observation lasts before being stopped.
const STOP_OBSERVE_DELAY: u64 = 5;

// Number of foreground commands waiting for the engine.
const COMMAND_CAPACITY: usize = 16;

/// Client configuration.
///
/// The storage path is handed to the onboarding engine, which persists the
/// credentials there. The client never reads nor writes it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub(crate) storage_path: PathBuf,
    pub(crate) tick: Duration,
    pub(crate) stop_observe_delay: u64,
    pub(crate) payload_capacity: usize,
    pub(crate) command_capacity: usize,
    pub(crate) qos: Qos,
    pub(crate) script: ObserveScript,
}

impl ClientConfig {
    /// Creates a [`ClientConfig`] persisting credentials in the given
    /// directory.
    ///
    /// Default values:
    /// - one tick lasts one second
    /// - an observation is stopped after 5 ticks
    /// - payloads are encoded into a 1024 bytes buffer
    /// - 16 foreground commands can wait for the engine
    /// - chained requests use the [`Qos::Low`] class
    /// - the observe script is [`ObserveScript::default`]
    #[must_use]
    #[inline]
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
            tick: TICK,
            stop_observe_delay: STOP_OBSERVE_DELAY,
            payload_capacity: DEFAULT_CAPACITY,
            command_capacity: COMMAND_CAPACITY,
            qos: Qos::Low,
            script: ObserveScript::default(),
        }
    }

    /// Sets the engine time base.
    #[must_use]
    #[inline]
    pub const fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Sets the number of ticks after which an observation is stopped.
    #[must_use]
    #[inline]
    pub const fn stop_observe_delay(mut self, ticks: u64) -> Self {
        self.stop_observe_delay = ticks;
        self
    }

    /// Sets the capacity of the payload encoding buffer, in bytes.
    #[must_use]
    #[inline]
    pub const fn payload_capacity(mut self, capacity: usize) -> Self {
        self.payload_capacity = capacity;
        self
    }

    /// Sets how many foreground commands can wait for the engine.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    #[inline]
    pub const fn command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = if capacity == 0 { 1 } else { capacity };
        self
    }

    /// Sets the quality of service class of chained requests.
    #[must_use]
    #[inline]
    pub const fn qos(mut self, qos: Qos) -> Self {
        self.qos = qos;
        self
    }

    /// Sets the updates sent to a discovered resource before observing it.
    #[must_use]
    #[inline]
    pub fn script(mut self, script: ObserveScript) -> Self {
        self.script = script;
        self
    }

    /// Returns the credentials storage path.
    #[must_use]
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use crate::chain::ObserveScript;
    use crate::transport::Qos;

    use super::ClientConfig;

    #[test]
    fn default_config() {
        let config = ClientConfig::new("./onboarding_tool_creds/");

        assert_eq!(config.storage_path(), Path::new("./onboarding_tool_creds/"));
        assert_eq!(config.tick, Duration::from_secs(1));
        assert_eq!(config.stop_observe_delay, 5);
        assert_eq!(config.payload_capacity, 1024);
        assert_eq!(config.command_capacity, 16);
        assert_eq!(config.qos, Qos::Low);
        assert_eq!(config.script, ObserveScript::default());
    }

    #[test]
    fn custom_config() {
        let config = ClientConfig::new("./creds")
            .tick(Duration::from_millis(10))
            .stop_observe_delay(30)
            .payload_capacity(64)
            .command_capacity(0)
            .qos(Qos::High)
            .script(ObserveScript::empty());

        assert_eq!(config.tick, Duration::from_millis(10));
        assert_eq!(config.stop_observe_delay, 30);
        assert_eq!(config.payload_capacity, 64);
        assert_eq!(config.command_capacity, 1);
        assert_eq!(config.qos, Qos::High);
        assert_eq!(config.script, ObserveScript::empty());
    }
}
