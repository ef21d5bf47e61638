use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use ocflite::ace::AccessControlEntry;
use ocflite::identity::DeviceId;

use tokio::sync::{Mutex as CommandLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use tokio_util::sync::CancellationToken;

use tracing::{debug, error, info};

use crate::config::ClientConfig;
use crate::engine::{Command, CommandKind, Engine};
use crate::error::{Error, ErrorKind, Result};
use crate::events::ClientEvent;
use crate::registry::DeviceRegistry;
use crate::response::InboundEvent;
use crate::transport::{Onboarding, Transport};

fn shutdown_error() -> Error {
    Error::new(ErrorKind::Shutdown, "The client engine has been shut down.")
}

/// A handle delivering network events to the client engine.
///
/// The transport and onboarding engines use it to hand over responses,
/// discovery responses included, and onboarding outcomes. Events are
/// processed in arrival order.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    sender: flume::Sender<InboundEvent>,
}

impl EngineHandle {
    /// Delivers an event to the engine.
    ///
    /// # Errors
    ///
    /// An [`ErrorKind::Shutdown`] error is returned when the engine has been
    /// shut down.
    pub fn deliver(&self, event: impl Into<InboundEvent>) -> Result<()> {
        self.sender
            .send(event.into())
            .map_err(|_| shutdown_error())
    }
}

/// A client discovering resources and onboarding devices.
///
/// A single background worker drives the engine: it processes the delivered
/// network events, fires the delayed callbacks and advances the observe
/// chain. Foreground operations never wait for the network. They return once
/// the engine has dispatched the request, and their outcomes arrive later as
/// [`ClientEvent`]s.
///
/// One foreground operation is dispatched at a time.
#[derive(Debug)]
pub struct Client {
    commands: mpsc::Sender<Command>,
    inbound: flume::Sender<InboundEvent>,
    registry: DeviceRegistry,
    command_lock: CommandLock<()>,
    cancellation_token: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Starts a [`Client`] and returns it together with the receiver of its
    /// events.
    ///
    /// The storage path of the configuration is handed to the onboarding
    /// engine before the worker starts.
    ///
    /// # Errors
    ///
    /// An error is returned when the onboarding engine cannot use the
    /// storage path.
    ///
    /// # Panics
    ///
    /// This function panics when called outside of a `tokio` runtime.
    pub fn spawn<T: Transport, O: Onboarding>(
        config: ClientConfig,
        transport: T,
        mut onboarding: O,
    ) -> Result<(Self, flume::Receiver<ClientEvent>)> {
        onboarding.configure_storage(&config.storage_path)?;

        let (event_sender, events) = flume::unbounded();
        let (commands, command_receiver) = mpsc::channel(config.command_capacity);
        let (inbound, inbound_receiver) = flume::unbounded();

        let registry = DeviceRegistry::new();
        let engine = Engine::new(
            &config,
            transport,
            onboarding,
            registry.clone(),
            event_sender,
        );

        let cancellation_token = CancellationToken::new();
        let worker = tokio::spawn(run_engine(
            engine,
            command_receiver,
            inbound_receiver,
            cancellation_token.clone(),
            config.tick,
        ));

        Ok((
            Self {
                commands,
                inbound,
                registry,
                command_lock: CommandLock::new(()),
                cancellation_token,
                worker: Mutex::new(Some(worker)),
            },
            events,
        ))
    }

    /// Returns a handle delivering network events to the engine.
    #[must_use]
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            sender: self.inbound.clone(),
        }
    }

    /// Returns the device registry.
    #[must_use]
    pub const fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Starts discovering the resources of the given type.
    ///
    /// The first resource found is read, updated through the observe script
    /// and finally observed until the stop delay elapses.
    ///
    /// # Errors
    ///
    /// An error is returned when the discovery request cannot be sent or
    /// the engine has been shut down.
    pub async fn discover_resource(&self, resource_type: impl Into<String>) -> Result<()> {
        self.command(CommandKind::DiscoverResource(resource_type.into()))
            .await
    }

    /// Starts discovering devices without an owner.
    ///
    /// # Errors
    ///
    /// An error is returned when the discovery cannot start or the engine has
    /// been shut down.
    pub async fn discover_unowned(&self) -> Result<()> {
        self.command(CommandKind::DiscoverUnowned).await
    }

    /// Starts discovering the devices owned by this client.
    ///
    /// # Errors
    ///
    /// An error is returned when the discovery cannot start or the engine has
    /// been shut down.
    pub async fn discover_owned(&self) -> Result<()> {
        self.command(CommandKind::DiscoverOwned).await
    }

    /// Starts the ownership transfer of an unowned device.
    ///
    /// # Errors
    ///
    /// An [`ErrorKind::UnknownDevice`] error is returned when the device is
    /// not in the registry as unowned.
    pub async fn take_ownership(&self, device: DeviceId) -> Result<()> {
        self.command(CommandKind::TakeOwnership(device)).await
    }

    /// Starts provisioning pairwise credentials between two owned devices.
    ///
    /// # Errors
    ///
    /// An [`ErrorKind::UnknownDevice`] error is returned when a device is not
    /// owned.
    pub async fn provision_credentials(&self, first: DeviceId, second: DeviceId) -> Result<()> {
        self.command(CommandKind::ProvisionCredentials(first, second))
            .await
    }

    /// Starts provisioning an access control entry on an owned device.
    ///
    /// # Errors
    ///
    /// An [`ErrorKind::Provisioning`] error is returned when the entry does
    /// not pass [`AccessControlEntry::validate`], an
    /// [`ErrorKind::UnknownDevice`] error when the device is not owned.
    pub async fn provision_ace(&self, device: DeviceId, ace: AccessControlEntry) -> Result<()> {
        self.command(CommandKind::ProvisionAce(device, Box::new(ace)))
            .await
    }

    /// Starts the factory reset of a known device.
    ///
    /// # Errors
    ///
    /// An [`ErrorKind::UnknownDevice`] error is returned when the device is
    /// not in the registry.
    pub async fn reset_device(&self, device: DeviceId) -> Result<()> {
        self.command(CommandKind::ResetDevice(device)).await
    }

    /// Stops the running observation before its delay elapses.
    ///
    /// # Errors
    ///
    /// An error is returned when the engine has been shut down.
    pub async fn stop_observe(&self) -> Result<()> {
        self.command(CommandKind::StopObserve).await
    }

    /// Shuts down the [`Client`].
    ///
    /// Pending delayed callbacks are dropped without running, and the
    /// operations waiting to be dispatched fail with
    /// [`ErrorKind::Shutdown`].
    pub async fn shutdown(&self) {
        // Stop the infinite loop
        self.cancellation_token.cancel();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            // Await the task.
            if let Err(e) = worker.await {
                error!("Failed to await the engine task: {e}");
            }
        }
    }

    async fn command(&self, kind: CommandKind) -> Result<()> {
        let _guard = tokio::select! {
            () = self.cancellation_token.cancelled() => return Err(shutdown_error()),
            guard = self.command_lock.lock() => guard,
        };

        let (ack, acknowledged) = oneshot::channel();
        self.commands
            .send(Command { kind, ack })
            .await
            .map_err(|_| shutdown_error())?;

        tokio::select! {
            () = self.cancellation_token.cancelled() => Err(shutdown_error()),
            result = acknowledged => result.unwrap_or_else(|_| Err(shutdown_error())),
        }
    }
}

// Ticks elapsed since `start`, rounded up or down.
fn elapsed_ticks(start: Instant, tick: Duration, round_up: bool) -> u64 {
    let elapsed = start.elapsed().as_nanos();
    let tick = tick.as_nanos().max(1);
    let ticks = if round_up {
        elapsed.div_ceil(tick)
    } else {
        elapsed / tick
    };
    u64::try_from(ticks).unwrap_or(u64::MAX)
}

// Instant at which `ticks` ticks have elapsed, if representable.
fn deadline(start: Instant, tick: Duration, ticks: u64) -> Option<Instant> {
    const NANOS_PER_SEC: u128 = 1_000_000_000;

    let nanos = tick.as_nanos().checked_mul(u128::from(ticks))?;
    let secs = u64::try_from(nanos / NANOS_PER_SEC).ok()?;
    let subsec = u32::try_from(nanos % NANOS_PER_SEC).ok()?;
    start.checked_add(Duration::new(secs, subsec))
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn run_engine<T: Transport, O: Onboarding>(
    mut engine: Engine<T, O>,
    mut commands: mpsc::Receiver<Command>,
    inbound: flume::Receiver<InboundEvent>,
    cancellation_token: CancellationToken,
    tick: Duration,
) {
    let start = Instant::now();
    info!("Client engine started");

    loop {
        let next = engine
            .next_deadline()
            .and_then(|ticks| deadline(start, tick, ticks));

        tokio::select! {
            // Use the cancellation token to stop the loop
            () = cancellation_token.cancelled() => { break; }
            command = commands.recv() => {
                let Some(Command { kind, ack }) = command else {
                    debug!("Command channel closed");
                    break;
                };
                let result = engine.handle_command(elapsed_ticks(start, tick, true), kind);
                if ack.send(result).is_err() {
                    debug!("Command acknowledgement dropped");
                }
            }
            event = inbound.recv_async() => {
                let Ok(event) = event else {
                    debug!("Inbound channel closed");
                    break;
                };
                engine.handle_inbound(elapsed_ticks(start, tick, true), event);
            }
            () = sleep_until(next) => {
                engine.fire_timers(elapsed_ticks(start, tick, false));
            }
        }
    }

    engine.shutdown();
    drop(commands);
    drop(inbound);
}
