//! Generic runtime for application orchestration.
//!
//! The Runtime is the mailbox and reducer loop. It coordinates:
//! - [`App`]: view-model state machine
//! - [`Bridge`]: session bridge
//! - [`Driver`]: platform radio and presentation
//! - [`Animators`] and [`FrameLoader`]: animation ticks and frame loading
//!
//! Every input reaches the runtime through one bounded mailbox, and every
//! state change happens on the task running [`Runtime::run`]. After each
//! reduction that changed something, a [`Snapshot`] is published on a watch
//! channel and handed to [`Driver::render`].

use std::{mem, sync::Arc, time::Duration};

use blulok_core::{AnimationConfig, AnimationError, RadioEvent, SessionConfig, Subject};
use thiserror::Error;
use tokio::{
    sync::{mpsc, watch},
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, trace};

use crate::{
    App, AppAction, AppEvent, AssetProvider, AssetUpdate, Bridge, Driver, FrameLoader, Snapshot,
    animator::Animators, load_frames,
};

/// Period of the housekeeping tick driving discovery timeouts and reconnect
/// backoff.
pub const DEFAULT_HOUSEKEEPING: Duration = Duration::from_secs(1);

/// Default mailbox capacity.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Everything the runtime consumes.
#[derive(Debug, Clone)]
pub enum Input {
    /// User intent, lifecycle signal or other application event.
    App(AppEvent),
    /// Platform radio callback.
    Radio(RadioEvent),
    /// Frame loading progress or result.
    Assets(AssetUpdate),
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Session settings.
    pub session: SessionConfig,
    /// Animation settings.
    pub animation: AnimationConfig,
    /// Housekeeping tick period.
    pub housekeeping: Duration,
    /// Mailbox capacity. Clamped to at least 1.
    pub mailbox_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            animation: AnimationConfig::default(),
            housekeeping: DEFAULT_HOUSEKEEPING,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

/// Errors that stop the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError<E>
where
    E: std::error::Error + 'static,
{
    /// Animation settings are unusable.
    #[error("invalid animation settings: {0}")]
    Animation(#[from] AnimationError),

    /// The driver failed.
    #[error("driver failed: {0}")]
    Driver(#[source] E),
}

/// Client side of a running [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    inputs: mpsc::Sender<Input>,
    snapshots: watch::Receiver<Snapshot>,
}

impl RuntimeHandle {
    /// Post an input. Returns `false` once the runtime has stopped.
    pub async fn send(&self, input: Input) -> bool {
        self.inputs.send(input).await.is_ok()
    }

    /// Post an application event.
    pub async fn send_app(&self, event: AppEvent) -> bool {
        self.send(Input::App(event)).await
    }

    /// Mailbox sender, for components that post on their own.
    pub fn sender(&self) -> mpsc::Sender<Input> {
        self.inputs.clone()
    }

    /// Subscribe to published snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }
}

/// Generic runtime that orchestrates App, Bridge, and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific radio and presentation driver
/// - `P`: Source of animation frames
pub struct Runtime<D, P>
where
    D: Driver,
    P: AssetProvider,
{
    driver: D,
    app: App,
    bridge: Bridge<Instant>,
    provider: Arc<P>,
    loader: FrameLoader,
    animators: Animators,
    animation: AnimationConfig,
    housekeeping: Duration,
    visible: Vec<Subject>,
    inbox: mpsc::Receiver<Input>,
    loopback: mpsc::WeakSender<Input>,
    snapshots: watch::Sender<Snapshot>,
    dirty: bool,
}

impl<D, P> Runtime<D, P>
where
    D: Driver,
    P: AssetProvider,
{
    /// Create a runtime and its handle.
    ///
    /// `make_driver` receives a mailbox sender the driver uses to post radio
    /// callbacks.
    ///
    /// # Errors
    ///
    /// - `AnimationError::ZeroFrameRate` if any subject has a zero frame rate
    pub fn new(
        config: RuntimeConfig,
        provider: P,
        make_driver: impl FnOnce(mpsc::Sender<Input>) -> D,
    ) -> Result<(Self, RuntimeHandle), AnimationError> {
        config.animation.validate()?;

        let (inputs, inbox) = mpsc::channel(config.mailbox_capacity.max(1));
        let driver = make_driver(inputs.clone());
        let bridge = Bridge::new(config.session);
        let app = App::new(bridge.session().view());
        let loader = FrameLoader::new();
        let (snapshots, snapshot_rx) = watch::channel(app.snapshot(Vec::new(), loader.view()));

        let runtime = Self {
            driver,
            app,
            bridge,
            provider: Arc::new(provider),
            loader,
            animators: Animators::new(),
            animation: config.animation,
            housekeeping: config.housekeeping,
            visible: Vec::new(),
            inbox,
            loopback: inputs.downgrade(),
            snapshots,
            dirty: true,
        };
        Ok((runtime, RuntimeHandle { inputs, snapshots: snapshot_rx }))
    }

    /// Run the main event loop until the App asks to quit or every sender is
    /// gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn run(mut self) -> Result<(), RuntimeError<D::Error>> {
        self.publish()?;

        let period = self.housekeeping.max(Duration::from_millis(1));
        let mut housekeeping = time::interval_at(Instant::now() + period, period);
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let quit = tokio::select! {
                input = self.inbox.recv() => match input {
                    Some(input) => self.handle_input(input).await?,
                    None => {
                        debug!("mailbox closed");
                        true
                    },
                },
                _ = housekeeping.tick() => {
                    let events = self.bridge.handle_tick(Instant::now());
                    self.process_bridge_events(events).await?
                },
                subject = self.animators.tick() => {
                    trace!(subject = subject.asset_name(), "frame");
                    self.dirty = true;
                    false
                },
            };
            if quit {
                break;
            }

            self.reconcile()?;
            if self.dirty {
                self.publish()?;
            }
        }

        info!("runtime stopped");
        self.animators.clear();
        self.driver.stop();
        Ok(())
    }

    /// Process one input.
    ///
    /// Returns `true` if the application should quit.
    async fn handle_input(&mut self, input: Input) -> Result<bool, RuntimeError<D::Error>> {
        match input {
            Input::App(event) => {
                let actions = self.app.handle(event);
                self.process_actions(actions).await
            },
            Input::Radio(event) => {
                let events = self.bridge.handle_radio(event, Instant::now());
                self.process_bridge_events(events).await
            },
            Input::Assets(update) => {
                self.loader.apply(update);
                self.dirty = true;
                Ok(false)
            },
        }
    }

    /// Process actions returned by the App.
    ///
    /// Returns `true` if should quit.
    async fn process_actions(
        &mut self,
        initial_actions: Vec<AppAction>,
    ) -> Result<bool, RuntimeError<D::Error>> {
        let mut pending_actions = initial_actions;

        while !pending_actions.is_empty() {
            let actions = mem::take(&mut pending_actions);

            for action in actions {
                match action {
                    AppAction::Render => self.dirty = true,
                    AppAction::Quit => return Ok(true),

                    // Session intents go through the bridge
                    action => {
                        let events = self.bridge.process_app_action(action, Instant::now());
                        self.send_outgoing_commands().await?;
                        for event in events {
                            pending_actions.extend(self.app.handle(event));
                        }
                    },
                }
            }
        }
        Ok(false)
    }

    /// Process events produced by the Bridge.
    ///
    /// Returns `true` if should quit.
    async fn process_bridge_events(
        &mut self,
        events: Vec<AppEvent>,
    ) -> Result<bool, RuntimeError<D::Error>> {
        self.send_outgoing_commands().await?;
        let mut actions = Vec::new();
        for event in events {
            actions.extend(self.app.handle(event));
        }
        self.process_actions(actions).await
    }

    async fn send_outgoing_commands(&mut self) -> Result<(), RuntimeError<D::Error>> {
        for command in self.bridge.take_outgoing() {
            trace!(?command, "radio command");
            self.driver.execute(command).await.map_err(RuntimeError::Driver)?;
        }
        Ok(())
    }

    /// Bring animations and frame loads in line with what the App shows.
    fn reconcile(&mut self) -> Result<(), RuntimeError<D::Error>> {
        let visible = self.app.visible_subjects();
        let appeared: Vec<Subject> = visible
            .iter()
            .map(|&(subject, _)| subject)
            .filter(|subject| !self.visible.contains(subject))
            .collect();
        for subject in appeared {
            if self.loader.request(subject) {
                self.spawn_load(subject);
                self.dirty = true;
            }
        }
        self.visible = visible.iter().map(|&(subject, _)| subject).collect();

        if self.animators.reconcile(&visible, &self.loader, &self.animation)? {
            self.dirty = true;
        }
        Ok(())
    }

    fn spawn_load(&self, subject: Subject) {
        let Some(inputs) = self.loopback.upgrade() else {
            return;
        };
        let provider = Arc::clone(&self.provider);
        tokio::spawn(async move {
            let progress_inputs = inputs.clone();
            let progress = move |fraction: f64| {
                let update = AssetUpdate::Progress { subject, fraction };
                if progress_inputs.try_send(Input::Assets(update)).is_err() {
                    trace!(subject = subject.asset_name(), "progress dropped");
                }
            };
            let update = match load_frames(provider.as_ref(), subject, &progress).await {
                Ok((source, frames)) => AssetUpdate::Loaded { subject, source, frames },
                Err(e) => AssetUpdate::Failed { subject, message: e.to_string() },
            };
            if inputs.send(Input::Assets(update)).await.is_err() {
                debug!(subject = subject.asset_name(), "runtime gone before frames arrived");
            }
        });
    }

    fn publish(&mut self) -> Result<(), RuntimeError<D::Error>> {
        let snapshot = self.app.snapshot(self.animators.views(), self.loader.view());
        self.driver.render(&snapshot).map_err(RuntimeError::Driver)?;
        self.snapshots.send_replace(snapshot);
        self.dirty = false;
        Ok(())
    }

    /// The App state machine.
    pub fn app(&self) -> &App {
        &self.app
    }

    /// The session bridge.
    pub fn bridge(&self) -> &Bridge<Instant> {
        &self.bridge
    }
}
