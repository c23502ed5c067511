use std::sync::{Arc, mpsc};

use tokio_util::sync::CancellationToken;

use super::{
    coordinator::Coordinator,
    migration::MigrationTracker,
    patcher::{Patcher, subscriber_listener},
    registry::ThreadRegistry,
    state::CoordinatorState,
    trigger::{SignalListener, Trigger},
};
use crate::{
    core::Config,
    error::RuntimeError,
    events::Bus,
    hooks::{Hooks, NoHooks},
    patch::{NoopEngine, PatchDesk, PatchEngine},
    subscribers::Subscribe,
};

/// Builder for a [`Patcher`]: configuration, hooks, engine and subscribers.
pub struct PatcherBuilder {
    cfg: Config,
    hooks: Arc<dyn Hooks>,
    engine: Arc<dyn PatchEngine>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl PatcherBuilder {
    /// Creates a builder with no hooks, the no-op engine and no subscribers.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            hooks: Arc::new(NoHooks),
            engine: Arc::new(NoopEngine),
            subscribers: Vec::new(),
        }
    }

    /// Sets the application hook set.
    pub fn with_hooks(mut self, hooks: Arc<dyn Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Sets the engine that performs the code switch-over.
    pub fn with_engine(mut self, engine: Arc<dyn PatchEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Sets event subscribers for observability.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the configuration, starts the `wf-coordinator` thread and
    /// returns once the coordinator listens for triggers and events.
    pub fn build(self) -> Result<Arc<Patcher>, RuntimeError> {
        self.cfg.validate()?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let state = Arc::new(CoordinatorState::new());
        let tracker = Arc::new(MigrationTracker::new(Arc::clone(&self.hooks), bus.clone()));
        let registry = ThreadRegistry::new(
            &self.cfg,
            Arc::clone(&state),
            Arc::clone(&tracker),
            bus.clone(),
        );
        let desk = Arc::new(PatchDesk::new());
        let trigger = Arc::new(Trigger::new(&self.cfg));
        let token = CancellationToken::new();

        let coordinator = Coordinator {
            registry: Arc::clone(&registry),
            state: Arc::clone(&state),
            tracker: Arc::clone(&tracker),
            desk: Arc::clone(&desk),
            trigger: Arc::clone(&trigger),
            hooks: self.hooks,
            engine: self.engine,
            bus: bus.clone(),
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (ready_tx, ready_rx) = mpsc::channel::<std::io::Result<()>>();
        let subscribers = self.subscribers;
        let patch_signal = self.cfg.patch_signal;
        let run_bus = bus.clone();
        let run_token = token.clone();

        std::thread::Builder::new()
            .name("wf-coordinator".into())
            .spawn(move || {
                runtime.block_on(async move {
                    let signals = match SignalListener::install(patch_signal) {
                        Ok(s) => s,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let listener = subscriber_listener(subscribers, run_bus, run_token.clone());
                    let _ = ready_tx.send(Ok(()));

                    coordinator.run(signals, run_token).await;
                    let _ = listener.await;
                });
            })?;

        ready_rx
            .recv()
            .map_err(|_| std::io::Error::other("coordinator exited during startup"))??;

        Ok(Arc::new(Patcher {
            cfg: self.cfg,
            registry,
            state,
            tracker,
            desk,
            trigger,
            bus,
            token,
        }))
    }
}
