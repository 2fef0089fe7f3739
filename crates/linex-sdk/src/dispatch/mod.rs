//! Event dispatch.
//!
//! The [`Dispatcher`] maps event names to ordered handler lists. It starts
//! idle; [`Dispatcher::mark_ready`] runs the ready hooks once and activates
//! it, after which [`Dispatcher::dispatch`] accepts event batches.
//!
//! # Execution Model
//!
//! - Each event of a batch gets its own [`Context`] and its own task, so events
//!   run concurrently.
//! - The handlers of one event run one after another in registration order.
//! - Every handler invocation runs in an isolated task. Errors and panics are
//!   logged and collected in the [`DispatchReport`]; they never stop sibling
//!   handlers or other events.
//! - With a handler timeout configured, an event whose handlers overrun it is
//!   cancelled and reported as [`HandlerError::TimedOut`].
//!
//! # Examples
//!
//! ```rust
//! use linex_sdk::client::{Message, MessagingApi};
//! use linex_sdk::dispatch::{handler_fn, Dispatcher, DispatchConfig};
//! use linex_sdk::events::{Context, EventRecord};
//! use linex_sdk::BoxError;
//! use std::sync::Arc;
//!
//! # async fn example(api: Arc<dyn MessagingApi>, events: Vec<EventRecord>) -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = Dispatcher::new(DispatchConfig::default());
//!
//! dispatcher
//!     .register("follow", handler_fn(|ctx: Arc<Context>| async move {
//!         ctx.reply(&[Message::text("Welcome!")]).await?;
//!         Ok::<(), BoxError>(())
//!     }))
//!     .await;
//!
//! dispatcher.mark_ready().await;
//!
//! let report = dispatcher.dispatch(events, api).await?;
//! println!("{} handlers ran, {} failed", report.invocations, report.failures.len());
//! # Ok(())
//! # }
//! ```

mod cache;
mod handler;
mod routes;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::client::MessagingApi;
use crate::error::{DispatchError, HandlerError};
use crate::events::{Context, EventKind, EventRecord, Source};

pub use handler::{args_fn, handler_fn, ready_fn, ArgumentHandler, EventHandler, ReadyHook};
pub use routes::postback_data;

use cache::EventCache;
use routes::{CommandRoute, PostbackRoute};

// ============================================================================
// Configuration
// ============================================================================

/// How the webhook receiver runs dispatch relative to the HTTP response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Respond immediately; handlers run in a spawned task.
    #[default]
    Background,

    /// Respond after every handler has finished.
    Inline,
}

/// Dispatch behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Background or inline dispatch.
    pub mode: DispatchMode,

    /// Upper bound on the time one event's handlers may take together.
    pub handler_timeout_seconds: Option<u64>,

    /// Skip events delivered while the channel is in standby mode.
    pub ignore_standby: bool,

    /// Entries kept per cache (messages, users, groups); 0 disables caching.
    pub cache_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Background,
            handler_timeout_seconds: None,
            ignore_standby: true,
            cache_capacity: 1000,
        }
    }
}

impl DispatchConfig {
    /// Per-event handler timeout.
    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_seconds.map(Duration::from_secs)
    }
}

// ============================================================================
// Dispatch Report
// ============================================================================

/// Outcome of dispatching one batch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Number of events dispatched.
    pub events: usize,

    /// Number of handler invocations started.
    pub invocations: usize,

    /// Every failed invocation.
    pub failures: Vec<HandlerError>,
}

impl DispatchReport {
    /// Whether every handler succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
struct EventOutcome {
    invocations: usize,
    failures: Vec<HandlerError>,
}

/// Lifecycle state of a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Ready hooks have not run; dispatch is refused.
    Idle,

    /// Dispatch is accepted.
    Active,
}

// ============================================================================
// Dispatcher
// ============================================================================

type WaitCheck = Box<dyn Fn(&Context) -> bool + Send + Sync>;

struct Waiter {
    id: u64,
    check: WaitCheck,
    sender: oneshot::Sender<Arc<Context>>,
}

/// Routes events to registered handlers.
pub struct Dispatcher {
    config: DispatchConfig,
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
    ready_hooks: Mutex<Vec<Arc<dyn ReadyHook>>>,
    active: AtomicBool,
    commands: Mutex<HashSet<String>>,
    cache: EventCache,
    waiters: std::sync::Mutex<HashMap<String, Vec<Waiter>>>,
    next_waiter: AtomicU64,
    starting: AtomicBool,
}

/// Removes a `wait_for` waiter when the waiting future ends.
struct WaiterRegistration<'a> {
    dispatcher: &'a Dispatcher,
    event_name: &'a str,
    id: u64,
}

impl Drop for WaiterRegistration<'_> {
    fn drop(&mut self) {
        let mut waiters = self.dispatcher.lock_waiters();
        if let Some(pending) = waiters.get_mut(self.event_name) {
            pending.retain(|waiter| waiter.id != self.id);
            if pending.is_empty() {
                waiters.remove(self.event_name);
            }
        }
    }
}

impl Dispatcher {
    /// Create an idle dispatcher.
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            ready_hooks: Mutex::new(Vec::new()),
            active: AtomicBool::new(false),
            commands: Mutex::new(HashSet::new()),
            cache: EventCache::new(config.cache_capacity),
            waiters: std::sync::Mutex::new(HashMap::new()),
            next_waiter: AtomicU64::new(0),
            starting: AtomicBool::new(false),
            config,
        }
    }

    /// Dispatch configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DispatcherState {
        if self.active.load(Ordering::Acquire) {
            DispatcherState::Active
        } else {
            DispatcherState::Idle
        }
    }

    /// Whether dispatch is accepted.
    pub fn is_ready(&self) -> bool {
        self.state() == DispatcherState::Active
    }

    /// Append a handler for `event_name`. Valid in any state.
    pub async fn register(&self, event_name: impl Into<String>, handler: Arc<dyn EventHandler>) {
        let event_name = event_name.into();
        let mut handlers = self.handlers.write().await;
        let list = handlers.entry(event_name.clone()).or_default();
        list.push(handler);
        debug!(event_name = %event_name, position = list.len(), "Handler registered");
    }

    /// Append a handler for events of `kind`.
    pub async fn register_kind(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        self.register(kind.name(), handler).await;
    }

    /// Number of handlers registered for `event_name`.
    pub async fn handler_count(&self, event_name: &str) -> usize {
        self.handlers
            .read()
            .await
            .get(event_name)
            .map_or(0, Vec::len)
    }

    /// Register a text command.
    ///
    /// The handler runs for text messages that are `name` alone or `name`
    /// followed by whitespace and `;`-separated arguments.
    ///
    /// # Errors
    ///
    /// `DispatchError::DuplicateCommand` if `name` is already registered.
    pub async fn command(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn ArgumentHandler>,
    ) -> Result<(), DispatchError> {
        let name = name.into();
        {
            let mut commands = self.commands.lock().await;
            if !commands.insert(name.clone()) {
                return Err(DispatchError::DuplicateCommand { name });
            }
        }

        let route = CommandRoute { name, handler };
        self.register_kind(EventKind::Text, Arc::new(route)).await;
        Ok(())
    }

    /// Register a handler for postbacks whose data starts with `prefix`.
    ///
    /// The handler receives the `;`-separated arguments after the prefix; see
    /// [`postback_data`].
    pub async fn postback(&self, prefix: impl Into<String>, handler: Arc<dyn ArgumentHandler>) {
        let route = PostbackRoute {
            prefix: prefix.into(),
            handler,
        };
        self.register_kind(EventKind::Postback, Arc::new(route))
            .await;
    }

    /// Add a hook to run when the dispatcher becomes ready.
    ///
    /// A hook added after the dispatcher is already active runs immediately.
    /// A hook added while [`mark_ready`](Self::mark_ready) is running its
    /// hooks joins that run.
    pub async fn on_ready(&self, hook: Arc<dyn ReadyHook>) {
        {
            let mut hooks = self.ready_hooks.lock().await;
            if !self.is_ready() {
                hooks.push(hook);
                return;
            }
        }

        warn!("Ready hook added after startup; running it now");
        run_ready_hook(0, hook).await;
    }

    /// Run the ready hooks and move from idle to active.
    ///
    /// Only the first call has an effect; hooks run exactly once and finish
    /// before any dispatch is accepted. Each hook runs in its own task, so a
    /// hook that fails or panics is logged and the dispatcher still becomes
    /// active. Concurrent callers return without waiting for the hooks.
    pub async fn mark_ready(&self) {
        if self.starting.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut index = 0;
        loop {
            let batch = {
                let mut hooks = self.ready_hooks.lock().await;
                if hooks.is_empty() {
                    // Flipped under the lock so on_ready either queues or runs a hook, never drops it.
                    self.active.store(true, Ordering::Release);
                    break;
                }
                std::mem::take(&mut *hooks)
            };

            for hook in batch {
                run_ready_hook(index, hook).await;
                index += 1;
            }
        }

        info!(hooks = index, "Dispatcher ready");
    }

    /// Wait for the next `event_name` event that satisfies `check`.
    ///
    /// The waiter is removed when this future completes, times out, or is
    /// dropped.
    ///
    /// # Errors
    ///
    /// `DispatchError::WaitTimedOut` if no matching event arrives within
    /// `timeout`.
    pub async fn wait_for<F>(
        &self,
        event_name: &str,
        check: F,
        timeout: Option<Duration>,
    ) -> Result<Arc<Context>, DispatchError>
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let id = self.next_waiter.fetch_add(1, Ordering::Relaxed);
        {
            let mut waiters = self.lock_waiters();
            waiters
                .entry(event_name.to_string())
                .or_default()
                .push(Waiter {
                    id,
                    check: Box::new(check),
                    sender,
                });
        }
        let _registration = WaiterRegistration {
            dispatcher: self,
            event_name,
            id,
        };

        let timed_out = || DispatchError::WaitTimedOut {
            event_name: event_name.to_string(),
        };

        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, receiver)
                .await
                .map_err(|_| timed_out())?,
            None => receiver.await,
        };

        // The sender only disappears without a value if the dispatcher is dropped.
        received.map_err(|_| timed_out())
    }

    /// Number of `wait_for` calls still pending for `event_name`.
    pub fn pending_waiters(&self, event_name: &str) -> usize {
        self.lock_waiters().get(event_name).map_or(0, Vec::len)
    }

    /// Dispatch a batch of events.
    ///
    /// Returns once every handler of every event has finished, failed, or
    /// timed out.
    ///
    /// # Errors
    ///
    /// `DispatchError::NotReady` while the dispatcher is idle.
    pub async fn dispatch(
        &self,
        events: Vec<EventRecord>,
        api: Arc<dyn MessagingApi>,
    ) -> Result<DispatchReport, DispatchError> {
        if !self.is_ready() {
            return Err(DispatchError::NotReady);
        }

        let mut report = DispatchReport {
            events: events.len(),
            ..DispatchReport::default()
        };
        let timeout = self.config.handler_timeout();
        let mut tasks = JoinSet::new();

        {
            let table = self.handlers.read().await;
            for event in events {
                self.cache.record(&event);
                let event_name = event.name().to_string();
                let handlers = table.get(&event_name).cloned().unwrap_or_default();
                let context = Arc::new(Context::new(event, api.clone()));

                self.notify_waiters(&event_name, &context);

                if handlers.is_empty() {
                    debug!(
                        event_id = %context.event().log_id(),
                        event_name = %event_name,
                        "No handlers registered"
                    );
                    continue;
                }

                tasks.spawn(run_event(event_name, context, handlers, timeout));
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    report.invocations += outcome.invocations;
                    report.failures.extend(outcome.failures);
                }
                Err(e) => error!(error = %e, "Event task failed"),
            }
        }

        Ok(report)
    }

    /// Run the handlers registered under `event_name` with `context`.
    ///
    /// Lets applications raise their own named events; `wait_for` callers
    /// waiting on `event_name` see them too.
    ///
    /// # Errors
    ///
    /// `DispatchError::NotReady` while the dispatcher is idle.
    pub async fn emit(
        &self,
        event_name: &str,
        context: Arc<Context>,
    ) -> Result<DispatchReport, DispatchError> {
        if !self.is_ready() {
            return Err(DispatchError::NotReady);
        }

        self.notify_waiters(event_name, &context);
        let handlers = self
            .handlers
            .read()
            .await
            .get(event_name)
            .cloned()
            .unwrap_or_default();
        debug!(event_name = %event_name, handlers = handlers.len(), "Emitting event");

        let outcome = run_event(
            event_name.to_string(),
            context,
            handlers,
            self.config.handler_timeout(),
        )
        .await;

        Ok(DispatchReport {
            events: 1,
            invocations: outcome.invocations,
            failures: outcome.failures,
        })
    }

    /// A message event dispatched earlier, by message id.
    pub fn get_message(&self, message_id: &str) -> Option<EventRecord> {
        self.cache.message(message_id)
    }

    /// Source of the latest dispatched event that named `user_id` as its actor.
    pub fn get_user(&self, user_id: &str) -> Option<Source> {
        self.cache.user(user_id)
    }

    /// Source of the latest dispatched event from group or room `group_id`.
    pub fn get_group(&self, group_id: &str) -> Option<Source> {
        self.cache.group(group_id)
    }

    /// Forget every cached message, user and group.
    pub fn clear_cache(&self) {
        self.cache.clear();
        debug!("Event cache cleared");
    }

    fn notify_waiters(&self, event_name: &str, context: &Arc<Context>) {
        let mut waiters = self.lock_waiters();
        let Some(pending) = waiters.get_mut(event_name) else {
            return;
        };

        let mut remaining = Vec::with_capacity(pending.len());
        for waiter in pending.drain(..) {
            if waiter.sender.is_closed() {
                continue;
            }
            if (waiter.check)(context) {
                // A waiter that gave up in the meantime is simply dropped.
                let _ = waiter.sender.send(context.clone());
            } else {
                remaining.push(waiter);
            }
        }
        *pending = remaining;
    }

    fn lock_waiters(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Waiter>>> {
        // Waiter checks run under this lock; a panicking check must not wedge dispatch.
        self.waiters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DispatchConfig::default())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

async fn run_ready_hook(index: usize, hook: Arc<dyn ReadyHook>) {
    let mut task = JoinSet::new();
    task.spawn(async move { hook.on_ready().await });

    match task.join_next().await {
        Some(Ok(Err(e))) => error!(hook_index = index, error = %e, "Ready hook failed"),
        Some(Err(join_error)) => {
            error!(hook_index = index, error = %join_error, "Ready hook panicked")
        }
        Some(Ok(Ok(()))) | None => {}
    }
}

async fn run_event(
    event_name: String,
    context: Arc<Context>,
    handlers: Vec<Arc<dyn EventHandler>>,
    timeout: Option<Duration>,
) -> EventOutcome {
    let mut outcome = EventOutcome::default();

    let timed_out = match timeout {
        Some(limit) => tokio::time::timeout(
            limit,
            run_handlers(&event_name, &context, &handlers, &mut outcome),
        )
        .await
        .is_err(),
        None => {
            run_handlers(&event_name, &context, &handlers, &mut outcome).await;
            false
        }
    };

    if let (true, Some(after)) = (timed_out, timeout) {
        warn!(
            event_id = %context.event().log_id(),
            event_name = %event_name,
            timeout_secs = after.as_secs(),
            "Event handlers timed out"
        );
        outcome
            .failures
            .push(HandlerError::TimedOut { event_name, after });
    }

    outcome
}

async fn run_handlers(
    event_name: &str,
    context: &Arc<Context>,
    handlers: &[Arc<dyn EventHandler>],
    outcome: &mut EventOutcome,
) {
    let event_id = context.event().log_id();

    for (handler_index, handler) in handlers.iter().enumerate() {
        let handler = handler.clone();
        let ctx = context.clone();

        // Dropping the set aborts the handler, so a timeout cancels it.
        let mut task = JoinSet::new();
        task.spawn(async move { handler.handle(ctx).await });
        outcome.invocations += 1;

        let failure = match task.join_next().await {
            Some(Ok(Ok(()))) => {
                debug!(event_id = %event_id, event_name = %event_name, handler_index, "Handler completed");
                None
            }
            Some(Ok(Err(e))) => {
                error!(
                    event_id = %event_id,
                    event_name = %event_name,
                    handler_index,
                    error = %e,
                    "Handler execution failed"
                );
                Some(HandlerError::Failed {
                    event_name: event_name.to_string(),
                    handler_index,
                    message: e.to_string(),
                })
            }
            Some(Err(join_error)) => {
                error!(
                    event_id = %event_id,
                    event_name = %event_name,
                    handler_index,
                    error = %join_error,
                    "Handler panicked"
                );
                Some(HandlerError::Panicked {
                    event_name: event_name.to_string(),
                    handler_index,
                })
            }
            None => None,
        };

        outcome.failures.extend(failure);
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
