//! Tests for the Dispatcher.

use super::*;
use crate::client::{Message, OAuthCodeExchange, Profile};
use crate::config::Secret;
use crate::error::{ApiError, BoxError};
use crate::events::ReplyToken;
use async_trait::async_trait;
use serde_json::json;

// ============================================================================
// Test Doubles
// ============================================================================

struct NullApi;

#[async_trait]
impl MessagingApi for NullApi {
    async fn send_reply(&self, _: &ReplyToken, _: &[Message]) -> Result<(), ApiError> {
        Ok(())
    }

    async fn push_message(&self, _: &str, _: &[Message]) -> Result<(), ApiError> {
        Ok(())
    }

    async fn exchange_oauth_token(&self, _: &OAuthCodeExchange) -> Result<Secret, ApiError> {
        Err(ApiError::AuthenticationFailed)
    }

    async fn get_profile(&self, _: &str) -> Result<Profile, ApiError> {
        Err(ApiError::NotFound)
    }
}

fn api() -> Arc<dyn MessagingApi> {
    Arc::new(NullApi)
}

/// Records a labelled entry every time it runs.
struct RecordingHandler {
    label: String,
    log: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
    fail: bool,
}

impl RecordingHandler {
    fn new(label: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            label: label.to_string(),
            log: log.clone(),
            delay: None,
            fail: false,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, ctx: Arc<Context>) -> Result<(), BoxError> {
        self.log
            .lock()
            .await
            .push(format!("{}:start:{}", self.label, ctx.event().log_id()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.log
            .lock()
            .await
            .push(format!("{}:end:{}", self.label, ctx.event().log_id()));
        if self.fail {
            return Err(format!("{} failed", self.label).into());
        }
        Ok(())
    }
}

struct PanickingHandler;

#[async_trait]
impl EventHandler for PanickingHandler {
    async fn handle(&self, _ctx: Arc<Context>) -> Result<(), BoxError> {
        panic!("handler bug");
    }
}

fn text_event(id: &str, text: &str) -> EventRecord {
    let mut event = EventRecord::new(
        EventKind::Text,
        json!({ "type": "message", "message": { "type": "text", "id": id, "text": text } }),
    );
    event.webhook_event_id = Some(id.to_string());
    event.reply_token = Some(ReplyToken::new(format!("token-{}", id)));
    event
}

fn event_of(kind: EventKind, id: &str) -> EventRecord {
    let mut event = EventRecord::new(kind, json!({}));
    event.webhook_event_id = Some(id.to_string());
    event
}

async fn ready_dispatcher(config: DispatchConfig) -> Dispatcher {
    let dispatcher = Dispatcher::new(config);
    dispatcher.mark_ready().await;
    dispatcher
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_dispatch_before_ready_is_rejected() {
    let dispatcher = Dispatcher::default();

    let result = dispatcher.dispatch(vec![text_event("e1", "hi")], api()).await;

    assert!(matches!(result, Err(DispatchError::NotReady)));
    assert_eq!(dispatcher.state(), DispatcherState::Idle);
}

#[tokio::test]
async fn test_ready_hooks_run_exactly_once() {
    // Arrange
    let dispatcher = Dispatcher::default();
    let calls = Arc::new(Mutex::new(0usize));
    let counter = calls.clone();
    dispatcher
        .on_ready(ready_fn(move || {
            let counter = counter.clone();
            async move {
                *counter.lock().await += 1;
                Ok::<(), BoxError>(())
            }
        }))
        .await;

    // Act
    dispatcher.mark_ready().await;
    dispatcher.mark_ready().await;

    // Assert
    assert_eq!(*calls.lock().await, 1);
    assert_eq!(dispatcher.state(), DispatcherState::Active);
}

#[tokio::test]
async fn test_failing_ready_hook_still_activates() {
    let dispatcher = Dispatcher::default();
    dispatcher
        .on_ready(ready_fn(|| async { Err::<(), BoxError>("no bot info".into()) }))
        .await;

    dispatcher.mark_ready().await;

    assert!(dispatcher.is_ready());
}

struct PanickingHook;

#[async_trait]
impl ReadyHook for PanickingHook {
    async fn on_ready(&self) -> Result<(), BoxError> {
        panic!("hook bug");
    }
}

#[tokio::test]
async fn test_panicking_ready_hook_still_activates() {
    // Arrange
    let dispatcher = Dispatcher::default();
    let ran = Arc::new(Mutex::new(false));
    let flag = ran.clone();
    dispatcher.on_ready(Arc::new(PanickingHook)).await;
    dispatcher
        .on_ready(ready_fn(move || {
            let flag = flag.clone();
            async move {
                *flag.lock().await = true;
                Ok::<(), BoxError>(())
            }
        }))
        .await;

    // Act
    dispatcher.mark_ready().await;

    // Assert
    assert!(dispatcher.is_ready());
    assert!(*ran.lock().await);
}

/// Registers another hook from inside its own `on_ready`.
struct ChainingHook {
    dispatcher: Arc<Dispatcher>,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ReadyHook for ChainingHook {
    async fn on_ready(&self) -> Result<(), BoxError> {
        self.log.lock().await.push("first".to_string());
        let log = self.log.clone();
        self.dispatcher
            .on_ready(ready_fn(move || {
                let log = log.clone();
                async move {
                    log.lock().await.push("second".to_string());
                    Ok::<(), BoxError>(())
                }
            }))
            .await;
        Ok(())
    }
}

#[tokio::test]
async fn test_ready_hook_may_register_another_hook() {
    // Arrange
    let dispatcher = Arc::new(Dispatcher::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    dispatcher
        .on_ready(Arc::new(ChainingHook {
            dispatcher: dispatcher.clone(),
            log: log.clone(),
        }))
        .await;

    // Act
    tokio::time::timeout(Duration::from_secs(5), dispatcher.mark_ready())
        .await
        .expect("mark_ready must not deadlock");

    // Assert
    assert!(dispatcher.is_ready());
    assert_eq!(*log.lock().await, vec!["first", "second"]);
}

#[tokio::test]
async fn test_hook_added_after_ready_runs_immediately() {
    let dispatcher = ready_dispatcher(DispatchConfig::default()).await;
    let ran = Arc::new(Mutex::new(false));
    let flag = ran.clone();

    dispatcher
        .on_ready(ready_fn(move || {
            let flag = flag.clone();
            async move {
                *flag.lock().await = true;
                Ok::<(), BoxError>(())
            }
        }))
        .await;

    assert!(*ran.lock().await);
}

#[tokio::test]
async fn test_register_is_valid_in_any_state() {
    let dispatcher = Dispatcher::default();
    let log = Arc::new(Mutex::new(Vec::new()));

    dispatcher
        .register("text", Arc::new(RecordingHandler::new("before", &log)))
        .await;
    dispatcher.mark_ready().await;
    dispatcher
        .register("text", Arc::new(RecordingHandler::new("after", &log)))
        .await;

    assert_eq!(dispatcher.handler_count("text").await, 2);
}

// ============================================================================
// Routing and Ordering
// ============================================================================

#[tokio::test]
async fn test_handlers_run_in_registration_order() {
    // Arrange
    let dispatcher = ready_dispatcher(DispatchConfig::default()).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    dispatcher
        .register(
            "text",
            Arc::new(RecordingHandler::new("h1", &log).with_delay(Duration::from_millis(30))),
        )
        .await;
    dispatcher
        .register("text", Arc::new(RecordingHandler::new("h2", &log)))
        .await;

    // Act
    let report = dispatcher
        .dispatch(vec![text_event("e1", "hi")], api())
        .await
        .unwrap();

    // Assert
    assert_eq!(report.invocations, 2);
    assert!(report.is_clean());
    assert_eq!(
        *log.lock().await,
        vec!["h1:start:e1", "h1:end:e1", "h2:start:e1", "h2:end:e1"]
    );
}

#[tokio::test]
async fn test_events_in_one_batch_run_concurrently() {
    let dispatcher = ready_dispatcher(DispatchConfig::default()).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    dispatcher
        .register(
            "text",
            Arc::new(RecordingHandler::new("h", &log).with_delay(Duration::from_millis(50))),
        )
        .await;

    dispatcher
        .dispatch(vec![text_event("e1", "a"), text_event("e2", "b")], api())
        .await
        .unwrap();

    // Both events start before either finishes.
    let log = log.lock().await;
    let first_end = log.iter().position(|entry| entry.contains(":end:")).unwrap();
    let starts_before_end = log[..first_end]
        .iter()
        .filter(|entry| entry.contains(":start:"))
        .count();
    assert_eq!(starts_before_end, 2);
}

#[tokio::test]
async fn test_only_matching_event_name_is_invoked() {
    let dispatcher = ready_dispatcher(DispatchConfig::default()).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    dispatcher
        .register_kind(EventKind::Follow, Arc::new(RecordingHandler::new("follow", &log)))
        .await;
    dispatcher
        .register("text", Arc::new(RecordingHandler::new("text", &log)))
        .await;

    let report = dispatcher
        .dispatch(
            vec![
                event_of(EventKind::Follow, "f1"),
                event_of(EventKind::Unknown("membership".to_string()), "u1"),
            ],
            api(),
        )
        .await
        .unwrap();

    assert_eq!(report.events, 2);
    assert_eq!(report.invocations, 1);
    assert_eq!(*log.lock().await, vec!["follow:start:f1", "follow:end:f1"]);
}

#[tokio::test]
async fn test_handlers_of_one_event_share_the_same_context() {
    let dispatcher = ready_dispatcher(DispatchConfig::default()).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..2 {
        let seen = seen.clone();
        dispatcher
            .register(
                "text",
                handler_fn(move |ctx: Arc<Context>| {
                    let seen = seen.clone();
                    async move {
                        seen.lock().await.push(Arc::as_ptr(&ctx) as usize);
                        Ok::<(), BoxError>(())
                    }
                }),
            )
            .await;
    }

    dispatcher
        .dispatch(vec![text_event("e1", "x")], api())
        .await
        .unwrap();

    let seen = seen.lock().await;
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
}

// ============================================================================
// Failure Isolation
// ============================================================================

#[tokio::test]
async fn test_failing_handler_does_not_stop_siblings() {
    // Arrange
    let dispatcher = ready_dispatcher(DispatchConfig::default()).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    dispatcher
        .register("text", Arc::new(RecordingHandler::new("bad", &log).failing()))
        .await;
    dispatcher
        .register("text", Arc::new(RecordingHandler::new("good", &log)))
        .await;

    // Act
    let report = dispatcher
        .dispatch(vec![text_event("e1", "a"), text_event("e2", "b")], api())
        .await
        .expect("dispatch completes despite handler failures");

    // Assert
    assert_eq!(report.invocations, 4);
    assert_eq!(report.failures.len(), 2);
    assert!(report
        .failures
        .iter()
        .all(|f| matches!(f, HandlerError::Failed { handler_index: 0, .. })));
    let log = log.lock().await;
    assert!(log.contains(&"good:end:e1".to_string()));
    assert!(log.contains(&"good:end:e2".to_string()));
}

#[tokio::test]
async fn test_panicking_handler_is_contained() {
    let dispatcher = ready_dispatcher(DispatchConfig::default()).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    dispatcher.register("follow", Arc::new(PanickingHandler)).await;
    dispatcher
        .register("follow", Arc::new(RecordingHandler::new("after", &log)))
        .await;

    let report = dispatcher
        .dispatch(vec![event_of(EventKind::Follow, "f1")], api())
        .await
        .unwrap();

    assert!(matches!(
        report.failures.as_slice(),
        [HandlerError::Panicked { handler_index: 0, .. }]
    ));
    assert_eq!(*log.lock().await, vec!["after:start:f1", "after:end:f1"]);
}

#[tokio::test]
async fn test_handler_timeout_cancels_event() {
    let config = DispatchConfig {
        handler_timeout_seconds: Some(1),
        ..DispatchConfig::default()
    };
    let dispatcher = ready_dispatcher(config).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    dispatcher
        .register(
            "text",
            Arc::new(RecordingHandler::new("slow", &log).with_delay(Duration::from_secs(5))),
        )
        .await;
    dispatcher
        .register("text", Arc::new(RecordingHandler::new("never", &log)))
        .await;

    let report = dispatcher
        .dispatch(vec![text_event("e1", "x")], api())
        .await
        .unwrap();

    assert!(matches!(
        report.failures.as_slice(),
        [HandlerError::TimedOut { event_name, .. }] if event_name == "text"
    ));
    assert_eq!(*log.lock().await, vec!["slow:start:e1"]);
}

// ============================================================================
// wait_for
// ============================================================================

#[tokio::test]
async fn test_wait_for_receives_matching_event() {
    let dispatcher = Arc::new(ready_dispatcher(DispatchConfig::default()).await);

    let waiter = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .wait_for(
                    "text",
                    |ctx| ctx.text() == Some("yes"),
                    Some(Duration::from_secs(5)),
                )
                .await
        })
    };
    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    dispatcher
        .dispatch(vec![text_event("e1", "no"), text_event("e2", "yes")], api())
        .await
        .unwrap();

    let ctx = waiter.await.unwrap().expect("matching event delivered");
    assert_eq!(ctx.event().log_id(), "e2");
}

#[tokio::test]
async fn test_wait_for_times_out() {
    let dispatcher = ready_dispatcher(DispatchConfig::default()).await;

    let result = dispatcher
        .wait_for("follow", |_| true, Some(Duration::from_millis(20)))
        .await;

    assert!(matches!(
        result,
        Err(DispatchError::WaitTimedOut { event_name }) if event_name == "follow"
    ));
}

#[tokio::test]
async fn test_timed_out_waiters_are_removed() {
    // Arrange
    let dispatcher = ready_dispatcher(DispatchConfig::default()).await;

    // Act
    for _ in 0..100 {
        let result = dispatcher
            .wait_for("beacon", |_| true, Some(Duration::from_millis(1)))
            .await;
        assert!(matches!(result, Err(DispatchError::WaitTimedOut { .. })));
    }

    // Assert
    assert_eq!(dispatcher.pending_waiters("beacon"), 0);
    assert!(!dispatcher.lock_waiters().contains_key("beacon"));
}

#[tokio::test]
async fn test_dropped_wait_is_removed() {
    let dispatcher = Arc::new(ready_dispatcher(DispatchConfig::default()).await);

    let waiting = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.wait_for("follow", |_| true, None).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(dispatcher.pending_waiters("follow"), 1);

    waiting.abort();
    let _ = waiting.await;

    assert_eq!(dispatcher.pending_waiters("follow"), 0);
}

// ============================================================================
// emit
// ============================================================================

#[tokio::test]
async fn test_emit_runs_handlers_for_custom_event() {
    // Arrange
    let dispatcher = ready_dispatcher(DispatchConfig::default()).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    dispatcher
        .register("order_placed", Arc::new(RecordingHandler::new("audit", &log)))
        .await;
    dispatcher
        .register("order_placed", Arc::new(RecordingHandler::new("bill", &log).failing()))
        .await;
    let context = Arc::new(Context::new(text_event("e1", "pizza"), api()));

    // Act
    let report = dispatcher.emit("order_placed", context).await.unwrap();

    // Assert
    assert_eq!(report.events, 1);
    assert_eq!(report.invocations, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        *log.lock().await,
        vec!["audit:start:e1", "audit:end:e1", "bill:start:e1", "bill:end:e1"]
    );
}

#[tokio::test]
async fn test_emit_without_handlers_is_clean() {
    let dispatcher = ready_dispatcher(DispatchConfig::default()).await;
    let context = Arc::new(Context::new(event_of(EventKind::Follow, "e1"), api()));

    let report = dispatcher.emit("nobody_listens", context).await.unwrap();

    assert_eq!(report.invocations, 0);
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_emit_before_ready_is_rejected() {
    let dispatcher = Dispatcher::default();
    let context = Arc::new(Context::new(event_of(EventKind::Follow, "e1"), api()));

    let result = dispatcher.emit("custom", context).await;

    assert!(matches!(result, Err(DispatchError::NotReady)));
}

#[tokio::test]
async fn test_emit_wakes_waiters() {
    let dispatcher = Arc::new(ready_dispatcher(DispatchConfig::default()).await);
    let waiter = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .wait_for("custom", |_| true, Some(Duration::from_secs(5)))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let context = Arc::new(Context::new(event_of(EventKind::Follow, "e7"), api()));
    dispatcher.emit("custom", context).await.unwrap();

    let ctx = waiter.await.unwrap().expect("emitted event delivered");
    assert_eq!(ctx.event().log_id(), "e7");
}

// ============================================================================
// Cache
// ============================================================================

#[tokio::test]
async fn test_dispatched_messages_are_cached() {
    // Arrange
    let dispatcher = ready_dispatcher(DispatchConfig::default()).await;
    let mut event = text_event("m1", "remember me");
    event.source = Some(crate::events::Source {
        kind: crate::events::SourceKind::User,
        id: "U1".to_string(),
        user_id: Some("U1".to_string()),
    });

    // Act
    dispatcher.dispatch(vec![event], api()).await.unwrap();

    // Assert
    let cached = dispatcher.get_message("m1").expect("message cached");
    assert_eq!(cached.raw_payload["message"]["text"], "remember me");
    assert!(dispatcher.get_user("U1").is_some());
    assert!(dispatcher.get_group("U1").is_none());

    dispatcher.clear_cache();
    assert!(dispatcher.get_message("m1").is_none());
    assert!(dispatcher.get_user("U1").is_none());
}

// ============================================================================
// Commands and Postbacks
// ============================================================================

fn recording_args(log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn ArgumentHandler> {
    let log = log.clone();
    args_fn(move |_ctx: Arc<Context>, args: Vec<String>| {
        let log = log.clone();
        async move {
            log.lock().await.push(args.join("|"));
            Ok::<(), BoxError>(())
        }
    })
}

#[tokio::test]
async fn test_command_receives_arguments() {
    let dispatcher = ready_dispatcher(DispatchConfig::default()).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    dispatcher
        .command("!order", recording_args(&log))
        .await
        .unwrap();

    dispatcher
        .dispatch(
            vec![
                text_event("e1", "!order pizza;2"),
                text_event("e2", "!orders nothing"),
                text_event("e3", "hello"),
            ],
            api(),
        )
        .await
        .unwrap();

    assert_eq!(*log.lock().await, vec!["pizza|2"]);
}

#[tokio::test]
async fn test_duplicate_command_is_rejected() {
    let dispatcher = Dispatcher::default();
    let log = Arc::new(Mutex::new(Vec::new()));
    dispatcher.command("help", recording_args(&log)).await.unwrap();

    let result = dispatcher.command("help", recording_args(&log)).await;

    assert!(matches!(
        result,
        Err(DispatchError::DuplicateCommand { name }) if name == "help"
    ));
    assert_eq!(dispatcher.handler_count("text").await, 1);
}

#[tokio::test]
async fn test_postback_routes_by_prefix() {
    let dispatcher = ready_dispatcher(DispatchConfig::default()).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    dispatcher.postback("vote", recording_args(&log)).await;

    let mut vote = event_of(EventKind::Postback, "p1");
    vote.reply_token = Some(ReplyToken::new("r"));
    vote.raw_payload = json!({ "postback": { "data": postback_data("vote", ["7", "yes"]) } });
    let mut other = event_of(EventKind::Postback, "p2");
    other.raw_payload = json!({ "postback": { "data": "menu;1" } });

    dispatcher.dispatch(vec![vote, other], api()).await.unwrap();

    assert_eq!(*log.lock().await, vec!["7|yes"]);
}

#[test]
fn test_dispatch_config_defaults() {
    let config = DispatchConfig::default();

    assert_eq!(config.mode, DispatchMode::Background);
    assert!(config.ignore_standby);
    assert_eq!(config.handler_timeout(), None);
    assert_eq!(config.cache_capacity, 1000);
}
