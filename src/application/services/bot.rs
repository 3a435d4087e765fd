//! Bot core - owns the transport, the config store and the plugin registry

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use async_trait::async_trait;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::application::errors::BotError;
use crate::domain::entities::{Event, EventKind, OutgoingMessage};
use crate::domain::traits::{EventStream, Transport};
use crate::infrastructure::config::{ConfigProvider, ConfigStore};
use crate::plugins::{BotHandle, Plugin, PluginContext, PluginFactory, PluginRegistry};

/// Longest error body posted to the reporting channel
const REPORT_LIMIT: usize = 1800;

/// Handler for transport events registered through [`Bot::listen`]
#[async_trait]
pub trait Listener: Send + Sync {
    async fn handle(&self, event: Event) -> Result<(), BotError>;
}

struct FnListener<F>(F);

#[async_trait]
impl<F, Fut> Listener for FnListener<F>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BotError>> + Send + 'static,
{
    async fn handle(&self, event: Event) -> Result<(), BotError> {
        (self.0)(event).await
    }
}

/// Wrap an async closure as a [`Listener`]
pub fn listener_fn<F, Fut>(f: F) -> Arc<dyn Listener>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BotError>> + Send + 'static,
{
    Arc::new(FnListener(f))
}

struct ReadyListener(Weak<Bot>);

#[async_trait]
impl Listener for ReadyListener {
    async fn handle(&self, _event: Event) -> Result<(), BotError> {
        if let Some(bot) = self.0.upgrade() {
            bot.on_ready().await;
        }
        Ok(())
    }
}

struct TransportErrorListener;

#[async_trait]
impl Listener for TransportErrorListener {
    async fn handle(&self, event: Event) -> Result<(), BotError> {
        match event {
            Event::Error(reason) => Err(BotError::Internal(reason)),
            _ => Ok(()),
        }
    }
}

#[derive(Clone)]
struct Registered {
    context: String,
    accept_partial: bool,
    listener: Arc<dyn Listener>,
}

/// The bot core.
///
/// Plugins are registered before [`login`](Bot::login) and loaded once the
/// transport reports ready. Every listener runs inside a guard that funnels
/// failures into [`report_error`](Bot::report_error).
pub struct Bot {
    me: Weak<Bot>,
    config: Arc<ConfigStore>,
    transport: Arc<dyn Transport>,
    plugins: PluginRegistry,
    listeners: RwLock<HashMap<EventKind, Vec<Registered>>>,
    error_channel: Option<String>,
    logged_in: AtomicBool,
    ready: AtomicBool,
    plugins_loaded: AtomicBool,
    cleaned_up: AtomicBool,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Bot {
    pub fn new(config: Arc<ConfigStore>, transport: Arc<dyn Transport>) -> Result<Arc<Self>, BotError> {
        let provider = config.make_provider("bot");
        let error_channel = provider.get_typed::<Option<String>>("ERROR_CHANNEL")?;

        Ok(Arc::new_cyclic(|me| Self {
            me: me.clone(),
            config,
            transport,
            plugins: PluginRegistry::new(),
            listeners: RwLock::new(HashMap::new()),
            error_channel,
            logged_in: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            plugins_loaded: AtomicBool::new(false),
            cleaned_up: AtomicBool::new(false),
            pump: Mutex::new(None),
        }))
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn handle(&self) -> BotHandle {
        BotHandle::new(self.me.clone())
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Make a config provider outside the plugin system, e.g. for the command table
    pub fn make_provider(&self, label: impl Into<String>) -> ConfigProvider {
        self.config.make_provider(label)
    }

    /// Register the plugin `P`, constructing it and its dependencies on first use.
    ///
    /// Loading an already registered plugin returns the existing instance.
    /// Registering a new plugin after login is a usage error.
    pub fn load_plugin<P: PluginFactory>(&self) -> Result<Arc<P>, BotError> {
        if let Some(existing) = self.plugins.get::<P>() {
            return Ok(existing);
        }
        if self.is_logged_in() {
            return Err(BotError::Usage(format!(
                "cannot load plugin {} after login",
                P::NAME
            )));
        }

        for dependency in P::dependencies() {
            debug!("Plugin {} requires {}", P::NAME, dependency.name());
            dependency.load(self)?;
        }

        let ctx = PluginContext {
            bot: self.handle(),
            config: self.config.make_provider(format!("plugin-{}", P::NAME)),
        };
        let plugin = self.plugins.insert(P::NAME, Arc::new(P::create(ctx)?));
        info!("Registered plugin: {}", P::NAME);
        Ok(plugin)
    }

    /// The registered instance of `P`, if any
    pub fn plugin<P: Plugin>(&self) -> Option<Arc<P>> {
        self.plugins.get::<P>()
    }

    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.names()
    }

    /// Register a listener. Events carrying partial data are skipped.
    pub fn listen(&self, kind: EventKind, context: impl Into<String>, listener: Arc<dyn Listener>) {
        self.register(kind, context.into(), false, listener);
    }

    /// Register a listener that also receives events carrying partial data
    pub fn listen_partial(&self, kind: EventKind, context: impl Into<String>, listener: Arc<dyn Listener>) {
        self.register(kind, context.into(), true, listener);
    }

    fn register(&self, kind: EventKind, context: String, accept_partial: bool, listener: Arc<dyn Listener>) {
        debug!("Listening for {} ({})", kind.as_str(), context);
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(kind)
            .or_default()
            .push(Registered {
                context,
                accept_partial,
                listener,
            });
    }

    /// Authenticate with the platform and start pumping events.
    ///
    /// A second call is a usage error, whether or not the first succeeded.
    pub async fn login(&self, token: &str) -> Result<(), BotError> {
        if self.logged_in.swap(true, Ordering::SeqCst) {
            return Err(BotError::Usage("login called twice".to_string()));
        }

        self.listen(EventKind::Ready, "bot:ready", Arc::new(ReadyListener(self.me.clone())));
        self.listen(EventKind::Error, "bot:error", Arc::new(TransportErrorListener));

        let events = self.transport.login(token).await?;
        info!("Logged in as {:?}", self.transport.current_user().map(|u| u.username));

        let bot = self.strong()?;
        let pump = tokio::spawn(async move { bot.run(events).await });
        *self.pump.lock().unwrap_or_else(|e| e.into_inner()) = Some(pump);
        Ok(())
    }

    /// Consume the transport's event stream until it closes
    async fn run(self: Arc<Self>, mut events: EventStream) {
        while let Some(event) = events.recv().await {
            if matches!(event, Event::Ready) {
                // Plugins must be loaded before anything else is handled.
                self.dispatch(event).await;
            } else {
                let bot = Arc::clone(&self);
                tokio::spawn(async move { bot.dispatch(event).await });
            }
        }
        info!("Event stream closed");
    }

    /// Run every listener for `event` concurrently and wait for all of them
    pub async fn dispatch(&self, event: Event) {
        let kind = event.kind();
        let registered = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .cloned()
            .unwrap_or_default();
        if registered.is_empty() {
            return;
        }

        let partial = event.has_partial();
        let mut tasks = JoinSet::new();
        for reg in registered {
            if partial && !reg.accept_partial {
                debug!("Skipping {} for {}: event carries partial data", kind.as_str(), reg.context);
                continue;
            }
            let event = event.clone();
            let listener = Arc::clone(&reg.listener);
            let handle = tokio::spawn(async move { listener.handle(event).await });
            tasks.spawn(async move { (reg.context, handle.await) });
        }

        while let Some(joined) = tasks.join_next().await {
            let Ok((context, outcome)) = joined else { continue };
            let label = format!("Error in {} listener ({})", kind.as_str(), context);
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.report_error(&label, &e).await,
                Err(e) if e.is_panic() => self.report_text(&label, &panic_message(e)).await,
                Err(_) => debug!("{} was cancelled", context),
            }
        }
    }

    async fn on_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
        if self.plugins_loaded.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut loads = JoinSet::new();
        for (name, plugin) in self.plugins.all() {
            loads.spawn(async move { (name, plugin.load().await) });
        }
        while let Some(joined) = loads.join_next().await {
            match joined {
                Ok((name, Ok(()))) => info!("Loaded plugin: {}", name),
                Ok((name, Err(e))) => self.report_error(&format!("Failed to load plugin {}", name), &e).await,
                Err(e) => self.report_text("Plugin load panicked", &panic_message(e)).await,
            }
        }
    }

    /// Log an error and post it to the error channel when one is configured
    pub async fn report_error(&self, context: &str, error: &(dyn std::error::Error + Send + Sync + 'static)) {
        self.report_text(context, &error_chain(error)).await;
    }

    /// Report a value that is not an error, rendered as JSON
    pub async fn report_value(&self, context: &str, value: &serde_json::Value) {
        let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        self.report_text(context, &body).await;
    }

    pub(crate) async fn report_text(&self, context: &str, body: &str) {
        error!("{}: {}", context, body);

        let Some(channel) = &self.error_channel else { return };
        if !self.is_logged_in() {
            return;
        }
        let text = format!("**{}**\n```\n{}\n```", context, truncate(body, REPORT_LIMIT));
        // The channel may be gone, e.g. during shutdown.
        if let Err(e) = self.transport.send_message(channel, OutgoingMessage::text(text)).await {
            warn!("Failed to post error report: {}", e);
        }
    }

    /// Clean up every plugin in registration order, then close the transport.
    ///
    /// Safe to call from a signal handler. A second call is a usage error.
    pub async fn cleanup(&self) -> Result<(), BotError> {
        if self.cleaned_up.swap(true, Ordering::SeqCst) {
            return Err(BotError::Usage("cleanup called twice".to_string()));
        }

        for (name, plugin) in self.plugins.all() {
            match plugin.cleanup().await {
                Ok(()) => debug!("Cleaned up plugin: {}", name),
                Err(e) => self.report_error(&format!("Failed to clean up plugin {}", name), &e).await,
            }
        }

        if let Some(pump) = self.pump.lock().unwrap_or_else(|e| e.into_inner()).take() {
            pump.abort();
        }
        if self.is_logged_in() {
            self.transport.destroy().await?;
        }
        info!("Bot shut down");
        Ok(())
    }

    fn strong(&self) -> Result<Arc<Self>, BotError> {
        self.me
            .upgrade()
            .ok_or_else(|| BotError::Internal("bot is being dropped".to_string()))
    }
}

/// Render an error with its source chain
pub(crate) fn error_chain(error: &(dyn std::error::Error + Send + Sync + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str("\ncaused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

pub(crate) fn panic_message(error: tokio::task::JoinError) -> String {
    match error.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic with non-string payload".to_string()),
        Err(e) => e.to_string(),
    }
}

/// Cut `text` to at most `limit` characters
pub(crate) fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => format!("{}…", &text[..end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::PluginError;
    use crate::domain::entities::{Message, User};
    use crate::infrastructure::adapters::memory::MemoryTransport;
    use crate::infrastructure::config::ConfigSource;
    use crate::plugins::Dependency;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    static BASE_LOADS: AtomicUsize = AtomicUsize::new(0);

    struct Base;

    #[async_trait]
    impl Plugin for Base {
        async fn load(&self) -> Result<(), PluginError> {
            BASE_LOADS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl PluginFactory for Base {
        const NAME: &'static str = "Base";

        fn create(_ctx: PluginContext) -> Result<Self, BotError> {
            Ok(Base)
        }
    }

    struct Dependent {
        base: Arc<Base>,
    }

    impl Plugin for Dependent {}

    impl PluginFactory for Dependent {
        const NAME: &'static str = "Dependent";

        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::of::<Base>()]
        }

        fn create(ctx: PluginContext) -> Result<Self, BotError> {
            let bot = ctx.bot.get()?;
            let base = bot
                .plugin::<Base>()
                .ok_or_else(|| BotError::Internal("Base missing".to_string()))?;
            Ok(Dependent { base })
        }
    }

    struct Strict;

    impl Plugin for Strict {}

    impl PluginFactory for Strict {
        const NAME: &'static str = "Strict";

        fn create(ctx: PluginContext) -> Result<Self, BotError> {
            ctx.config.get_typed::<u32>("STRICT_LIMIT")?;
            Ok(Strict)
        }
    }

    fn bot_with(config: serde_json::Value) -> (Arc<Bot>, Arc<MemoryTransport>) {
        let store = ConfigStore::with_sources([ConfigSource::raw(config)]).unwrap();
        let transport = Arc::new(MemoryTransport::new(User::bot("100", "twink")));
        let bot = Bot::new(store, transport.clone()).unwrap();
        (bot, transport)
    }

    #[tokio::test]
    async fn test_load_plugin_is_idempotent_and_loads_once() {
        let (bot, _transport) = bot_with(json!({}));
        let before = BASE_LOADS.load(Ordering::SeqCst);

        let first = bot.load_plugin::<Base>().unwrap();
        let second = bot.load_plugin::<Base>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(bot.plugin_names(), vec!["Base"]);

        bot.login("token").await.unwrap();
        bot.dispatch(Event::Ready).await;
        bot.dispatch(Event::Ready).await;
        assert!(bot.is_ready());
        assert_eq!(BASE_LOADS.load(Ordering::SeqCst) - before, 1);
    }

    #[tokio::test]
    async fn test_dependencies_register_first() {
        let (bot, _transport) = bot_with(json!({}));
        let dependent = bot.load_plugin::<Dependent>().unwrap();

        assert_eq!(bot.plugin_names(), vec!["Base", "Dependent"]);
        assert!(Arc::ptr_eq(&dependent.base, &bot.plugin::<Base>().unwrap()));
    }

    #[tokio::test]
    async fn test_plugin_after_login_is_rejected() {
        let (bot, _transport) = bot_with(json!({}));
        bot.login("token").await.unwrap();

        let err = bot.load_plugin::<Base>().err().unwrap();
        assert!(matches!(err, BotError::Usage(_)));
    }

    #[tokio::test]
    async fn test_double_login_is_rejected() {
        let (bot, transport) = bot_with(json!({}));
        bot.login("token").await.unwrap();

        assert!(matches!(bot.login("token").await, Err(BotError::Usage(_))));
        assert_eq!(transport.login_count(), 1);
    }

    #[tokio::test]
    async fn test_login_after_failed_login_is_rejected() {
        let (bot, transport) = bot_with(json!({}));
        transport.fail_next_login();

        assert!(matches!(bot.login("token").await, Err(BotError::Transport(_))));
        assert!(matches!(bot.login("token").await, Err(BotError::Usage(_))));
        assert_eq!(transport.login_count(), 1);
    }

    #[tokio::test]
    async fn test_bad_config_aborts_plugin_construction() {
        let (bot, _transport) = bot_with(json!({"STRICT_LIMIT": "lots"}));
        let err = bot.load_plugin::<Strict>().err().unwrap();
        assert!(matches!(err, BotError::Config(_)));
        assert!(bot.plugin::<Strict>().is_none());
    }

    #[tokio::test]
    async fn test_listener_errors_are_reported_to_channel() {
        let (bot, transport) = bot_with(json!({"ERROR_CHANNEL": "errors"}));
        bot.login("token").await.unwrap();
        bot.listen(
            EventKind::MessageCreate,
            "test",
            listener_fn(|_| async { Err::<(), _>(BotError::Internal("boom".to_string())) }),
        );

        let msg = Message::new("c", User::new("1", "alice"), "hi");
        bot.dispatch(Event::MessageCreate(msg)).await;

        let sent = transport.sent_to("errors");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].content.contains("boom"));
        assert!(sent[0].content.contains("messageCreate"));
    }

    #[tokio::test]
    async fn test_listener_panics_are_contained() {
        let (bot, transport) = bot_with(json!({"ERROR_CHANNEL": "errors"}));
        bot.login("token").await.unwrap();
        bot.listen(
            EventKind::MessageCreate,
            "test",
            listener_fn(|_| async {
                if true {
                    panic!("kaboom");
                }
                Ok::<(), BotError>(())
            }),
        );

        let msg = Message::new("c", User::new("1", "alice"), "hi");
        bot.dispatch(Event::MessageCreate(msg)).await;

        assert!(transport.sent_to("errors")[0].content.contains("kaboom"));
    }

    #[tokio::test]
    async fn test_partial_events_skip_strict_listeners() {
        let (bot, _transport) = bot_with(json!({}));
        let strict = Arc::new(AtomicUsize::new(0));
        let lenient = Arc::new(AtomicUsize::new(0));

        let counter = strict.clone();
        bot.listen(
            EventKind::MessageCreate,
            "strict",
            listener_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<(), BotError>(()) }
            }),
        );
        let counter = lenient.clone();
        bot.listen_partial(
            EventKind::MessageCreate,
            "lenient",
            listener_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<(), BotError>(()) }
            }),
        );

        let msg = Message::new("c", User::new("1", "alice"), "hi").as_partial();
        bot.dispatch(Event::MessageCreate(msg)).await;

        assert_eq!(strict.load(Ordering::SeqCst), 0);
        assert_eq!(lenient.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cleanup_runs_once_and_closes_transport() {
        let (bot, transport) = bot_with(json!({}));
        bot.load_plugin::<Base>().unwrap();
        bot.login("token").await.unwrap();

        bot.cleanup().await.unwrap();
        assert!(transport.is_destroyed());
        assert!(matches!(bot.cleanup().await, Err(BotError::Usage(_))));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 10), "héllo");
        assert_eq!(truncate("héllo", 2), "hé…");
    }
}
