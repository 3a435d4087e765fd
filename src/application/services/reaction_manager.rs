//! Reaction menus - run a handler per emoji until finished or timed out

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::errors::TransportError;
use crate::domain::entities::{Message, Reaction, ReactionFilter};
use crate::domain::traits::Transport;

pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Called for each accepted reaction of its emoji
pub type ReactionHandler = Arc<dyn Fn(Reaction) -> BoxFuture + Send + Sync>;

type TimeoutHandler = Arc<dyn Fn() -> BoxFuture + Send + Sync>;

const DEFAULT_IDLE: Duration = Duration::from_secs(60);

/// Ends a listening [`ReactionManager`] from anywhere, e.g. inside a handler
#[derive(Clone)]
pub struct Finisher(Arc<watch::Sender<bool>>);

impl Finisher {
    pub fn finish(&self) {
        self.0.send_replace(true);
    }
}

/// Listens for reactions on one message.
///
/// Reactions are processed one at a time. Listening ends on [`finish`](Self::finish),
/// when the absolute timeout fires, or when no reaction arrives within the
/// idle timeout.
pub struct ReactionManager {
    transport: Arc<dyn Transport>,
    channel_id: String,
    message_id: String,
    handlers: Vec<(String, ReactionHandler)>,
    allowed_users: HashSet<String>,
    idle_timeout: Duration,
    timeout: Option<Duration>,
    on_timed_out: Option<TimeoutHandler>,
    finished: Arc<watch::Sender<bool>>,
    timed_out: Arc<AtomicBool>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl ReactionManager {
    pub fn new(transport: Arc<dyn Transport>, message: &Message) -> Self {
        let (finished, _) = watch::channel(false);
        Self {
            transport,
            channel_id: message.channel_id.clone(),
            message_id: message.id.clone(),
            handlers: Vec::new(),
            allowed_users: HashSet::new(),
            idle_timeout: DEFAULT_IDLE,
            timeout: None,
            on_timed_out: None,
            finished: Arc::new(finished),
            timed_out: Arc::new(AtomicBool::new(false)),
            timer: Mutex::new(None),
        }
    }

    /// Restrict to these users; by default anyone but the bot is accepted
    pub fn allow_user(mut self, user_id: impl Into<String>) -> Self {
        self.allowed_users.insert(user_id.into());
        self
    }

    pub fn on<F, Fut>(mut self, emoji: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Reaction) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: ReactionHandler = Arc::new(move |reaction: Reaction| -> BoxFuture { Box::pin(handler(reaction)) });
        self.handlers.push((emoji.into(), handler));
        self
    }

    /// Stop after this long without a reaction
    pub fn idle_timeout(mut self, idle: Duration) -> Self {
        self.idle_timeout = idle;
        self
    }

    /// Stop after this long regardless of activity
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Called once if listening times out before any reaction was accepted
    pub fn on_timed_out<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: TimeoutHandler = Arc::new(move || -> BoxFuture { Box::pin(callback()) });
        self.on_timed_out = Some(callback);
        self
    }

    pub fn finisher(&self) -> Finisher {
        Finisher(Arc::clone(&self.finished))
    }

    pub fn is_finished(&self) -> bool {
        *self.finished.borrow()
    }

    /// Add the menu's reactions and process reactions until finished.
    ///
    /// A transport failure finishes the menu before it is returned.
    pub async fn listen(&self) -> Result<(), TransportError> {
        let result = self.collect().await;
        if result.is_err() {
            self.finish();
        }
        result
    }

    async fn collect(&self) -> Result<(), TransportError> {
        for (emoji, _) in &self.handlers {
            self.transport
                .add_reaction(&self.channel_id, &self.message_id, emoji)
                .await?;
        }

        if let Some(timeout) = self.timeout {
            let finished = Arc::clone(&self.finished);
            let timed_out = Arc::clone(&self.timed_out);
            let timer = tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                timed_out.store(true, Ordering::SeqCst);
                finished.send_replace(true);
            });
            *self.timer.lock().unwrap_or_else(|e| e.into_inner()) = Some(timer);
        }

        let filter = ReactionFilter {
            emojis: self.handlers.iter().map(|(emoji, _)| emoji.clone()).collect(),
            users: self.allowed_users.clone(),
            exclude_user: self.transport.current_user().map(|me| me.id),
        };

        let mut finished = self.finished.subscribe();
        let mut collected = 0usize;
        loop {
            let done = *finished.borrow_and_update();
            if done {
                break;
            }

            let reactions = tokio::select! {
                result = self.transport.await_reactions(&self.channel_id, &self.message_id, &filter, 1, self.idle_timeout) => result?,
                _ = finished.changed() => continue,
            };
            let Some(reaction) = reactions.into_iter().next() else {
                debug!("Reaction menu on {} went idle", self.message_id);
                self.timed_out.store(true, Ordering::SeqCst);
                break;
            };

            collected += 1;
            if let Some((_, handler)) = self.handlers.iter().find(|(emoji, _)| *emoji == reaction.emoji) {
                handler(reaction).await;
            }
        }

        self.finish();
        if collected == 0 && self.timed_out.load(Ordering::SeqCst) {
            if let Some(callback) = &self.on_timed_out {
                callback().await;
            }
        }
        Ok(())
    }

    /// Stop listening; the loop exits at its next check
    pub fn finish(&self) {
        if let Some(timer) = self.timer.lock().unwrap_or_else(|e| e.into_inner()).take() {
            timer.abort();
        }
        self.finished.send_replace(true);
    }

    /// Finish, then remove the menu's reactions from the message
    pub async fn clear(&self) {
        self.finish();
        for (emoji, _) in &self.handlers {
            if let Err(e) = self
                .transport
                .remove_reactions(&self.channel_id, &self.message_id, emoji)
                .await
            {
                warn!("Failed to remove {} reactions from {}: {}", emoji, self.message_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::User;
    use crate::infrastructure::adapters::memory::{MemoryTransport, Outbound};
    use std::sync::atomic::AtomicUsize;

    fn setup() -> (Arc<MemoryTransport>, Message) {
        let transport = Arc::new(MemoryTransport::new(User::bot("100", "twink")));
        let message = Message::new("chan", User::bot("100", "twink"), "menu").with_id("m1");
        (transport, message)
    }

    #[tokio::test]
    async fn test_handlers_run_for_accepted_reactions() {
        let (transport, message) = setup();
        transport.queue_reaction(Reaction::new("chan", "m1", "👍", User::new("1", "alice")));
        transport.queue_reaction(Reaction::new("chan", "m1", "👍", User::bot("100", "twink")));
        transport.queue_reaction(Reaction::new("chan", "m1", "👍", User::new("2", "bob")));

        let hits = Arc::new(AtomicUsize::new(0));
        let timeouts = Arc::new(AtomicUsize::new(0));
        let (h, t) = (hits.clone(), timeouts.clone());
        let manager = ReactionManager::new(transport.clone(), &message)
            .idle_timeout(Duration::from_millis(50))
            .on("👍", move |_| {
                h.fetch_add(1, Ordering::SeqCst);
                async {}
            })
            .on_timed_out(move || {
                t.fetch_add(1, Ordering::SeqCst);
                async {}
            });

        manager.listen().await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(timeouts.load(Ordering::SeqCst), 0);
        assert!(manager.is_finished());
        assert!(matches!(&transport.outbound()[0], Outbound::AddReaction { emoji, .. } if emoji == "👍"));
    }

    #[tokio::test]
    async fn test_idle_without_reactions_fires_timeout_once() {
        let (transport, message) = setup();
        let timeouts = Arc::new(AtomicUsize::new(0));
        let t = timeouts.clone();
        let manager = ReactionManager::new(transport, &message)
            .idle_timeout(Duration::from_millis(20))
            .on("✅", |_| async {})
            .on_timed_out(move || {
                t.fetch_add(1, Ordering::SeqCst);
                async {}
            });

        manager.listen().await.unwrap();
        assert_eq!(timeouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_finish_from_handler_stops_listening() {
        let (transport, message) = setup();
        for _ in 0..3 {
            transport.queue_reaction(Reaction::new("chan", "m1", "⏹", User::new("1", "alice")));
        }

        let hits = Arc::new(AtomicUsize::new(0));
        let manager = ReactionManager::new(transport.clone(), &message).idle_timeout(Duration::from_secs(5));
        let finisher = manager.finisher();
        let h = hits.clone();
        let manager = manager.on("⏹", move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            finisher.finish();
            async {}
        });

        manager.listen().await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        manager.clear().await;
        assert!(transport
            .outbound()
            .iter()
            .any(|op| matches!(op, Outbound::RemoveReactions { emoji, .. } if emoji == "⏹")));
    }

    #[tokio::test]
    async fn test_absolute_timeout_ends_listening() {
        let (transport, message) = setup();
        let manager = ReactionManager::new(transport, &message)
            .idle_timeout(Duration::from_secs(5))
            .timeout(Duration::from_millis(30))
            .on("✅", |_| async {});

        tokio::time::timeout(Duration::from_secs(2), manager.listen())
            .await
            .expect("listening should stop at the absolute timeout")
            .unwrap();
        assert!(manager.is_finished());
    }

    #[tokio::test]
    async fn test_absolute_timeout_fires_timeout_handler() {
        let (transport, message) = setup();
        let timeouts = Arc::new(AtomicUsize::new(0));
        let t = timeouts.clone();
        let manager = ReactionManager::new(transport, &message)
            .idle_timeout(Duration::from_secs(5))
            .timeout(Duration::from_millis(30))
            .on("✅", |_| async {})
            .on_timed_out(move || {
                t.fetch_add(1, Ordering::SeqCst);
                async {}
            });

        tokio::time::timeout(Duration::from_secs(2), manager.listen())
            .await
            .expect("listening should stop at the absolute timeout")
            .unwrap();
        assert_eq!(timeouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_finishes_menu() {
        let (transport, message) = setup();
        transport.destroy().await.unwrap();
        let manager = ReactionManager::new(transport, &message)
            .idle_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(5))
            .on("✅", |_| async {});

        let result = manager.listen().await;
        assert!(matches!(result, Err(TransportError::Closed)));
        assert!(manager.is_finished());
    }
}
