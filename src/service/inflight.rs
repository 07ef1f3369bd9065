//! In-flight command deduplication.
//!
//! At most one transport round-trip per key is outstanding. Concurrent
//! callers with the same key share one spawned task and observe the same
//! settlement. The entry is removed inside that task before its result is
//! published, and also on panic or abort, so a later call is never blocked
//! by a stale record.

// ============================================================================
// Imports
// ============================================================================

use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, error, trace};

use crate::protocol::CommandEnvelope;

use super::cache::ResponseCache;

// ============================================================================
// Types
// ============================================================================

/// Settlement shared by every caller of one in-flight command.
pub type SharedReply = Shared<BoxFuture<'static, CommandEnvelope>>;

// ============================================================================
// Key
// ============================================================================

/// Builds the dedup/cache key `name:payload` with object keys sorted.
#[must_use]
pub fn command_key(name: &str, payload: &Value) -> String {
    let mut key = String::with_capacity(name.len() + 16);
    key.push_str(name);
    key.push(':');
    write_canonical(payload, &mut key);
    key
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<_> = map.iter().collect();
            fields.sort_unstable_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (name, field)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // String keys always serialize.
                let _ = write!(out, "{}", Value::String(name.clone()));
                out.push(':');
                write_canonical(field, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

// ============================================================================
// InFlightRegistry
// ============================================================================

/// Map of keys to shared pending settlements.
#[derive(Default)]
pub struct InFlightRegistry {
    entries: Mutex<FxHashMap<String, SharedReply>>,
}

impl InFlightRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the in-flight call for `key`, or spawns `work` as a new one.
    ///
    /// `work` is only polled when no call for `key` is outstanding.
    pub fn run<F>(self: &Arc<Self>, key: String, work: F) -> SharedReply
    where
        F: Future<Output = CommandEnvelope> + Send + 'static,
    {
        let mut entries = self.entries.lock();

        if let Some(existing) = entries.get(&key) {
            debug!(key = %key, "Joining in-flight command");
            return existing.clone();
        }

        let guard = SettleGuard {
            registry: Arc::clone(self),
            key: key.clone(),
        };
        let handle = tokio::spawn(async move {
            let envelope = work.await;
            drop(guard);
            envelope
        });

        let reply = async move {
            handle.await.unwrap_or_else(|e| {
                error!(error = %e, "In-flight command task failed");
                CommandEnvelope::failure(format!("command task failed: {e}"))
            })
        }
        .boxed()
        .shared();

        trace!(key = %key, "Command in flight");
        entries.insert(key, reply.clone());
        reply
    }

    /// Stores `value` in `cache` unless a call for `key` is in flight.
    ///
    /// The check and the write happen under the registry lock, so a cache
    /// entry never appears while a round-trip for the same key is outstanding.
    /// Returns `true` if the value was stored.
    pub fn settle_into(&self, cache: &ResponseCache, key: String, value: Value) -> bool {
        let entries = self.entries.lock();
        if entries.contains_key(&key) {
            debug!(key = %key, "Skipping cache write, command in flight again");
            return false;
        }
        cache.set(key, value);
        true
    }

    /// Returns `true` if a call for `key` is outstanding.
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Number of outstanding calls.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is in flight.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Removes the registry entry when the command task ends, however it ends.
struct SettleGuard {
    registry: Arc<InFlightRegistry>,
    key: String,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        self.registry.entries.lock().remove(&self.key);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::Notify;

    #[test]
    fn test_key_is_order_independent() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":{"y":2,"x":[3,{"q":1,"p":0}]}}"#).expect("json");
        let b: Value = serde_json::from_str(r#"{"a":{"x":[3,{"p":0,"q":1}],"y":2},"b":1}"#).expect("json");

        assert_eq!(command_key("x", &a), command_key("x", &b));
        assert_eq!(
            command_key("x", &a),
            r#"x:{"a":{"x":[3,{"p":0,"q":1}],"y":2},"b":1}"#
        );
    }

    #[test]
    fn test_key_distinguishes_name_and_payload() {
        assert_ne!(command_key("x", &json!({"a": 1})), command_key("x", &json!({"a": 2})));
        assert_ne!(command_key("x", &json!({})), command_key("y", &json!({})));
        assert_eq!(command_key("x", &json!({"a": "q\""})), r#"x:{"a":"q\""}"#);
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_run() {
        let registry = Arc::new(InFlightRegistry::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let make = || {
            let runs = Arc::clone(&runs);
            let release = Arc::clone(&release);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                release.notified().await;
                CommandEnvelope::success(json!("done"))
            }
        };

        let first = registry.run("k".into(), make());
        let second = registry.run("k".into(), make());
        assert_eq!(registry.len(), 1);

        tokio::task::yield_now().await;
        release.notify_one();

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, b);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_entry_cleared_when_callers_abandon() {
        let registry = Arc::new(InFlightRegistry::new());

        let reply = registry.run("k".into(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            CommandEnvelope::failure("boom")
        });
        drop(reply);
        assert!(registry.contains("k"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!registry.contains("k"));
    }

    #[tokio::test]
    async fn test_entry_cleared_before_result_is_seen() {
        let registry = Arc::new(InFlightRegistry::new());
        let envelope = registry
            .run("k".into(), async { CommandEnvelope::failure("nope") })
            .await;

        assert!(!envelope.success);
        assert!(!registry.contains("k"));
    }

    #[tokio::test]
    async fn test_settle_into_skips_keys_in_flight() {
        let registry = Arc::new(InFlightRegistry::new());
        let cache = ResponseCache::new();
        let release = Arc::new(Notify::new());

        let reply = {
            let release = Arc::clone(&release);
            registry.run("k".into(), async move {
                release.notified().await;
                CommandEnvelope::success(json!(1))
            })
        };

        assert!(!registry.settle_into(&cache, "k".into(), json!("stale")));
        assert!(cache.is_empty());

        release.notify_one();
        reply.await;

        assert!(registry.settle_into(&cache, "k".into(), json!(1)));
        assert!(cache.contains_key("k"));
    }

    async fn explode() -> CommandEnvelope {
        panic!("bridge exploded")
    }

    #[tokio::test]
    async fn test_panicking_work_is_cleaned_up() {
        let registry = Arc::new(InFlightRegistry::new());
        let envelope = registry.run("k".into(), explode()).await;

        assert!(!envelope.success);
        assert!(envelope.error.expect("error").starts_with("command task failed"));
        assert!(registry.is_empty());
    }
}
