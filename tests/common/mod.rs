//! Shared utilities for integration testing.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use resilient_client::config::ClientConfig;
use resilient_client::net::{CallError, ConnectError, DialTarget, GreeterChannel, HelloCall, Transport};

type CallFuture = Pin<Box<dyn Future<Output = Result<String, CallError>> + Send>>;
type Handler = Arc<dyn Fn(u32, HelloCall) -> CallFuture + Send + Sync>;

/// A programmable in-process stand-in for the greeter server.
///
/// The handler receives the 1-based call number and the call itself.
pub struct MockTransport {
    refuse_dials: AtomicBool,
    dials: AtomicU32,
    state: Arc<MockState>,
}

struct MockState {
    handler: Handler,
    calls: AtomicU32,
    released: AtomicU32,
    seen: Mutex<Vec<HelloCall>>,
}

impl MockTransport {
    /// Every call answers with a greeting.
    pub fn healthy() -> Arc<Self> {
        Self::programmable(|_, call| async move { Ok(format!("Hello {}", call.name)) })
    }

    pub fn programmable<F, Fut>(f: F) -> Arc<Self>
    where
        F: Fn(u32, HelloCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, CallError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |n, call| Box::pin(f(n, call)));
        Arc::new(Self {
            refuse_dials: AtomicBool::new(false),
            dials: AtomicU32::new(0),
            state: Arc::new(MockState {
                handler,
                calls: AtomicU32::new(0),
                released: AtomicU32::new(0),
                seen: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn refuse_dials(&self, refuse: bool) {
        self.refuse_dials.store(refuse, Ordering::SeqCst);
    }

    pub fn dial_count(&self) -> u32 {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> u32 {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Channels dropped by the client.
    pub fn released_count(&self) -> u32 {
        self.state.released.load(Ordering::SeqCst)
    }

    pub fn seen_calls(&self) -> Vec<HelloCall> {
        self.state.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn dial(&self, target: &DialTarget) -> Result<Arc<dyn GreeterChannel>, ConnectError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if self.refuse_dials.load(Ordering::SeqCst) {
            return Err(ConnectError::Transport(format!("connection refused: {}", target.address)));
        }
        Ok(Arc::new(MockChannel {
            state: self.state.clone(),
        }))
    }
}

struct MockChannel {
    state: Arc<MockState>,
}

#[async_trait]
impl GreeterChannel for MockChannel {
    async fn say_hello(&self, call: HelloCall) -> Result<String, CallError> {
        let n = self.state.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.seen.lock().unwrap().push(call.clone());
        (self.state.handler)(n, call).await
    }
}

impl Drop for MockChannel {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Config tuned for deterministic paused-clock tests: one request per
/// second, no jitter, no retries, health checks effectively off.
pub fn fast_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.requests.interval_secs = 1;
    config.requests.jitter_percent = 0;
    config.requests.max_retries = 0;
    config.health_check.keep_alive_secs = 3600;
    config.observability.report_interval_secs = 0;
    config
}

/// Let every runnable task make progress on the paused clock.
#[allow(dead_code)]
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
