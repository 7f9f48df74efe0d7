//! Scripted transport used by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::net::error::{CallError, ConnectError};
use crate::net::transport::{DialTarget, GreeterChannel, HelloCall, Transport};

/// Transport whose dial and call outcomes are scripted by the test.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    dial_script: Mutex<VecDeque<bool>>,
    refuse_by_default: AtomicBool,
    dials: AtomicU32,
    pub(crate) calls: Arc<CallScript>,
    pub(crate) released: Arc<AtomicU32>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue dial outcomes; once drained, dials follow the default.
    pub(crate) fn script_dials(&self, outcomes: &[bool]) {
        self.dial_script.lock().unwrap().extend(outcomes.iter().copied());
    }

    pub(crate) fn refuse_dials(&self, refuse: bool) {
        self.refuse_by_default.store(refuse, Ordering::SeqCst);
    }

    pub(crate) fn dial_count(&self) -> u32 {
        self.dials.load(Ordering::SeqCst)
    }

    pub(crate) fn released_count(&self) -> u32 {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn dial(&self, _target: &DialTarget) -> Result<Arc<dyn GreeterChannel>, ConnectError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let scripted = self.dial_script.lock().unwrap().pop_front();
        let ok = scripted.unwrap_or(!self.refuse_by_default.load(Ordering::SeqCst));
        if !ok {
            return Err(ConnectError::Transport("connection refused".into()));
        }
        Ok(Arc::new(ScriptedChannel {
            calls: self.calls.clone(),
            released: self.released.clone(),
        }))
    }
}

/// Shared call behaviour for every channel a [`ScriptedTransport`] hands out.
#[derive(Default)]
pub(crate) struct CallScript {
    queued: Mutex<VecDeque<Result<String, CallError>>>,
    delay: Mutex<Option<Duration>>,
    count: AtomicU32,
    request_ids: Mutex<Vec<Option<String>>>,
}

impl CallScript {
    pub(crate) fn push(&self, outcome: Result<String, CallError>) {
        self.queued.lock().unwrap().push_back(outcome);
    }

    pub(crate) fn delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    pub(crate) fn request_ids(&self) -> Vec<Option<String>> {
        self.request_ids.lock().unwrap().clone()
    }
}

struct ScriptedChannel {
    calls: Arc<CallScript>,
    released: Arc<AtomicU32>,
}

#[async_trait]
impl GreeterChannel for ScriptedChannel {
    async fn say_hello(&self, call: HelloCall) -> Result<String, CallError> {
        self.calls.count.fetch_add(1, Ordering::SeqCst);
        self.calls.request_ids.lock().unwrap().push(call.request_id.clone());

        let delay = *self.calls.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.calls.queued.lock().unwrap().pop_front();
        match scripted {
            Some(outcome) => outcome,
            None => Ok(format!("Hello {}!", call.name)),
        }
    }
}

impl Drop for ScriptedChannel {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
