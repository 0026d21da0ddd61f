#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;

use striker_client::fetch::{FetchError, Fetcher};
use striker_client::gateway::{Command, CommandAck, CommandDispatcher, CommandError};

/// Serve `router` on an ephemeral local port and return the base URL
/// (`http://127.0.0.1:<port>/api`).
pub async fn spawn_executor(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub executor");
    });
    format!("http://{addr}/api")
}

/// A base URL nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}/api")
}

// ---------------------------------------------------------------------------
// Fetchers
// ---------------------------------------------------------------------------

/// Counts calls and concurrent fetches; returns the call number.
#[derive(Clone, Default)]
pub struct CountingFetcher {
    pub calls: Arc<AtomicUsize>,
    pub in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
    pub delay: Duration,
}

impl CountingFetcher {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher<u64> for CountingFetcher {
    async fn fetch(&self, _key: &str) -> Result<u64, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(call as u64)
    }
}

/// Replays scripted results, repeating the last one when exhausted.
#[derive(Clone)]
pub struct ScriptedFetcher<T> {
    script: Arc<Mutex<VecDeque<Result<T, FetchError>>>>,
    pub calls: Arc<AtomicUsize>,
}

impl<T: Clone> ScriptedFetcher<T> {
    pub fn new(script: Vec<Result<T, FetchError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Fetcher<T> for ScriptedFetcher<T> {
    async fn fetch(&self, _key: &str) -> Result<T, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script
                .front()
                .cloned()
                .unwrap_or_else(|| Err(FetchError::Transport("script exhausted".into())))
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatchers
// ---------------------------------------------------------------------------

/// Records every dispatched command and answers with a fixed result.
#[derive(Clone)]
pub struct SpyDispatcher {
    pub sent: Arc<Mutex<Vec<Command>>>,
    result: Result<CommandAck, CommandError>,
    delay: Duration,
}

impl SpyDispatcher {
    pub fn accepting(job_uuid: Option<&str>) -> Self {
        Self::answering(Ok(CommandAck {
            status: 200,
            job_uuid: job_uuid.map(str::to_string),
        }))
    }

    pub fn answering(result: Result<CommandAck, CommandError>) -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            result,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl CommandDispatcher for SpyDispatcher {
    async fn dispatch(&self, command: &Command) -> Result<CommandAck, CommandError> {
        self.sent.lock().unwrap().push(command.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}
