//! Reference native shell: executes the core's effects with `reqwest` and
//! a key-value store, feeding every result back until the core goes quiet.

mod http;
mod kv;

pub use self::http::{HttpExecutor, ReqwestExecutor};
pub use self::kv::{KvStore, MemoryKvStore, SqliteKvStore};

use crux_core::Request;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, instrument};
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::capabilities::Effect;
use crate::config::{AppConfig, ConfigError};
use crate::event::Event;
use crate::view::ViewModel;

type Core = crux_core::Core<Effect, App>;
type WireRequest = crux_http::protocol::HttpRequest;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("http client error: {0}")]
    HttpClient(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, defaulting to info.
/// Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        debug!("tracing subscriber already installed");
    }
}

pub struct Shell<H, K> {
    core: Core,
    http: Arc<H>,
    kv: Arc<K>,
    renders: u64,
}

impl Shell<ReqwestExecutor, SqliteKvStore> {
    /// Production wiring: config from the environment, SQLite at `db_path`.
    pub fn from_env(db_path: impl AsRef<std::path::Path>) -> Result<Self, ShellError> {
        let config = AppConfig::from_env()?;
        Ok(Self::new(config, ReqwestExecutor::new()?, SqliteKvStore::open(db_path)?))
    }
}

impl<H, K> Shell<H, K>
where
    H: HttpExecutor + 'static,
    K: KvStore + 'static,
{
    pub fn new(config: AppConfig, http: H, kv: K) -> Self {
        let core = Core::new();
        let effects = core.process_event(Event::Configure(Box::new(config)));
        debug!(effects = effects.len(), "core configured");
        Self {
            core,
            http: Arc::new(http),
            kv: Arc::new(kv),
            renders: 0,
        }
    }

    /// Sends `event` and runs every effect it causes, including effects
    /// caused by their results, then returns the settled view.
    #[instrument(skip_all, fields(event = event.name()))]
    pub async fn dispatch(&mut self, event: Event) -> ViewModel {
        let effects = self.core.process_event(event);
        self.run(effects).await;
        self.core.view()
    }

    async fn run(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        let mut waiting: HashMap<u64, Request<WireRequest>> = HashMap::new();
        let mut in_flight = JoinSet::new();
        let mut next_ticket = 0u64;

        loop {
            while let Some(effect) = queue.pop_front() {
                match effect {
                    Effect::Render(_) => self.renders += 1,
                    Effect::KeyValue(mut request) => {
                        let result = kv::execute(self.kv.as_ref(), &request.operation).await;
                        match self.core.resolve(&mut request, result) {
                            Ok(effects) => queue.extend(effects),
                            Err(e) => error!(error = %e, "kv result rejected by the core"),
                        }
                    }
                    Effect::Http(request) => {
                        next_ticket += 1;
                        let ticket = next_ticket;
                        let http = Arc::clone(&self.http);
                        let operation = request.operation.clone();
                        waiting.insert(ticket, request);
                        in_flight.spawn(async move { (ticket, http.execute(operation).await) });
                    }
                }
            }

            match in_flight.join_next().await {
                Some(Ok((ticket, result))) => match waiting.remove(&ticket) {
                    Some(mut request) => match self.core.resolve(&mut request, result) {
                        Ok(effects) => queue.extend(effects),
                        Err(e) => error!(ticket, error = %e, "http result rejected by the core"),
                    },
                    None => error!(ticket, "http result without a waiting request"),
                },
                Some(Err(e)) => error!(error = %e, "http task failed"),
                None => break,
            }
        }
    }

    #[must_use]
    pub fn view(&self) -> ViewModel {
        self.core.view()
    }

    /// Renders requested so far.
    #[must_use]
    pub fn renders(&self) -> u64 {
        self.renders
    }

    #[must_use]
    pub fn kv(&self) -> &K {
        &self.kv
    }
}
