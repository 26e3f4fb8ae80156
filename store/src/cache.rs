//! Single-flight stem cache.
//!
//! Sits between the resolver and the synthesis gateway: a hit is served
//! from the store, a miss triggers exactly one synthesis per key no matter
//! how many callers race for it. The in-flight table is an explicit
//! in-memory primitive — the durable store is the fallback for restarts,
//! never the concurrency mechanism.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use stemline_synth::{SynthesisError, Synthesizer, VoiceConfig};
use tracing::{debug, info};

use crate::{Result, SharedStemStore, Stem, StemKey, StoreError};

/// How a stem was obtained by [`StemCache::get_or_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Served from the durable store.
    Cached,
    /// Produced by a synthesis call during this request (possibly one this
    /// caller joined rather than launched).
    Synthesized,
}

/// Cloneable error carried by a shared flight so every waiter of a failed
/// attempt observes the same failure.
#[derive(Debug, Clone)]
enum FlightError {
    Synthesis(SynthesisError),
    Store(String),
}

impl From<FlightError> for StoreError {
    fn from(err: FlightError) -> Self {
        match err {
            FlightError::Synthesis(e) => StoreError::Synthesis(e),
            FlightError::Store(msg) => StoreError::Persist(msg),
        }
    }
}

type FlightResult = std::result::Result<Arc<Stem>, FlightError>;
type Flight = Shared<BoxFuture<'static, FlightResult>>;
type FlightMap = Arc<Mutex<HashMap<StemKey, Flight>>>;

/// A stem store combined with a synthesis gateway.
///
/// Guarantees at most one concurrent gateway invocation per [`StemKey`]:
/// callers racing on the same key all await one shared flight and receive
/// the same stem (or the same failure). Failures are never cached — the
/// flight entry is dropped when the attempt resolves, so the next call
/// synthesizes again. Distinct keys proceed fully in parallel; the table
/// lock is only held long enough to join or install a flight.
pub struct StemCache {
    store: SharedStemStore,
    synth: Arc<dyn Synthesizer>,
    in_flight: FlightMap,
}

impl StemCache {
    /// Creates a cache over the given store and gateway.
    pub fn new(store: SharedStemStore, synth: Arc<dyn Synthesizer>) -> Self {
        Self {
            store,
            synth,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the underlying store handle (for delete/list/audit callers).
    pub fn store(&self) -> &SharedStemStore {
        &self.store
    }

    /// Non-blocking lookup; never triggers synthesis.
    pub async fn get(&self, key: &StemKey) -> Result<Option<Arc<Stem>>> {
        self.store.get(key).await
    }

    /// Returns the stem for the key, synthesizing and persisting it first
    /// if no entry exists.
    pub async fn get_or_create(
        &self,
        key: &StemKey,
        text: &str,
        config: &VoiceConfig,
    ) -> Result<(Arc<Stem>, Provenance)> {
        if let Some(stem) = self.store.get(key).await? {
            debug!(%key, "stem cache hit");
            return Ok((stem, Provenance::Cached));
        }
        debug!(%key, "stem cache miss");

        let flight = self.join_or_launch(key, text, config);
        let stem = flight.await.map_err(StoreError::from)?;
        Ok((stem, Provenance::Synthesized))
    }

    /// Joins the key's in-flight synthesis or launches a new one.
    fn join_or_launch(&self, key: &StemKey, text: &str, config: &VoiceConfig) -> Flight {
        let mut in_flight = self.in_flight.lock();
        if let Some(flight) = in_flight.get(key) {
            debug!(%key, "joining in-flight synthesis");
            return flight.clone();
        }

        let store = Arc::clone(&self.store);
        let synth = Arc::clone(&self.synth);
        let table = Arc::clone(&self.in_flight);
        let flight_key = key.clone();
        let text = text.to_string();
        let config = config.clone();

        let flight: Flight = async move {
            let result = synthesize_and_store(&store, &*synth, &flight_key, &text, &config).await;
            // The attempt is over either way; failures must not linger or
            // the key could never be retried.
            table.lock().remove(&flight_key);
            result
        }
        .boxed()
        .shared();

        in_flight.insert(key.clone(), flight.clone());
        flight
    }
}

async fn synthesize_and_store(
    store: &SharedStemStore,
    synth: &dyn Synthesizer,
    key: &StemKey,
    text: &str,
    config: &VoiceConfig,
) -> FlightResult {
    // A flight that finished between our caller's miss and this launch has
    // already persisted the stem; don't synthesize it twice.
    match store.get(key).await {
        Ok(Some(stem)) => return Ok(stem),
        Ok(None) => {}
        Err(e) => return Err(FlightError::Store(e.to_string())),
    }

    info!(%key, chars = text.len(), "synthesizing stem");
    let waveform = synth
        .synthesize(text, config)
        .await
        .map_err(FlightError::Synthesis)?;
    let stem = Arc::new(Stem::new(key.clone(), waveform));

    // Persist before releasing waiters so durable state never lags what
    // callers already hold.
    store
        .put(&stem, text, config)
        .await
        .map_err(|e| FlightError::Store(e.to_string()))?;

    Ok(stem)
}
