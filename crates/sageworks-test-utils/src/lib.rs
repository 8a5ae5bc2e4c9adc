//! Testing utilities for the SageWorks workspace
//!
//! Scripted fakes for connectors and predictors, plus broker fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sageworks_broker::{
    BrokerConfig, Category, CategoryMap, Connector, ConnectorError, ConnectorTable, Metadata,
    MetadataBroker,
};
use sageworks_inference::{Frame, PredictError, Predictor};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Connector with scripted failures and a pause gate
///
/// Each successful refresh returns two entries tagged with the call number.
#[derive(Debug)]
pub struct FakeConnector {
    name: String,
    calls: AtomicU64,
    active: AtomicUsize,
    max_active: AtomicUsize,
    failing: AtomicBool,
    gate: watch::Sender<bool>,
}

impl FakeConnector {
    pub fn new(name: impl Into<String>) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            name: name.into(),
            calls: AtomicU64::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            gate,
        }
    }

    /// Refresh calls started so far
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most refreshes ever running at once
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Hold new and running refreshes until [`FakeConnector::resume`]
    pub fn pause(&self) {
        self.gate.send_replace(false);
    }

    pub fn resume(&self) {
        self.gate.send_replace(true);
    }

    /// Wait until at least `n` refresh calls have started
    pub async fn wait_for_calls(&self, n: u64) {
        while self.calls() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> bool {
        !self.failing.load(Ordering::SeqCst)
    }

    async fn refresh(&self) -> Result<Metadata, ConnectorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(ConnectorError::unreachable(self.name.clone(), "scripted failure"));
        }

        let mut entries = Metadata::new();
        entries.insert(
            format!("{}/first/data.csv", self.name),
            json!({"ContentLength": 100, "call": call}),
        );
        entries.insert(
            format!("{}/second/data.csv", self.name),
            json!({"ContentLength": 20, "call": call}),
        );
        Ok(entries)
    }
}

/// One fake connector per category, plus the table wrapping them
pub fn fake_connectors() -> (ConnectorTable, CategoryMap<Arc<FakeConnector>>) {
    let fakes = CategoryMap::from_fn(|category| Arc::new(FakeConnector::new(category.as_str())));
    let table = ConnectorTable::from_fn(|category| Arc::clone(&fakes[category]) as Arc<dyn Connector>);
    (table, fakes)
}

/// Broker over fake connectors with the given freshness window
///
/// # Panics
/// If `fresh_ttl` rounds down to zero milliseconds
pub fn test_broker(fresh_ttl: Duration) -> (MetadataBroker, CategoryMap<Arc<FakeConnector>>) {
    let (table, fakes) = fake_connectors();
    let config = BrokerConfig::new().with_fresh_ttl(fresh_ttl);
    let broker = MetadataBroker::new(&config, table).expect("test broker config is valid");
    (broker, fakes)
}

/// Generation of the current snapshot for a category
pub async fn generation_of(broker: &MetadataBroker, category: Category) -> u64 {
    broker
        .get_metadata(category, false)
        .await
        .map(|s| s.generation())
        .unwrap_or(0)
}

/// Predictor appending a `prediction` column equal to `id * 2`
///
/// Batches containing a listed id are rejected as invalid input.
#[derive(Debug, Default)]
pub struct FakePredictor {
    bad_ids: BTreeSet<i64>,
    transport_down: AtomicBool,
    calls: Mutex<Vec<Vec<i64>>>,
}

impl FakePredictor {
    pub fn new(bad_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            bad_ids: bad_ids.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn set_transport_down(&self, down: bool) {
        self.transport_down.store(down, Ordering::SeqCst);
    }

    /// Ids of every batch submitted, in call order
    pub fn calls(&self) -> Vec<Vec<i64>> {
        self.calls.lock().clone()
    }

    /// Columns this predictor returns for an input with `input` columns
    pub fn return_columns(input: &[String]) -> Vec<String> {
        let mut columns = input.to_vec();
        columns.push("prediction".to_string());
        columns
    }
}

#[async_trait]
impl Predictor for FakePredictor {
    fn name(&self) -> &str {
        "fake-endpoint"
    }

    async fn predict(&self, batch: &Frame) -> Result<Frame, PredictError> {
        let id_col = batch
            .column_index("id")
            .ok_or_else(|| PredictError::InvalidInput("missing id column".to_string()))?;
        let ids: Vec<i64> = batch
            .rows()
            .iter()
            .map(|row| row[id_col].as_i64().unwrap_or(-1))
            .collect();
        self.calls.lock().push(ids.clone());

        if self.transport_down.load(Ordering::SeqCst) {
            return Err(PredictError::Transport("connection reset".to_string()));
        }
        if let Some(bad) = ids.iter().find(|id| self.bad_ids.contains(id)) {
            return Err(PredictError::InvalidInput(format!("row {bad} has invalid values")));
        }

        let rows = batch
            .rows()
            .iter()
            .zip(&ids)
            .map(|(row, id)| {
                let mut out = row.clone();
                out.push(json!(id * 2));
                out
            })
            .collect();
        Frame::new(Self::return_columns(batch.columns()), rows)
            .map_err(|e| PredictError::Service(e.to_string()))
    }
}

/// Frame with `id` and `x` columns for ids `0..n`
pub fn id_frame(n: i64) -> Frame {
    id_frame_with(&(0..n).collect::<Vec<_>>())
}

/// Frame with `id` and `x` columns for the given ids
pub fn id_frame_with(ids: &[i64]) -> Frame {
    let rows = ids.iter().map(|id| vec![json!(id), json!(id * 10)]).collect();
    Frame::new(vec!["id".to_string(), "x".to_string()], rows).unwrap_or_default()
}
