use parking_lot::Mutex;
use std::collections::BTreeMap;
use stratrank_domain::entities::backtest::{BacktestRun, RunId};
use stratrank_domain::repositories::result_sink::ResultSink;

/// Keeps finished runs in memory, keyed by run id. Storing a run id again replaces it.
#[derive(Debug, Default)]
pub struct InMemoryResultSink {
    runs: Mutex<BTreeMap<RunId, BacktestRun>>,
}

impl InMemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, run_id: &RunId) -> Option<BacktestRun> {
        self.runs.lock().get(run_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.runs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.lock().is_empty()
    }
}

impl ResultSink for InMemoryResultSink {
    fn store(&self, run: &BacktestRun) -> Result<(), String> {
        if !run.status().is_terminal() {
            return Err(format!(
                "run {} is {}; only finished runs can be stored",
                run.run_id,
                run.status().label()
            ));
        }
        self.runs.lock().insert(run.run_id.clone(), run.clone());
        metrics::counter!("stratrank.infra.sink.stored_total", "kind" => "memory").increment(1);
        Ok(())
    }
}
