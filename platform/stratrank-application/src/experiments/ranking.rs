use crate::backtesting::simulate_backtest;
use crate::shared::derive_run_id;
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Instant;
use stratrank_domain::entities::backtest::{BacktestConfig, BacktestResult};
use stratrank_domain::entities::ranking::RankedInstrument;
use stratrank_domain::error::BacktestError;
use stratrank_domain::repositories::market_data::MarketDataSource;
use stratrank_domain::services::ranking::{expectancy, wilson_lower_bound, TopN};
use stratrank_domain::services::simulator::PriceTable;
use stratrank_domain::services::strategy::{SignalProvider, StrategyRegistry};
use stratrank_domain::value_objects::instrument::InstrumentId;
use tracing::info_span;

#[derive(Debug, Clone, PartialEq)]
pub struct RankingRequest {
    pub strategies: Vec<String>,
    pub universe: Vec<InstrumentId>,
    /// Lookback length in calendar days, ending at `as_of`.
    pub window_days: u32,
    pub as_of: NaiveDate,
    pub min_trade_count: u64,
    pub top_n: usize,
    pub initial_capital: f64,
    pub risk_free_rate: f64,
    pub parallelism: usize,
}

impl RankingRequest {
    pub fn start_date(&self) -> NaiveDate {
        self.as_of
            .checked_sub_days(Days::new(u64::from(self.window_days)))
            .unwrap_or(NaiveDate::MIN)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankingProgress {
    pub total_candidates: usize,
    pub completed_candidates: usize,
    pub retained: usize,
    pub filtered: usize,
    pub skipped_candidates: usize,
    pub last_instrument: Option<InstrumentId>,
}

/// Shared flag checked between candidates; cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyRanking {
    pub strategy_id: String,
    pub entries: Vec<RankedInstrument>,
    pub evaluated: usize,
    pub retained: usize,
    pub filtered: usize,
    pub failed: usize,
    /// Set when the strategy could not be built; nothing was evaluated then.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingReport {
    pub as_of: NaiveDate,
    pub start: NaiveDate,
    pub window_days: u32,
    pub min_trade_count: u64,
    pub top_n: usize,
    pub candidates_total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub strategies: Vec<StrategyRanking>,
}

pub fn rank_candidates(
    request: &RankingRequest,
    registry: &StrategyRegistry,
    market_data: &(dyn MarketDataSource + Sync),
) -> Result<RankingReport, BacktestError> {
    rank_candidates_with_hooks(request, registry, market_data, None, None)
}

/// Evaluates every (strategy, instrument) pair over the lookback window and keeps a
/// bounded top-N per strategy ordered by the Wilson lower bound of the win rate.
///
/// Prices are fetched once per instrument. A failing candidate is counted as skipped;
/// only cancellation aborts the sweep.
pub fn rank_candidates_with_hooks(
    request: &RankingRequest,
    registry: &StrategyRegistry,
    market_data: &(dyn MarketDataSource + Sync),
    mut on_progress: Option<&mut dyn FnMut(RankingProgress)>,
    cancel: Option<&CancellationToken>,
) -> Result<RankingReport, BacktestError> {
    let start = request.start_date();
    let _span = info_span!(
        "rank_candidates",
        strategies = request.strategies.len(),
        candidates = request.universe.len(),
        start = %start,
        as_of = %request.as_of,
        parallelism = request.parallelism
    )
    .entered();

    let mut rankings: Vec<StrategyRanking> = Vec::with_capacity(request.strategies.len());
    let mut lanes: Vec<StrategyLane> = Vec::new();
    for strategy_id in &request.strategies {
        let mut ranking = StrategyRanking {
            strategy_id: strategy_id.clone(),
            entries: Vec::new(),
            evaluated: 0,
            retained: 0,
            filtered: 0,
            failed: 0,
            error: None,
        };
        match registry.build(strategy_id, &Default::default()) {
            Ok(provider) => lanes.push(StrategyLane {
                ranking_idx: rankings.len(),
                strategy_id: strategy_id.clone(),
                provider,
            }),
            Err(err) => {
                tracing::warn!(strategy = %strategy_id, error = %err, "strategy skipped");
                ranking.error = Some(err.to_string());
            }
        }
        rankings.push(ranking);
    }

    let plans: Vec<CandidatePlan> = request
        .universe
        .iter()
        .enumerate()
        .map(|(order_idx, instrument)| CandidatePlan {
            order_idx,
            instrument: instrument.clone(),
        })
        .collect();

    let mut progress = RankingProgress {
        total_candidates: plans.len(),
        completed_candidates: 0,
        retained: 0,
        filtered: 0,
        skipped_candidates: 0,
        last_instrument: None,
    };
    emit_progress(&mut on_progress, &progress);

    let ctx = SweepContext {
        request,
        start,
        lanes: &lanes,
        market_data,
    };
    let mut on_outcome = |outcome: &CandidateOutcome| {
        update_progress(&mut progress, outcome);
        emit_progress(&mut on_progress, &progress);
    };

    let mut outcomes = if request.parallelism <= 1 || plans.len() <= 1 {
        execute_plans_serial(&plans, &ctx, cancel, &mut on_outcome)?
    } else {
        execute_plans_parallel(&plans, request.parallelism, &ctx, cancel, &mut on_outcome)?
    };
    outcomes.sort_by_key(|outcome| outcome.order_idx);

    let mut tops: Vec<TopN<RankedInstrument>> = rankings
        .iter()
        .map(|_| TopN::new(request.top_n))
        .collect();
    let mut skipped = 0usize;
    for outcome in outcomes {
        let evaluations = match outcome.evaluations {
            Ok(evaluations) => evaluations,
            Err(err) => {
                skipped += 1;
                tracing::warn!(instrument = %outcome.instrument, error = %err, "candidate skipped");
                continue;
            }
        };
        for evaluation in evaluations {
            let ranking = &mut rankings[evaluation.ranking_idx];
            ranking.evaluated += 1;
            match evaluation.verdict {
                Verdict::Retained(entry) => {
                    ranking.retained += 1;
                    tops[evaluation.ranking_idx].offer(entry.score, *entry);
                }
                Verdict::Filtered => ranking.filtered += 1,
                Verdict::Failed(err) => {
                    ranking.failed += 1;
                    tracing::warn!(
                        strategy = %ranking.strategy_id,
                        instrument = %outcome.instrument,
                        error = %err,
                        "candidate evaluation failed"
                    );
                }
            }
        }
    }

    for (ranking, top) in rankings.iter_mut().zip(tops) {
        ranking.entries = top
            .into_sorted()
            .into_iter()
            .enumerate()
            .map(|(idx, (_, mut entry))| {
                entry.rank = idx + 1;
                entry
            })
            .collect();
        tracing::info!(
            strategy = %ranking.strategy_id,
            retained = ranking.retained,
            filtered = ranking.filtered,
            selected = ranking.entries.len(),
            "strategy ranked"
        );
    }

    Ok(RankingReport {
        as_of: request.as_of,
        start,
        window_days: request.window_days,
        min_trade_count: request.min_trade_count,
        top_n: request.top_n,
        candidates_total: plans.len(),
        processed: plans.len() - skipped,
        skipped,
        strategies: rankings,
    })
}

struct StrategyLane {
    ranking_idx: usize,
    strategy_id: String,
    provider: Box<dyn SignalProvider>,
}

struct SweepContext<'a> {
    request: &'a RankingRequest,
    start: NaiveDate,
    lanes: &'a [StrategyLane],
    market_data: &'a (dyn MarketDataSource + Sync),
}

#[derive(Debug, Clone)]
struct CandidatePlan {
    order_idx: usize,
    instrument: InstrumentId,
}

struct CandidateOutcome {
    order_idx: usize,
    instrument: InstrumentId,
    evaluations: Result<Vec<Evaluation>, BacktestError>,
}

struct Evaluation {
    ranking_idx: usize,
    verdict: Verdict,
}

enum Verdict {
    Retained(Box<RankedInstrument>),
    Filtered,
    Failed(BacktestError),
}

enum WorkerMessage {
    Outcome(CandidateOutcome),
    Fatal(BacktestError),
}

fn execute_plans_serial(
    plans: &[CandidatePlan],
    ctx: &SweepContext<'_>,
    cancel: Option<&CancellationToken>,
    on_outcome: &mut dyn FnMut(&CandidateOutcome),
) -> Result<Vec<CandidateOutcome>, BacktestError> {
    let mut out = Vec::with_capacity(plans.len());
    for plan in plans {
        if is_cancelled(cancel) {
            return Err(BacktestError::Cancelled);
        }
        let outcome = evaluate_candidate(plan, ctx);
        on_outcome(&outcome);
        out.push(outcome);
    }
    Ok(out)
}

fn execute_plans_parallel(
    plans: &[CandidatePlan],
    parallelism: usize,
    ctx: &SweepContext<'_>,
    cancel: Option<&CancellationToken>,
    on_outcome: &mut dyn FnMut(&CandidateOutcome),
) -> Result<Vec<CandidateOutcome>, BacktestError> {
    let worker_count = parallelism.max(1).min(plans.len());
    let next_index = AtomicUsize::new(0);
    let cancelled = AtomicBool::new(false);
    let (tx, rx) = mpsc::channel::<WorkerMessage>();

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let tx = tx.clone();
            let next_index_ref = &next_index;
            let cancelled_ref = &cancelled;
            scope.spawn(move || loop {
                if cancelled_ref.load(Ordering::Relaxed) || is_cancelled(cancel) {
                    cancelled_ref.store(true, Ordering::Relaxed);
                    let _ = tx.send(WorkerMessage::Fatal(BacktestError::Cancelled));
                    break;
                }

                let plan_idx = next_index_ref.fetch_add(1, Ordering::Relaxed);
                if plan_idx >= plans.len() {
                    break;
                }

                let outcome = evaluate_candidate(&plans[plan_idx], ctx);
                if tx.send(WorkerMessage::Outcome(outcome)).is_err() {
                    break;
                }
            });
        }

        drop(tx);

        let mut outcomes: Vec<CandidateOutcome> = Vec::with_capacity(plans.len());
        let mut fatal_error: Option<BacktestError> = None;
        while let Ok(message) = rx.recv() {
            match message {
                WorkerMessage::Outcome(outcome) => {
                    if fatal_error.is_none() {
                        on_outcome(&outcome);
                        outcomes.push(outcome);
                        if is_cancelled(cancel) {
                            cancelled.store(true, Ordering::Relaxed);
                            fatal_error = Some(BacktestError::Cancelled);
                        }
                    }
                }
                WorkerMessage::Fatal(err) => {
                    if fatal_error.is_none() {
                        fatal_error = Some(err);
                    }
                }
            }
        }

        if let Some(err) = fatal_error {
            return Err(err);
        }
        if outcomes.len() != plans.len() {
            return Err(BacktestError::Lifecycle(format!(
                "ranking sweep expected {} outcomes, got {}",
                plans.len(),
                outcomes.len()
            )));
        }

        Ok(outcomes)
    })
}

/// Fetches the candidate's prices once and scores it under every strategy.
fn evaluate_candidate(plan: &CandidatePlan, ctx: &SweepContext<'_>) -> CandidateOutcome {
    let started = Instant::now();
    let request = ctx.request;
    let fetched = ctx
        .market_data
        .get_price_history(&plan.instrument, ctx.start, request.as_of)
        .map_err(|reason| BacktestError::DataSource {
            instrument: plan.instrument.to_string(),
            reason,
        })
        .and_then(|series| {
            if series.is_empty() {
                Err(BacktestError::DataNotFound {
                    scope: plan.instrument.to_string(),
                })
            } else {
                Ok(series)
            }
        });

    let evaluations = fetched.map(|series| {
        let mut prices = PriceTable::new();
        prices.insert(plan.instrument.clone(), series);
        ctx.lanes
            .iter()
            .map(|lane| Evaluation {
                ranking_idx: lane.ranking_idx,
                verdict: score_lane(lane, plan, &prices, ctx),
            })
            .collect::<Vec<_>>()
    });

    let outcome_label = match &evaluations {
        Ok(_) => "evaluated",
        Err(err) => err.kind(),
    };
    metrics::counter!("stratrank.ranking.candidates_total", "outcome" => outcome_label)
        .increment(1);
    metrics::histogram!("stratrank.ranking.candidate_ms")
        .record(started.elapsed().as_millis() as f64);

    CandidateOutcome {
        order_idx: plan.order_idx,
        instrument: plan.instrument.clone(),
        evaluations,
    }
}

fn score_lane(
    lane: &StrategyLane,
    plan: &CandidatePlan,
    prices: &PriceTable,
    ctx: &SweepContext<'_>,
) -> Verdict {
    let request = ctx.request;
    let config = BacktestConfig {
        strategy_id: lane.strategy_id.clone(),
        parameters: Default::default(),
        start_date: ctx.start,
        end_date: request.as_of,
        initial_capital: request.initial_capital,
        universe: vec![plan.instrument.clone()],
    };
    let run_id = derive_run_id(&config);
    match simulate_backtest(
        &run_id,
        &config,
        lane.provider.as_ref(),
        prices,
        Vec::new(),
        request.risk_free_rate,
    ) {
        Ok(result) => {
            let trade_count = result.trade_stats.total_trades;
            if trade_count < request.min_trade_count {
                Verdict::Filtered
            } else {
                Verdict::Retained(Box::new(ranked_entry(&result, trade_count)))
            }
        }
        Err(err) => Verdict::Failed(err),
    }
}

fn ranked_entry(result: &BacktestResult, trade_count: u64) -> RankedInstrument {
    let stats = &result.trade_stats;
    RankedInstrument {
        rank: 0,
        instrument: result.config.universe[0].clone(),
        score: wilson_lower_bound(stats.win_rate, trade_count),
        win_rate: stats.win_rate,
        trade_count,
        total_return: result.total_return,
        annualized_return: result.performance.annualized_return,
        max_drawdown: result.performance.max_drawdown,
        sharpe_ratio: result.performance.sharpe_ratio,
        expectancy: expectancy(result.total_return, trade_count),
        profit_factor: stats.profit_factor,
        run_id: result.run_id.clone(),
    }
}

fn is_cancelled(cancel: Option<&CancellationToken>) -> bool {
    cancel.map(CancellationToken::is_cancelled).unwrap_or(false)
}

fn update_progress(progress: &mut RankingProgress, outcome: &CandidateOutcome) {
    progress.completed_candidates = progress.completed_candidates.saturating_add(1);
    progress.last_instrument = Some(outcome.instrument.clone());
    match &outcome.evaluations {
        Ok(evaluations) => {
            for evaluation in evaluations {
                match evaluation.verdict {
                    Verdict::Retained(_) => progress.retained = progress.retained.saturating_add(1),
                    Verdict::Filtered => progress.filtered = progress.filtered.saturating_add(1),
                    Verdict::Failed(_) => {}
                }
            }
        }
        Err(_) => {
            progress.skipped_candidates = progress.skipped_candidates.saturating_add(1);
        }
    }
}

fn emit_progress(
    on_progress: &mut Option<&mut dyn FnMut(RankingProgress)>,
    progress: &RankingProgress,
) {
    if let Some(callback) = on_progress.as_mut() {
        (callback)(progress.clone());
    }
}
