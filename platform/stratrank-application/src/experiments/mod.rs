mod ranking;

pub use crate::shared::resolve_ranking_request;
pub use ranking::{
    rank_candidates, rank_candidates_with_hooks, CancellationToken, RankingProgress,
    RankingReport, RankingRequest, StrategyRanking,
};
