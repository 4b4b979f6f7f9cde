use crate::entities::metrics::TradeStatistics;
use crate::value_objects::instrument::InstrumentId;
use crate::value_objects::side::Side;
use crate::value_objects::trade::Trade;
use chrono::NaiveDate;
use std::collections::{BTreeMap, VecDeque};

struct Lot {
    price: f64,
    quantity: u64,
    date: NaiveDate,
}

/// FIFO round-trip statistics over an ordered trade log.
///
/// Each sell closes the oldest open buy lot of its instrument and the pair's profit is
/// `(sell_price - buy_price) * buy_quantity`. Sells with no open lot are ignored.
pub fn analyze_trades(trades: &[Trade], universe: &[InstrumentId]) -> TradeStatistics {
    let mut lots: BTreeMap<&InstrumentId, VecDeque<Lot>> =
        universe.iter().map(|id| (id, VecDeque::new())).collect();

    let mut profits = Vec::new();
    let mut holding_days = Vec::new();

    for trade in trades {
        let queue = lots.entry(&trade.instrument).or_default();
        match trade.side {
            Side::Buy => queue.push_back(Lot {
                price: trade.price,
                quantity: trade.quantity,
                date: trade.date,
            }),
            Side::Sell => {
                let Some(lot) = queue.pop_front() else {
                    continue;
                };
                profits.push((trade.price - lot.price) * lot.quantity as f64);
                holding_days.push((trade.date - lot.date).num_days());
            }
        }
    }

    let mut stats = TradeStatistics {
        total_trades: trades.len() as u64,
        closed_trades: profits.len() as u64,
        ..TradeStatistics::default()
    };

    for profit in &profits {
        if *profit > 0.0 {
            stats.winning_trades += 1;
            stats.gross_profit += profit;
        } else {
            stats.losing_trades += 1;
            stats.gross_loss += profit.abs();
        }
    }

    let decided = stats.winning_trades + stats.losing_trades;
    if decided > 0 {
        stats.win_rate = stats.winning_trades as f64 / decided as f64;
    }
    if stats.winning_trades > 0 {
        stats.avg_win = stats.gross_profit / stats.winning_trades as f64;
    }
    if stats.losing_trades > 0 {
        stats.avg_loss = stats.gross_loss / stats.losing_trades as f64;
    }
    stats.profit_factor = profit_factor(&stats);
    if !holding_days.is_empty() {
        let total: i64 = holding_days.iter().sum();
        stats.avg_holding_days = Some(total as f64 / holding_days.len() as f64);
    }
    stats
}

/// `+inf` exactly when there are wins and no losses. Break-even losses with wins
/// produce `f64::MAX` instead so that the infinite value stays unambiguous.
fn profit_factor(stats: &TradeStatistics) -> f64 {
    if stats.total_trades == 0 || stats.winning_trades == 0 {
        return 0.0;
    }
    if stats.losing_trades == 0 {
        return f64::INFINITY;
    }
    if stats.gross_loss > 0.0 {
        stats.gross_profit / stats.gross_loss
    } else {
        f64::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::analyze_trades;
    use crate::value_objects::instrument::InstrumentId;
    use crate::value_objects::side::Side;
    use crate::value_objects::trade::Trade;
    use chrono::{Days, NaiveDate};

    fn trade(id: &str, day: u64, side: Side, price: f64, quantity: u64) -> Trade {
        Trade {
            instrument: InstrumentId::from(id),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + Days::new(day),
            side,
            price,
            quantity,
            amount: price * quantity as f64,
            cash_after: 0.0,
        }
    }

    #[test]
    fn empty_log_is_all_zero() {
        let stats = analyze_trades(&[], &[]);
        assert_eq!(stats.total_trades, 0);
        assert_eq!(stats.win_rate, 0.0);
        assert_eq!(stats.profit_factor, 0.0);
        assert_eq!(stats.avg_holding_days, None);
    }

    #[test]
    fn pairs_are_matched_first_in_first_out() {
        let trades = vec![
            trade("sh.600000", 0, Side::Buy, 10.0, 100),
            trade("sh.600000", 1, Side::Buy, 20.0, 50),
            trade("sh.600000", 3, Side::Sell, 15.0, 150),
            trade("sh.600000", 5, Side::Sell, 15.0, 150),
        ];
        let stats = analyze_trades(&trades, &[InstrumentId::from("sh.600000")]);
        assert_eq!(stats.closed_trades, 2);
        assert_eq!(stats.winning_trades, 1);
        assert_eq!(stats.losing_trades, 1);
        assert!((stats.gross_profit - 500.0).abs() < 1e-9);
        assert!((stats.gross_loss - 250.0).abs() < 1e-9);
        assert!((stats.profit_factor - 2.0).abs() < 1e-9);
        assert_eq!(stats.avg_holding_days, Some(3.5));
    }

    #[test]
    fn wins_without_losses_give_infinite_profit_factor() {
        let trades = vec![
            trade("sz.000001", 0, Side::Buy, 10.0, 10),
            trade("sz.000001", 2, Side::Sell, 11.0, 10),
        ];
        let stats = analyze_trades(&trades, &[]);
        assert_eq!(stats.win_rate, 1.0);
        assert!(stats.profit_factor.is_infinite());
    }

    #[test]
    fn break_even_counts_as_loss() {
        let trades = vec![
            trade("sz.000001", 0, Side::Buy, 10.0, 10),
            trade("sz.000001", 1, Side::Sell, 10.0, 10),
        ];
        let stats = analyze_trades(&trades, &[]);
        assert_eq!(stats.losing_trades, 1);
        assert_eq!(stats.profit_factor, 0.0);
    }

    #[test]
    fn orphan_sell_is_ignored() {
        let trades = vec![trade("sz.000001", 0, Side::Sell, 10.0, 10)];
        let stats = analyze_trades(&trades, &[]);
        assert_eq!(stats.total_trades, 1);
        assert_eq!(stats.closed_trades, 0);
    }
}
