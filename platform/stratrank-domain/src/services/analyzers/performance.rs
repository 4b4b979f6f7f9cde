use crate::entities::metrics::PerformanceMetrics;
use crate::value_objects::snapshot::PortfolioSnapshot;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const CALENDAR_DAYS_PER_YEAR: f64 = 365.0;

/// Risk and return figures of an equity curve.
///
/// Never fails: curves too short or too flat to measure yield zeros.
pub fn analyze_performance(curve: &[PortfolioSnapshot], risk_free_rate: f64) -> PerformanceMetrics {
    if curve.len() < 2 {
        return PerformanceMetrics::default();
    }

    PerformanceMetrics {
        annualized_return: annualized_return(curve),
        sharpe_ratio: sharpe_ratio(curve, risk_free_rate),
        max_drawdown: max_drawdown(curve),
    }
}

fn annualized_return(curve: &[PortfolioSnapshot]) -> f64 {
    let (Some(first), Some(last)) = (curve.first(), curve.last()) else {
        return 0.0;
    };
    let elapsed_days = (last.date - first.date).num_days();
    if elapsed_days <= 0 || first.total_value <= 0.0 {
        return 0.0;
    }
    let growth = last.total_value / first.total_value;
    let value = growth.powf(CALENDAR_DAYS_PER_YEAR / elapsed_days as f64) - 1.0;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn sharpe_ratio(curve: &[PortfolioSnapshot], risk_free_rate: f64) -> f64 {
    let daily_rf = risk_free_rate / CALENDAR_DAYS_PER_YEAR;
    let excess: Vec<f64> = curve
        .windows(2)
        .filter(|pair| pair[0].total_value > 0.0)
        .map(|pair| pair[1].total_value / pair[0].total_value - 1.0 - daily_rf)
        .collect();
    if excess.len() < 2 {
        return 0.0;
    }

    let n = excess.len() as f64;
    let mean = excess.iter().sum::<f64>() / n;
    let var = excess.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = var.sqrt();
    if std == 0.0 || !std.is_finite() {
        return 0.0;
    }
    mean / std * TRADING_DAYS_PER_YEAR.sqrt()
}

fn max_drawdown(curve: &[PortfolioSnapshot]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0f64;
    for snapshot in curve {
        peak = peak.max(snapshot.total_value);
        if peak > 0.0 {
            worst = worst.min(snapshot.total_value / peak - 1.0);
        }
    }
    worst.abs()
}

#[cfg(test)]
mod tests {
    use super::analyze_performance;
    use crate::value_objects::snapshot::PortfolioSnapshot;
    use chrono::{Days, NaiveDate};

    fn curve(values: &[f64], step_days: u64) -> Vec<PortfolioSnapshot> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| PortfolioSnapshot {
                date: start + Days::new(i as u64 * step_days),
                cash: *v,
                total_value: *v,
            })
            .collect()
    }

    #[test]
    fn short_curve_is_all_zero() {
        let metrics = analyze_performance(&curve(&[100.0], 1), 0.0);
        assert_eq!(metrics.annualized_return, 0.0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
        assert_eq!(metrics.max_drawdown, 0.0);
    }

    #[test]
    fn annualized_return_uses_calendar_days() {
        // doubling over exactly one year
        let metrics = analyze_performance(&curve(&[100.0, 200.0], 365), 0.0);
        assert!((metrics.annualized_return - 1.0).abs() < 1e-12);
    }

    #[test]
    fn same_day_curve_has_zero_annualized_return() {
        let mut points = curve(&[100.0, 150.0], 1);
        points[1].date = points[0].date;
        assert_eq!(analyze_performance(&points, 0.0).annualized_return, 0.0);
    }

    #[test]
    fn flat_curve_has_zero_sharpe() {
        let metrics = analyze_performance(&curve(&[100.0, 100.0, 100.0, 100.0], 1), 0.0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
        assert_eq!(metrics.max_drawdown, 0.0);
    }

    #[test]
    fn drawdown_is_measured_from_running_peak() {
        let metrics = analyze_performance(&curve(&[100.0, 120.0, 90.0, 130.0], 1), 0.0);
        assert!((metrics.max_drawdown - 0.25).abs() < 1e-12);
    }

    #[test]
    fn sharpe_matches_hand_computation() {
        let metrics = analyze_performance(&curve(&[100.0, 110.0, 99.0, 108.9], 1), 0.0);
        let returns = [0.1f64, -0.1, 0.1];
        let mean = returns.iter().sum::<f64>() / 3.0;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / 2.0;
        let expected = mean / var.sqrt() * 252f64.sqrt();
        assert!((metrics.sharpe_ratio - expected).abs() < 1e-9);
    }

    #[test]
    fn risk_free_rate_lowers_sharpe() {
        let points = curve(&[100.0, 101.0, 101.5, 103.0], 1);
        let base = analyze_performance(&points, 0.0).sharpe_ratio;
        let with_rf = analyze_performance(&points, 0.05).sharpe_ratio;
        assert!(with_rf < base);
    }
}
