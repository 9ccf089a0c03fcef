//! Accuracy and macro-F1 trends across completed runs.

use serde::Serialize;

/// Slopes within this band count as stable.
const SLOPE_TOLERANCE: f64 = 0.01;
/// Number of latest runs compared against everything before them.
const RECENT_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

impl TrendDirection {
    fn from_slope(slope: Option<f64>) -> Self {
        match slope {
            None => TrendDirection::InsufficientData,
            Some(s) if s > SLOPE_TOLERANCE => TrendDirection::Improving,
            Some(s) if s < -SLOPE_TOLERANCE => TrendDirection::Declining,
            Some(_) => TrendDirection::Stable,
        }
    }
}

/// Headline scores of one completed run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunScore {
    pub accuracy: f64,
    pub macro_f1: f64,
}

impl RunScore {
    pub fn new(accuracy: f64, macro_f1: f64) -> Self {
        Self { accuracy, macro_f1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceTrend {
    pub runs: usize,
    pub direction: TrendDirection,
    /// Least-squares slope of accuracy per run
    pub slope: Option<f64>,
    pub f1_direction: TrendDirection,
    /// Least-squares slope of macro F1 per run
    pub f1_slope: Option<f64>,
    pub latest_accuracy: Option<f64>,
    pub latest_f1: Option<f64>,
    /// Mean accuracy of the latest runs (up to five)
    pub recent_average: Option<f64>,
    /// Mean accuracy of the runs before the recent window
    pub historical_average: Option<f64>,
    /// `recent_average - historical_average`; 0 when every run is recent
    pub improvement: Option<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn least_squares_slope(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;
    let (num, den) = values.iter().enumerate().fold((0.0, 0.0), |(num, den), (i, y)| {
        let dx = i as f64 - x_mean;
        (num + dx * (y - y_mean), den + dx * dx)
    });
    Some(num / den)
}

impl PerformanceTrend {
    /// `history` is one score per run, oldest first.
    #[must_use]
    pub fn from_history(history: &[RunScore]) -> Self {
        let accuracies: Vec<f64> = history.iter().map(|s| s.accuracy).collect();
        let f1s: Vec<f64> = history.iter().map(|s| s.macro_f1).collect();

        let split = accuracies.len().saturating_sub(RECENT_WINDOW);
        let (older, recent) = accuracies.split_at(split);
        let recent_average = mean(recent);
        let historical_average = mean(older);

        let slope = least_squares_slope(&accuracies);
        let f1_slope = least_squares_slope(&f1s);

        Self {
            runs: history.len(),
            direction: TrendDirection::from_slope(slope),
            slope,
            f1_direction: TrendDirection::from_slope(f1_slope),
            f1_slope,
            latest_accuracy: accuracies.last().copied(),
            latest_f1: f1s.last().copied(),
            recent_average,
            historical_average,
            improvement: recent_average.map(|r| r - historical_average.unwrap_or(r)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(accuracies: &[f64]) -> Vec<RunScore> {
        accuracies.iter().map(|&a| RunScore::new(a, a)).collect()
    }

    #[test]
    fn test_improving() {
        let t = PerformanceTrend::from_history(&scores(&[0.6, 0.7, 0.8]));
        assert_eq!(t.direction, TrendDirection::Improving);
        assert!((t.slope.unwrap() - 0.1).abs() < 1e-12);
        assert_eq!(t.latest_accuracy, Some(0.8));
    }

    #[test]
    fn test_declining_and_stable() {
        assert_eq!(
            PerformanceTrend::from_history(&scores(&[0.9, 0.8])).direction,
            TrendDirection::Declining
        );
        assert_eq!(
            PerformanceTrend::from_history(&scores(&[0.8, 0.805, 0.8])).direction,
            TrendDirection::Stable
        );
    }

    #[test]
    fn test_f1_tracked_separately() {
        let history = [
            RunScore::new(0.8, 0.9),
            RunScore::new(0.8, 0.7),
            RunScore::new(0.8, 0.5),
        ];
        let t = PerformanceTrend::from_history(&history);

        assert_eq!(t.direction, TrendDirection::Stable);
        assert_eq!(t.f1_direction, TrendDirection::Declining);
        assert!((t.f1_slope.unwrap() + 0.2).abs() < 1e-12);
        assert_eq!(t.latest_f1, Some(0.5));
    }

    #[test]
    fn test_insufficient_data() {
        let t = PerformanceTrend::from_history(&scores(&[0.7]));
        assert_eq!(t.direction, TrendDirection::InsufficientData);
        assert_eq!(t.f1_direction, TrendDirection::InsufficientData);
        assert_eq!(t.slope, None);
        assert_eq!(t.historical_average, None);
        assert_eq!(t.recent_average, Some(0.7));
        assert_eq!(t.improvement, Some(0.0));

        let empty = PerformanceTrend::from_history(&[]);
        assert_eq!(empty.runs, 0);
        assert_eq!(empty.improvement, None);
    }

    #[test]
    fn test_recent_window_and_improvement() {
        let t = PerformanceTrend::from_history(&scores(&[0.5, 0.5, 0.9, 0.9, 0.9, 0.9, 0.9]));
        assert_eq!(t.historical_average, Some(0.5));
        assert!((t.recent_average.unwrap() - 0.9).abs() < 1e-12);
        assert!((t.improvement.unwrap() - 0.4).abs() < 1e-12);
    }
}
