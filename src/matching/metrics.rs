//! Suggestion Metrics and Performance Monitoring
//!
//! Timing and counters recorded around each suggestion request. Counters go
//! through the `metrics` facade; they are exported only when a recorder is
//! installed (see the `prometheus` cargo feature).

use serde::Serialize;
use std::time::Instant;

use super::engine::RecipeMatch;

pub const SUGGESTION_REQUESTS: &str = "suggestions_requests_total";
pub const SUGGESTION_FAILURES: &str = "suggestions_failures_total";
pub const SUGGESTIONS_RETURNED: &str = "suggestions_returned";
pub const SUGGESTION_LATENCY_MS: &str = "suggestion_latency_ms";

/// Ranking slower than this is logged at warn level
pub const SLOW_RANKING_MS: u64 = 200;

/// Summary of one suggestion response, logged at debug level
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SuggestionStats {
    pub recipes_considered: usize,
    pub suggestions_returned: usize,
    pub fully_covered: usize,
    pub avg_match_percent: f32,
}

impl SuggestionStats {
    pub fn from_matches(recipes_considered: usize, matches: &[RecipeMatch]) -> Self {
        let fully_covered = matches.iter().filter(|m| m.missing_count == 0).count();
        let avg_match_percent = if matches.is_empty() {
            0.0
        } else {
            matches.iter().map(|m| m.match_percent as f32).sum::<f32>() / matches.len() as f32
        };

        Self {
            recipes_considered,
            suggestions_returned: matches.len(),
            fully_covered,
            avg_match_percent,
        }
    }
}

/// Push request counters and latency to the metrics recorder
pub fn record_suggestion(stats: &SuggestionStats, elapsed_ms: u64) {
    metrics::counter!(SUGGESTION_REQUESTS).increment(1);
    metrics::histogram!(SUGGESTIONS_RETURNED).record(stats.suggestions_returned as f64);
    metrics::histogram!(SUGGESTION_LATENCY_MS).record(elapsed_ms as f64);
}

pub fn record_failure() {
    metrics::counter!(SUGGESTION_FAILURES).increment(1);
}

/// Performance timer for tracking operation duration
pub struct PerformanceTimer {
    start: Instant,
    label: &'static str,
}

impl PerformanceTimer {
    pub fn new(label: &'static str) -> Self {
        Self {
            start: Instant::now(),
            label,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn log_if_slow(&self, threshold_ms: u64) {
        let elapsed = self.elapsed_ms();
        if elapsed > threshold_ms {
            tracing::warn!(
                "⚠️ Slow operation: {} took {}ms (threshold: {}ms)",
                self.label,
                elapsed,
                threshold_ms
            );
        }
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        let elapsed = self.elapsed_ms();
        tracing::debug!("⏱️ {} completed in {}ms", self.label, elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe_match(id: i32, match_percent: u32, missing_count: u32) -> RecipeMatch {
        RecipeMatch {
            id,
            name: format!("recipe {}", id),
            description: None,
            cooking_time: None,
            total_ingredients: 4,
            matched_ingredients: 4 - missing_count,
            missing_count,
            match_percent,
            missing_ingredients: Vec::new(),
        }
    }

    #[test]
    fn test_stats_from_matches() {
        let matches = vec![recipe_match(1, 100, 0), recipe_match(2, 75, 1), recipe_match(3, 50, 2)];
        let stats = SuggestionStats::from_matches(10, &matches);

        assert_eq!(stats.recipes_considered, 10);
        assert_eq!(stats.suggestions_returned, 3);
        assert_eq!(stats.fully_covered, 1);
        assert!((stats.avg_match_percent - 75.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_stats_for_empty_result() {
        let stats = SuggestionStats::from_matches(4, &[]);
        assert_eq!(stats.suggestions_returned, 0);
        assert_eq!(stats.avg_match_percent, 0.0);
    }

    #[test]
    fn test_timer_measures_elapsed() {
        let timer = PerformanceTimer::new("test");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(timer.elapsed_ms() >= 5);
    }
}
