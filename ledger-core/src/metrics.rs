//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `hourlymotion_events_total{type}` - Events applied to a user record
//! - `hourlymotion_anonymous_events_total` - Events dropped for lack of a user
//! - `hourlymotion_decisions_total{outcome}` - Gating decisions (`ad` / `no_ad`)
//! - `hourlymotion_tokens_spent_total` - Tokens spent on skipped ads
//! - `hourlymotion_transaction_duration_seconds` - Histogram of transaction latencies

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Events applied, by type
    pub events_total: IntCounterVec,

    /// Anonymous events skipped
    pub anonymous_events: IntCounter,

    /// Gating decisions, by outcome
    pub decisions_total: IntCounterVec,

    /// Tokens spent on skipped ads
    pub tokens_spent: IntCounter,

    /// Transaction duration histogram
    pub transaction_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let events_total = IntCounterVec::new(
            Opts::new("hourlymotion_events_total", "Events applied to a user record"),
            &["type"],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        let anonymous_events = IntCounter::new(
            "hourlymotion_anonymous_events_total",
            "Events without a user id",
        )?;
        registry.register(Box::new(anonymous_events.clone()))?;

        let decisions_total = IntCounterVec::new(
            Opts::new("hourlymotion_decisions_total", "Ad gating decisions"),
            &["outcome"],
        )?;
        registry.register(Box::new(decisions_total.clone()))?;

        let tokens_spent = IntCounter::new(
            "hourlymotion_tokens_spent_total",
            "Tokens spent on skipped ads",
        )?;
        registry.register(Box::new(tokens_spent.clone()))?;

        let transaction_duration = Histogram::with_opts(
            HistogramOpts::new(
                "hourlymotion_transaction_duration_seconds",
                "Histogram of ledger transaction latencies",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.0]),
        )?;
        registry.register(Box::new(transaction_duration.clone()))?;

        Ok(Self {
            events_total,
            anonymous_events,
            decisions_total,
            tokens_spent,
            transaction_duration,
            registry,
        })
    }

    /// Record an applied event
    pub fn record_event(&self, event_type: &str) {
        self.events_total.with_label_values(&[label_for(event_type)]).inc();
    }

    /// Record a dropped anonymous event
    pub fn record_anonymous_event(&self) {
        self.anonymous_events.inc();
    }

    /// Record a gating decision
    pub fn record_decision(&self, display_ad: bool, spent: u64) {
        let outcome = if display_ad { "ad" } else { "no_ad" };
        self.decisions_total.with_label_values(&[outcome]).inc();
        self.tokens_spent.inc_by(spent);
    }

    /// Record transaction duration
    pub fn record_transaction_duration(&self, duration_seconds: f64) {
        self.transaction_duration.observe(duration_seconds);
    }

    /// Render the registry in the Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("tokens_spent", &self.tokens_spent.get())
            .finish_non_exhaustive()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

/// Event types are an open set; keep label cardinality bounded
fn label_for(event_type: &str) -> &'static str {
    match event_type {
        "ad_start" => "ad_start",
        "ad_end" => "ad_end",
        "video_start" => "video_start",
        "video_end" => "video_end",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.tokens_spent.get(), 0);
        assert_eq!(metrics.anonymous_events.get(), 0);
    }

    #[test]
    fn test_independent_registries() {
        // Each collector owns its registry, so several can coexist
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_anonymous_event();
        assert_eq!(a.anonymous_events.get(), 1);
        assert_eq!(b.anonymous_events.get(), 0);
    }

    #[test]
    fn test_record_event_buckets_unknown_types() {
        let metrics = Metrics::new().unwrap();
        metrics.record_event("ad_start");
        metrics.record_event("seek");
        metrics.record_event("pause");

        assert_eq!(metrics.events_total.with_label_values(&["ad_start"]).get(), 1);
        assert_eq!(metrics.events_total.with_label_values(&["other"]).get(), 2);
    }

    #[test]
    fn test_record_decision() {
        let metrics = Metrics::new().unwrap();
        metrics.record_decision(false, 1);
        metrics.record_decision(true, 0);
        metrics.record_decision(true, 0);

        assert_eq!(metrics.decisions_total.with_label_values(&["no_ad"]).get(), 1);
        assert_eq!(metrics.decisions_total.with_label_values(&["ad"]).get(), 2);
        assert_eq!(metrics.tokens_spent.get(), 1);
    }

    #[test]
    fn test_render_text_format() {
        let metrics = Metrics::new().unwrap();
        metrics.record_decision(false, 1);

        let text = metrics.render().unwrap();
        assert!(text.contains("hourlymotion_tokens_spent_total 1"));
    }
}
