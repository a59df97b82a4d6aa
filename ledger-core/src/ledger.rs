//! Main ledger orchestration layer
//!
//! This module ties together storage, codec and gating into the high-level
//! API used by the HTTP service. Every mutating call is exactly one storage
//! transaction: load (or create) the user's record, change it, write it back.
//!
//! # Example
//!
//! ```no_run
//! use hourlymotion_ledger::{Config, Event, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> hourlymotion_ledger::Result<()> {
//!     let config = Config::default();
//!     let ledger = Ledger::open(&config).await?;
//!
//!     ledger.record_event(&Event::new("x2abc", "ad_start", "x8vid")).await?;
//!     let display_ad = ledger.decide("x2abc").await?;
//!     assert!(!display_ad);
//!
//!     Ok(())
//! }
//! ```

use crate::{
    codec,
    error::{Error, Result},
    gating::{self, BalanceMode, GatingPolicy, Outcome, SingleTokenPolicy},
    journal::EventJournal,
    metrics::Metrics,
    reporting,
    storage::{self, Storage},
    types::{Event, EventKind, Settings, UserRecord},
    Config,
};
use std::sync::Arc;
use std::time::Instant;

/// Main ledger interface
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Storage backend (injected, shared)
    storage: Arc<dyn Storage>,

    /// Ad gating rule
    policy: Arc<dyn GatingPolicy>,

    /// Debit behaviour on empty balances
    balance_mode: BalanceMode,

    /// Raw event log (if enabled)
    journal: Option<Arc<EventJournal>>,

    /// Metrics
    metrics: Metrics,
}

impl Ledger {
    /// Open ledger with configuration
    ///
    /// Opens the configured storage backend, which creates the record
    /// namespace if needed. Failure here should abort startup.
    pub async fn open(config: &Config) -> Result<Self> {
        let storage = storage::open(config).await?;

        let mut ledger = Self::new(storage)
            .with_policy(gating::policy_from_config(&config.gating))
            .with_balance_mode(BalanceMode::from_floor(config.gating.floor_balance));

        if let Some(path) = &config.event_log_path {
            let journal = EventJournal::open(path)
                .await
                .map_err(|e| Error::Startup(format!("cannot open event journal: {}", e)))?;
            ledger = ledger.with_journal(journal);
        }

        tracing::info!(
            backend = ledger.storage.backend(),
            policy = ledger.policy.name(),
            balance_mode = ?ledger.balance_mode,
            "Ledger opened"
        );

        Ok(ledger)
    }

    /// Ledger over an existing storage handle, with the default policy
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            policy: Arc::new(SingleTokenPolicy),
            balance_mode: BalanceMode::default(),
            journal: None,
            metrics: Metrics::default(),
        }
    }

    /// Replace the gating policy
    pub fn with_policy(mut self, policy: Arc<dyn GatingPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Set the balance mode
    pub fn with_balance_mode(mut self, mode: BalanceMode) -> Self {
        self.balance_mode = mode;
        self
    }

    /// Enable the raw event journal
    pub fn with_journal(mut self, journal: EventJournal) -> Self {
        self.journal = Some(Arc::new(journal));
        self
    }

    /// Storage backend
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Active gating policy
    pub fn policy(&self) -> &dyn GatingPolicy {
        self.policy.as_ref()
    }

    /// Apply an event received from a player, then journal it
    ///
    /// Journal failures are logged and never fail the call.
    pub async fn record_event(&self, event: &Event) -> Result<Option<UserRecord>> {
        let record = self.apply_event(event.user_id(), &event.kind()).await?;

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(event).await {
                tracing::warn!(error = %e, "Failed to journal event");
            }
        }

        Ok(record)
    }

    /// Apply an engagement event to the user's record
    ///
    /// Returns `None` for anonymous events (empty user id), which are
    /// accepted and discarded. Only `ad_start` and `video_start` change
    /// counters; every other type is stored unchanged.
    pub async fn apply_event(
        &self,
        user_id: &str,
        kind: &EventKind,
    ) -> Result<Option<UserRecord>> {
        if user_id.is_empty() {
            tracing::debug!(event_type = %kind, "Skipping anonymous event");
            self.metrics.record_anonymous_event();
            return Ok(None);
        }

        let (record, ()) = self.mutate(user_id, |record| ingest(record, kind)).await?;

        self.metrics.record_event(kind.as_str());
        tracing::info!(
            event_type = %kind,
            user_id,
            ads_watched = record.ads_watched,
            videos_watched = record.videos_watched,
            token_balance = record.token_balance,
            tokens_used = record.tokens_used,
            "Stored event"
        );

        Ok(Some(record))
    }

    /// Decide whether to show an ad, spending tokens when it is skipped
    ///
    /// Returns `true` when an ad must be displayed. The comparison and the
    /// debit happen inside one transaction, so concurrent calls for the same
    /// user can never spend the same token twice.
    pub async fn decide(&self, user_id: &str) -> Result<bool> {
        if user_id.is_empty() {
            return Err(Error::Validation("missing user id".to_string()));
        }

        let policy = self.policy.as_ref();
        let mode = self.balance_mode;
        let (record, outcome): (UserRecord, Outcome) = self
            .mutate(user_id, |record| gating::apply(policy, mode, record))
            .await?;

        self.metrics.record_decision(outcome.display_ad, outcome.spent);
        if outcome.display_ad {
            tracing::info!(user_id, token_balance = record.token_balance, "Will display an ad");
        } else {
            tracing::info!(
                user_id,
                debited = outcome.debited,
                token_balance = record.token_balance,
                tokens_used = record.tokens_used,
                "Will NOT display an ad"
            );
        }

        Ok(outcome.display_ad)
    }

    /// Replace the user's settings wholesale
    pub async fn update_settings(&self, user_id: &str, settings: Settings) -> Result<UserRecord> {
        if user_id.is_empty() {
            return Err(Error::Validation("missing user id".to_string()));
        }

        let (record, ()) = self
            .mutate(user_id, move |record| record.settings = settings)
            .await?;

        tracing::info!(user_id, settings = ?record.settings, "Stored settings");
        Ok(record)
    }

    /// Fetch one record; `None` when the user was never seen
    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        reporting::get_user(self.storage.as_ref(), user_id).await
    }

    /// Every stored record, in storage order
    pub async fn list_all(&self) -> Result<Vec<UserRecord>> {
        reporting::list_all(self.storage.as_ref()).await
    }

    /// Load-or-create `user_id`, apply `f`, persist, all in one transaction
    async fn mutate<F, R>(&self, user_id: &str, f: F) -> Result<(UserRecord, R)>
    where
        F: FnOnce(&mut UserRecord) -> R + Send,
        R: Send,
    {
        let started = Instant::now();
        let result = self.mutate_in_transaction(user_id, f).await;
        self.metrics
            .record_transaction_duration(started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            tracing::error!(user_id, error = %e, "Transaction aborted");
        }
        result
    }

    async fn mutate_in_transaction<F, R>(&self, user_id: &str, f: F) -> Result<(UserRecord, R)>
    where
        F: FnOnce(&mut UserRecord) -> R + Send,
        R: Send,
    {
        let mut tx = self.storage.begin().await?;

        let current = tx.get(user_id).await?;
        let mut record = codec::decode_or_new(user_id, current.as_deref())?;
        let value = f(&mut record);

        tx.put(user_id, codec::encode(&record)?);
        tx.commit().await?;

        Ok((record, value))
    }
}

/// Apply one event to a record
fn ingest(record: &mut UserRecord, kind: &EventKind) {
    match kind {
        EventKind::AdStart => {
            record.ads_watched = record.ads_watched.saturating_add(1);
            record.token_balance = record.token_balance.saturating_add(1);
        }
        EventKind::VideoStart => {
            record.videos_watched = record.videos_watched.saturating_add(1);
        }
        // End events are reported but only starts are counted
        EventKind::AdEnd | EventKind::VideoEnd | EventKind::Other(_) => {}
    }
}
