//! Ad gating decision
//!
//! A [`GatingPolicy`] looks at a user's record and says whether to show an
//! ad and what skipping it costs. [`apply`] then debits the record according
//! to the [`BalanceMode`]. Both run inside the storage transaction opened by
//! [`crate::Ledger::decide`], so the compare and the debit cannot interleave
//! with another decision for the same user.
//!
//! # States
//!
//! ```text
//!                  ad_start
//!  ┌──────────┐ ─────────────────► ┌──────────┐ ──┐ decide
//!  │ DEPLETED │                    │  CREDIT  │   │ (balance stays > 0)
//!  │ bal <= 0 │ ◄───────────────── │  bal > 0 │ ◄─┘
//!  └──────────┘  decide (hits 0)   └──────────┘
//! ```

use crate::{
    config::{GatingConfig, PolicyKind},
    types::UserRecord,
};
use std::fmt;
use std::sync::Arc;

/// What a policy decided for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Show an ad
    pub display_ad: bool,

    /// Price of skipping an ad, in tokens
    pub charge: i64,

    /// Price of a shown ad, only collected in [`BalanceMode::Unfloored`]
    pub shown_charge: i64,
}

/// Decision rule deciding whether a user sees an ad
pub trait GatingPolicy: Send + Sync + fmt::Debug {
    /// Policy name, for logs
    fn name(&self) -> &'static str;

    /// Evaluate the record as loaded inside the transaction
    fn evaluate(&self, record: &UserRecord) -> Verdict;
}

/// Skip the ad while the user has any token left, one token per skip
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleTokenPolicy;

impl GatingPolicy for SingleTokenPolicy {
    fn name(&self) -> &'static str {
        "single_token"
    }

    fn evaluate(&self, record: &UserRecord) -> Verdict {
        Verdict {
            display_ad: record.token_balance <= 0,
            charge: 1,
            shown_charge: 1,
        }
    }
}

/// Skip the ad only for users who opted in and hold more than `threshold`
/// tokens; each skip costs `cost` tokens at once
#[derive(Debug, Clone)]
pub struct ThresholdPolicy {
    /// Balance must be strictly greater than this
    pub threshold: i64,

    /// Tokens debited per skipped ad
    pub cost: i64,

    /// Settings key holding the opt-in flag
    pub flag: String,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            threshold: 4,
            cost: 4,
            flag: crate::types::REDUCE_ADS.to_string(),
        }
    }
}

impl GatingPolicy for ThresholdPolicy {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn evaluate(&self, record: &UserRecord) -> Verdict {
        let opted_in = record.settings.flag(&self.flag);
        Verdict {
            display_ad: !(opted_in && record.token_balance > self.threshold),
            charge: self.cost,
            shown_charge: 0,
        }
    }
}

/// How debits interact with an empty balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BalanceMode {
    /// Charge only skipped ads, never below zero
    #[default]
    Floored,

    /// Also collect the policy's shown-ad charge; balances can go negative
    Unfloored,
}

impl BalanceMode {
    /// Mode from the `floor_balance` switch
    pub fn from_floor(floor_balance: bool) -> Self {
        if floor_balance {
            BalanceMode::Floored
        } else {
            BalanceMode::Unfloored
        }
    }
}

/// Result of a gating decision after the debit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Show an ad
    pub display_ad: bool,

    /// Tokens removed from the balance
    pub debited: i64,

    /// Tokens counted as spent on a skipped ad
    pub spent: u64,
}

/// Evaluate `policy` on `record` and debit it in place
pub fn apply(policy: &dyn GatingPolicy, mode: BalanceMode, record: &mut UserRecord) -> Outcome {
    let verdict = policy.evaluate(record);
    let charge = verdict.charge.max(0);

    let debited = match (verdict.display_ad, mode) {
        (true, BalanceMode::Floored) => 0,
        (true, BalanceMode::Unfloored) => verdict.shown_charge.max(0),
        (false, BalanceMode::Floored) => charge.min(record.token_balance.max(0)),
        (false, BalanceMode::Unfloored) => charge,
    };

    record.token_balance = record.token_balance.saturating_sub(debited);

    let spent = if verdict.display_ad { 0 } else { debited as u64 };
    record.tokens_used = record.tokens_used.saturating_add(spent);

    Outcome {
        display_ad: verdict.display_ad,
        debited,
        spent,
    }
}

/// Build the policy selected by configuration
pub fn policy_from_config(config: &GatingConfig) -> Arc<dyn GatingPolicy> {
    match config.policy {
        PolicyKind::SingleToken => Arc::new(SingleTokenPolicy),
        PolicyKind::Threshold => Arc::new(ThresholdPolicy {
            threshold: config.threshold,
            cost: config.cost,
            flag: config.flag.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Settings, REDUCE_ADS};

    fn record_with_balance(balance: i64) -> UserRecord {
        UserRecord {
            token_balance: balance,
            ..UserRecord::new("u1")
        }
    }

    #[test]
    fn test_single_token_spends_credit() {
        let mut record = record_with_balance(2);

        let outcome = apply(&SingleTokenPolicy, BalanceMode::Floored, &mut record);
        assert!(!outcome.display_ad);
        assert_eq!(outcome.debited, 1);
        assert_eq!(record.token_balance, 1);
        assert_eq!(record.tokens_used, 1);
    }

    #[test]
    fn test_single_token_depleted_shows_ad() {
        let mut record = record_with_balance(0);

        let outcome = apply(&SingleTokenPolicy, BalanceMode::Floored, &mut record);
        assert!(outcome.display_ad);
        assert_eq!(outcome.debited, 0);
        assert_eq!(record.token_balance, 0);
        assert_eq!(record.tokens_used, 0);
    }

    #[test]
    fn test_unfloored_charges_shown_ads() {
        let mut record = record_with_balance(0);

        let outcome = apply(&SingleTokenPolicy, BalanceMode::Unfloored, &mut record);
        assert!(outcome.display_ad);
        assert_eq!(outcome.debited, 1);
        assert_eq!(record.token_balance, -1);
        assert_eq!(record.tokens_used, 0);

        apply(&SingleTokenPolicy, BalanceMode::Unfloored, &mut record);
        assert_eq!(record.token_balance, -2);
    }

    #[test]
    fn test_threshold_requires_flag() {
        let policy = ThresholdPolicy::default();
        let mut record = record_with_balance(10);

        let outcome = apply(&policy, BalanceMode::Floored, &mut record);
        assert!(outcome.display_ad);
        assert_eq!(record.token_balance, 10);
    }

    #[test]
    fn test_threshold_debits_cost_above_threshold() {
        let policy = ThresholdPolicy::default();
        let mut record = record_with_balance(5);
        record.settings = Settings::new().with(REDUCE_ADS, true);

        let outcome = apply(&policy, BalanceMode::Floored, &mut record);
        assert!(!outcome.display_ad);
        assert_eq!(outcome.debited, 4);
        assert_eq!(record.token_balance, 1);
        assert_eq!(record.tokens_used, 4);

        // 1 is not above the threshold any more
        let outcome = apply(&policy, BalanceMode::Floored, &mut record);
        assert!(outcome.display_ad);
        assert_eq!(record.token_balance, 1);
    }

    #[test]
    fn test_threshold_at_boundary_shows_ad() {
        let policy = ThresholdPolicy::default();
        let mut record = record_with_balance(4);
        record.settings = Settings::new().with(REDUCE_ADS, "yes");

        assert!(apply(&policy, BalanceMode::Floored, &mut record).display_ad);
        assert_eq!(record.token_balance, 4);
    }

    #[test]
    fn test_floored_never_goes_negative() {
        #[derive(Debug)]
        struct Generous;

        impl GatingPolicy for Generous {
            fn name(&self) -> &'static str {
                "generous"
            }

            fn evaluate(&self, _record: &UserRecord) -> Verdict {
                Verdict {
                    display_ad: false,
                    charge: 3,
                    shown_charge: 0,
                }
            }
        }

        let mut record = record_with_balance(1);
        let outcome = apply(&Generous, BalanceMode::Floored, &mut record);
        assert!(!outcome.display_ad);
        assert_eq!(outcome.debited, 1);
        assert_eq!(record.token_balance, 0);
        assert_eq!(record.tokens_used, 1);
    }

    #[test]
    fn test_threshold_unfloored_shown_ads_are_free() {
        let policy = ThresholdPolicy::default();
        let mut record = record_with_balance(10);

        for _ in 0..3 {
            let outcome = apply(&policy, BalanceMode::Unfloored, &mut record);
            assert!(outcome.display_ad);
            assert_eq!(outcome.debited, 0);
        }
        assert_eq!(record.token_balance, 10);
        assert_eq!(record.tokens_used, 0);

        record.settings = Settings::new().with(REDUCE_ADS, true);
        let outcome = apply(&policy, BalanceMode::Unfloored, &mut record);
        assert!(!outcome.display_ad);
        assert_eq!(record.token_balance, 6);
        assert_eq!(record.tokens_used, 4);
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = GatingConfig::default();
        assert_eq!(policy_from_config(&config).name(), "single_token");

        config.policy = PolicyKind::Threshold;
        assert_eq!(policy_from_config(&config).name(), "threshold");
    }
}
