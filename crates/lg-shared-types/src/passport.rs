//! # Credit Passport Cache
//!
//! Denormalized per-borrower summary recomputed from the borrower's loans
//! every time a repayment or default is projected.

use crate::entities::{Loan, LoanStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowest possible credit score.
pub const MIN_CREDIT_SCORE: i32 = 300;

/// Highest possible credit score.
pub const MAX_CREDIT_SCORE: i32 = 850;

/// Score span awarded for a full repayment ratio.
const REPAYMENT_SPAN: f64 = 550.0;

/// Points removed per defaulted loan.
const DEFAULT_PENALTY: f64 = 40.0;

/// Cached borrower summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassportCache {
    pub borrower_id: String,
    pub total_loans: u32,
    pub total_repaid: u32,
    pub total_defaulted: u32,
    pub cumulative_borrowed_minor: i64,
    pub cumulative_repaid_minor: i64,
    pub credit_score: i32,
    pub last_updated: DateTime<Utc>,
}

impl PassportCache {
    /// Recompute the passport from every loan of `borrower_id`.
    pub fn summarize<'a>(
        borrower_id: &str,
        loans: impl IntoIterator<Item = &'a Loan>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut passport = Self {
            borrower_id: borrower_id.to_string(),
            total_loans: 0,
            total_repaid: 0,
            total_defaulted: 0,
            cumulative_borrowed_minor: 0,
            cumulative_repaid_minor: 0,
            credit_score: MIN_CREDIT_SCORE,
            last_updated: now,
        };

        for loan in loans.into_iter().filter(|l| l.borrower_id == borrower_id) {
            passport.total_loans += 1;
            match loan.status {
                LoanStatus::Repaid => passport.total_repaid += 1,
                LoanStatus::Defaulted => passport.total_defaulted += 1,
                LoanStatus::Active => {}
            }
            passport.cumulative_borrowed_minor = passport
                .cumulative_borrowed_minor
                .saturating_add(loan.principal_minor);
            passport.cumulative_repaid_minor = passport
                .cumulative_repaid_minor
                .saturating_add(loan.amount_repaid_minor);
        }

        passport.credit_score = credit_score(
            passport.cumulative_borrowed_minor,
            passport.cumulative_repaid_minor,
            passport.total_defaulted,
        );
        passport
    }
}

/// Score from repayment ratio minus a flat penalty per default, clamped to
/// `[MIN_CREDIT_SCORE, MAX_CREDIT_SCORE]`.
pub fn credit_score(cumulative_borrowed: i64, cumulative_repaid: i64, total_defaulted: u32) -> i32 {
    let mut score = MIN_CREDIT_SCORE as f64;
    if cumulative_borrowed > 0 {
        let ratio = cumulative_repaid as f64 / cumulative_borrowed as f64;
        score += ratio * REPAYMENT_SPAN;
    }
    score -= total_defaulted as f64 * DEFAULT_PENALTY;
    score
        .clamp(MIN_CREDIT_SCORE as f64, MAX_CREDIT_SCORE as f64)
        .round() as i32
}
