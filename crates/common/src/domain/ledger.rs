//! Double-entry rules
//!
//! Amounts are integer cents. A line carries either a debit or a credit,
//! never both. An entry can be posted only when its debits equal its credits.

use crate::db::models::{Account, AccountType, JournalEntryLine};
use crate::errors::{AppError, Result};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Anything with a debit and a credit amount
pub trait PostingLine {
    fn debit_cents(&self) -> i64;
    fn credit_cents(&self) -> i64;
}

/// Bare amounts for one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub debit_cents: i64,
    pub credit_cents: i64,
}

impl PostingLine for LineAmounts {
    fn debit_cents(&self) -> i64 {
        self.debit_cents
    }

    fn credit_cents(&self) -> i64 {
        self.credit_cents
    }
}

impl PostingLine for JournalEntryLine {
    fn debit_cents(&self) -> i64 {
        self.debit_cents
    }

    fn credit_cents(&self) -> i64 {
        self.credit_cents
    }
}

/// Both amounts non-negative, exactly one of them positive
pub fn validate_line<L: PostingLine>(index: usize, line: &L) -> Result<()> {
    let (debit, credit) = (line.debit_cents(), line.credit_cents());
    if debit < 0 || credit < 0 {
        return Err(AppError::invalid_field(
            "lines",
            format!("line {}: amounts must not be negative", index),
        ));
    }
    if (debit > 0) == (credit > 0) {
        return Err(AppError::invalid_field(
            "lines",
            format!("line {}: exactly one of debit or credit must be positive", index),
        ));
    }
    Ok(())
}

/// Sum of debits and credits
pub fn totals<L: PostingLine>(lines: &[L]) -> Result<(i64, i64)> {
    let overflow = || AppError::invalid_field("lines", "entry total overflows");
    lines.iter().try_fold((0i64, 0i64), |(debit, credit), line| {
        Ok((
            debit.checked_add(line.debit_cents()).ok_or_else(overflow)?,
            credit.checked_add(line.credit_cents()).ok_or_else(overflow)?,
        ))
    })
}

/// Check every line and the entry's balance. Returns the balanced total.
pub fn ensure_balanced<L: PostingLine>(lines: &[L]) -> Result<i64> {
    if lines.len() < 2 {
        return Err(AppError::invalid_field(
            "lines",
            "an entry needs at least two lines to be posted",
        ));
    }
    for (index, line) in lines.iter().enumerate() {
        validate_line(index, line)?;
    }
    let (debit_cents, credit_cents) = totals(lines)?;
    if debit_cents != credit_cents {
        return Err(AppError::Unbalanced {
            debit_cents,
            credit_cents,
        });
    }
    Ok(debit_cents)
}

/// Line-for-line debit/credit swap
pub fn reversal_amounts<L: PostingLine>(lines: &[L]) -> Vec<LineAmounts> {
    lines
        .iter()
        .map(|line| LineAmounts {
            debit_cents: line.credit_cents(),
            credit_cents: line.debit_cents(),
        })
        .collect()
}

/// `YYYY-MM` for the month containing `date`
pub fn fiscal_period_of(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

pub fn validate_fiscal_period(period: &str) -> Result<()> {
    let bytes = period.as_bytes();
    let shaped = bytes.len() == 7
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && matches!((bytes[5], bytes[6]), (b'0', b'1'..=b'9') | (b'1', b'0'..=b'2'));
    if shaped {
        Ok(())
    } else {
        Err(AppError::invalid_field(
            "fiscal_period",
            format!("'{}' is not a YYYY-MM period", period),
        ))
    }
}

/// Account codes are 3 to 10 digits
pub fn validate_account_code(code: &str) -> Result<()> {
    let digits = code.len() >= 3 && code.len() <= 10 && code.bytes().all(|b| b.is_ascii_digit());
    if digits {
        Ok(())
    } else {
        Err(AppError::invalid_field(
            "code",
            format!("'{}' is not a 3-10 digit account code", code),
        ))
    }
}

/// One account's row in a trial balance
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrialBalanceRow {
    pub account_id: Uuid,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub debit_cents: i64,
    pub credit_cents: i64,
    /// Signed in the account's normal direction
    pub balance_cents: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrialBalance {
    pub fiscal_period: Option<String>,
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit_cents: i64,
    pub total_credit_cents: i64,
    pub is_balanced: bool,
}

/// Aggregate posted lines per account, ordered by account code.
/// Accounts without any line are left out.
pub fn trial_balance(
    accounts: &[Account],
    lines: &[JournalEntryLine],
    fiscal_period: Option<String>,
) -> TrialBalance {
    let mut sums: HashMap<Uuid, (i64, i64)> = HashMap::new();
    for line in lines {
        let entry = sums.entry(line.account_id).or_insert((0, 0));
        entry.0 = entry.0.saturating_add(line.debit_cents);
        entry.1 = entry.1.saturating_add(line.credit_cents);
    }

    let mut rows: Vec<TrialBalanceRow> = accounts
        .iter()
        .filter_map(|account| {
            let (debit_cents, credit_cents) = sums.get(&account.id).copied()?;
            let balance_cents = if account.account_type.is_debit_normal() {
                debit_cents.saturating_sub(credit_cents)
            } else {
                credit_cents.saturating_sub(debit_cents)
            };
            Some(TrialBalanceRow {
                account_id: account.id,
                code: account.code.clone(),
                name: account.name.clone(),
                account_type: account.account_type,
                debit_cents,
                credit_cents,
                balance_cents,
            })
        })
        .collect();
    rows.sort_by(|a, b| a.code.cmp(&b.code));

    let total_debit_cents = rows.iter().fold(0i64, |acc, r| acc.saturating_add(r.debit_cents));
    let total_credit_cents = rows.iter().fold(0i64, |acc, r| acc.saturating_add(r.credit_cents));

    TrialBalance {
        fiscal_period,
        rows,
        total_debit_cents,
        total_credit_cents,
        is_balanced: total_debit_cents == total_credit_cents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_code_shape() {
        assert!(validate_account_code("110").is_ok());
        assert!(validate_account_code("4100200300").is_ok());
        assert!(validate_account_code("11").is_err());
        assert!(validate_account_code("11A").is_err());
        assert!(validate_account_code("12345678901").is_err());
    }

    fn line(debit_cents: i64, credit_cents: i64) -> LineAmounts {
        LineAmounts {
            debit_cents,
            credit_cents,
        }
    }

    #[test]
    fn test_balanced_entry() {
        let lines = [line(10000, 0), line(0, 10000)];
        assert_eq!(ensure_balanced(&lines).unwrap(), 10000);
    }

    #[test]
    fn test_split_lines_balance() {
        let lines = [line(7500, 0), line(2500, 0), line(0, 10000)];
        assert_eq!(totals(&lines).unwrap(), (10000, 10000));
        assert!(ensure_balanced(&lines).is_ok());
    }

    #[test]
    fn test_unbalanced_entry() {
        let lines = [line(10000, 0), line(0, 9999)];
        let err = ensure_balanced(&lines).unwrap_err();
        assert!(matches!(
            err,
            AppError::Unbalanced {
                debit_cents: 10000,
                credit_cents: 9999
            }
        ));
    }

    #[test]
    fn test_line_must_be_single_sided() {
        assert!(validate_line(0, &line(100, 100)).is_err());
        assert!(validate_line(0, &line(0, 0)).is_err());
        assert!(validate_line(0, &line(-5, 0)).is_err());
        assert!(validate_line(0, &line(0, 1)).is_ok());
    }

    #[test]
    fn test_single_line_cannot_post() {
        assert!(ensure_balanced(&[line(100, 0)]).is_err());
    }

    #[test]
    fn test_overflow_is_rejected() {
        let lines = [line(i64::MAX, 0), line(1, 0)];
        assert!(totals(&lines).is_err());
    }

    #[test]
    fn test_reversal_swaps_each_line() {
        let lines = [line(10000, 0), line(0, 4000), line(0, 6000)];
        let reversed = reversal_amounts(&lines);
        assert_eq!(reversed, vec![line(0, 10000), line(4000, 0), line(6000, 0)]);
        // a reversal of a balanced entry is itself balanced
        assert!(ensure_balanced(&reversed).is_ok());
        // and reversing twice gives back the original
        assert_eq!(reversal_amounts(&reversed), lines.to_vec());
    }

    #[test]
    fn test_fiscal_periods() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(fiscal_period_of(date), "2026-03");
        assert!(validate_fiscal_period("2026-03").is_ok());
        assert!(validate_fiscal_period("2026-13").is_err());
        assert!(validate_fiscal_period("26-03").is_err());
        assert!(validate_fiscal_period("2026-12").is_ok());
        assert!(validate_fiscal_period("2026-00").is_err());
        assert!(validate_fiscal_period("2026-1").is_err());
        assert!(validate_fiscal_period("2026/03").is_err());
        assert!(validate_fiscal_period("2026-03 ").is_err());
        assert!(validate_fiscal_period("２０２６-03").is_err());
    }

    fn account(code: &str, account_type: AccountType) -> Account {
        let now = chrono::Utc::now().into();
        Account {
            id: Uuid::new_v4(),
            org_id: Uuid::nil(),
            code: code.into(),
            name: format!("Account {}", code),
            account_type,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn posted(account: &Account, debit_cents: i64, credit_cents: i64) -> JournalEntryLine {
        JournalEntryLine {
            id: Uuid::new_v4(),
            org_id: Uuid::nil(),
            entry_id: Uuid::nil(),
            line_index: 0,
            account_id: account.id,
            description: None,
            debit_cents,
            credit_cents,
        }
    }

    #[test]
    fn test_trial_balance_groups_by_account() {
        let cash = account("1000", AccountType::Asset);
        let revenue = account("4000", AccountType::Revenue);
        let unused = account("5000", AccountType::Expense);
        let lines = vec![
            posted(&revenue, 0, 10000),
            posted(&cash, 10000, 0),
            posted(&cash, 0, 2500),
            posted(&revenue, 2500, 0),
        ];

        let tb = trial_balance(&[revenue.clone(), cash.clone(), unused], &lines, None);
        assert_eq!(tb.rows.len(), 2);
        assert_eq!(tb.rows[0].code, "1000");
        assert_eq!(tb.rows[0].balance_cents, 7500);
        assert_eq!(tb.rows[1].balance_cents, 7500);
        assert_eq!(tb.total_debit_cents, 12500);
        assert!(tb.is_balanced);
    }

    #[test]
    fn test_trial_balance_saturates_extreme_totals() {
        let cash = account("1000", AccountType::Asset);
        let revenue = account("4000", AccountType::Revenue);
        let lines = vec![
            posted(&cash, i64::MAX, 0),
            posted(&cash, i64::MAX, 0),
            posted(&cash, 0, -1),
            posted(&revenue, 0, i64::MIN + 1),
            posted(&revenue, 2, 0),
        ];

        let tb = trial_balance(&[cash, revenue], &lines, None);
        assert_eq!(tb.rows[0].debit_cents, i64::MAX);
        assert_eq!(tb.rows[0].balance_cents, i64::MAX);
        assert_eq!(tb.rows[1].balance_cents, i64::MIN);
    }
}
