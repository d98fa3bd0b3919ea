//! Invoice amount rules

use crate::errors::{AppError, Result};
use chrono::NaiveDate;

/// `gross - discount`, with both non-negative and the discount not above gross
pub fn net_amount(gross_cents: i64, discount_cents: i64) -> Result<i64> {
    if gross_cents < 0 {
        return Err(AppError::invalid_field("gross_cents", "must not be negative"));
    }
    if discount_cents < 0 {
        return Err(AppError::invalid_field("discount_cents", "must not be negative"));
    }
    if discount_cents > gross_cents {
        return Err(AppError::invalid_field(
            "discount_cents",
            "discount cannot exceed the gross amount",
        ));
    }
    Ok(gross_cents - discount_cents)
}

pub fn validate_due_date(issue_date: NaiveDate, due_date: NaiveDate) -> Result<()> {
    if due_date < issue_date {
        return Err(AppError::invalid_field(
            "due_date",
            "due date cannot be before the issue date",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net_amount() {
        assert_eq!(net_amount(10000, 1500).unwrap(), 8500);
        assert_eq!(net_amount(10000, 10000).unwrap(), 0);
        assert!(net_amount(10000, 10001).is_err());
        assert!(net_amount(-1, 0).is_err());
        assert!(net_amount(100, -1).is_err());
    }

    #[test]
    fn test_due_date_order() {
        let issued = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        assert!(validate_due_date(issued, issued).is_ok());
        assert!(validate_due_date(issued, issued.pred_opt().unwrap()).is_err());
    }
}
