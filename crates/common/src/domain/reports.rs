//! In-memory aggregates for summary endpoints and the dashboard

use crate::db::models::{
    Campaign, FinancialStatus, Invoice, KaizenSuggestion, Lead, LeadStatus, Obligation,
    ObligationKind, Ticket, TicketStatus,
};
use crate::domain::Lifecycle;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// `part / whole` as a percentage rounded to two decimals; 0 when `whole` is 0
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    ((part as f64 / whole as f64) * 10_000.0).round() / 100.0
}

pub fn sum_cents<I: IntoIterator<Item = i64>>(amounts: I) -> i64 {
    amounts.into_iter().fold(0i64, |acc, v| acc.saturating_add(v))
}

/// Count items by a string key, ordered by key
pub fn count_by<T, F>(items: &[T], key: F) -> BTreeMap<String, u64>
where
    F: Fn(&T) -> String,
{
    let mut counts = BTreeMap::new();
    for item in items {
        *counts.entry(key(item)).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LeadPipelineSummary {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub open_pipeline_cents: i64,
    pub won_value_cents: i64,
    /// won / (won + lost)
    pub conversion_rate: f64,
}

pub fn lead_pipeline(leads: &[Lead]) -> LeadPipelineSummary {
    let by_status = count_by(leads, |l| l.status.label());
    let won = leads.iter().filter(|l| l.status == LeadStatus::Won).count() as u64;
    let lost = leads.iter().filter(|l| l.status == LeadStatus::Lost).count() as u64;

    LeadPipelineSummary {
        total: leads.len() as u64,
        by_status,
        open_pipeline_cents: sum_cents(
            leads
                .iter()
                .filter(|l| !l.status.is_terminal())
                .map(|l| l.estimated_value_cents),
        ),
        won_value_cents: sum_cents(
            leads
                .iter()
                .filter(|l| l.status == LeadStatus::Won)
                .map(|l| l.estimated_value_cents),
        ),
        conversion_rate: percentage(won, won + lost),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InvoiceSummary {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub gross_cents: i64,
    pub discount_cents: i64,
    pub outstanding_cents: i64,
    pub collected_cents: i64,
    pub overdue_count: u64,
    /// Pending invoices whose due date has passed but are not yet marked overdue
    pub past_due_count: u64,
}

pub fn invoice_summary(invoices: &[Invoice], today: NaiveDate) -> InvoiceSummary {
    let live: Vec<&Invoice> = invoices
        .iter()
        .filter(|i| i.status != FinancialStatus::Cancelled)
        .collect();

    InvoiceSummary {
        total: invoices.len() as u64,
        by_status: count_by(invoices, |i| i.status.label()),
        gross_cents: sum_cents(live.iter().map(|i| i.gross_cents)),
        discount_cents: sum_cents(live.iter().map(|i| i.discount_cents)),
        outstanding_cents: sum_cents(
            invoices
                .iter()
                .filter(|i| i.status.is_outstanding())
                .map(|i| i.net_cents),
        ),
        collected_cents: sum_cents(
            invoices
                .iter()
                .filter(|i| i.status == FinancialStatus::Paid)
                .map(|i| i.net_cents),
        ),
        overdue_count: invoices
            .iter()
            .filter(|i| i.status == FinancialStatus::Overdue)
            .count() as u64,
        past_due_count: invoices
            .iter()
            .filter(|i| i.status == FinancialStatus::Pending && i.due_date < today)
            .count() as u64,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ObligationSummary {
    pub open_receivable_cents: i64,
    pub open_payable_cents: i64,
    /// receivable minus payable
    pub net_position_cents: i64,
    pub overdue_count: u64,
}

pub fn obligation_summary(obligations: &[Obligation]) -> ObligationSummary {
    let open = |kind: ObligationKind| {
        sum_cents(
            obligations
                .iter()
                .filter(|o| o.kind == kind && o.status.is_outstanding())
                .map(|o| o.amount_cents),
        )
    };
    let receivable = open(ObligationKind::Receivable);
    let payable = open(ObligationKind::Payable);

    ObligationSummary {
        open_receivable_cents: receivable,
        open_payable_cents: payable,
        net_position_cents: receivable.saturating_sub(payable),
        overdue_count: obligations
            .iter()
            .filter(|o| o.status == FinancialStatus::Overdue)
            .count() as u64,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CampaignSummary {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub budget_cents: i64,
    pub spent_cents: i64,
    pub utilization_percent: f64,
    pub leads_generated: u64,
    pub cost_per_lead_cents: Option<i64>,
}

pub fn campaign_summary(campaigns: &[Campaign]) -> CampaignSummary {
    let budget = sum_cents(campaigns.iter().map(|c| c.budget_cents));
    let spent = sum_cents(campaigns.iter().map(|c| c.spent_cents));
    let leads: u64 = campaigns
        .iter()
        .map(|c| c.leads_generated.max(0) as u64)
        .sum();

    CampaignSummary {
        total: campaigns.len() as u64,
        by_status: count_by(campaigns, |c| c.status.label()),
        budget_cents: budget,
        spent_cents: spent,
        utilization_percent: percentage(spent.max(0) as u64, budget.max(0) as u64),
        leads_generated: leads,
        cost_per_lead_cents: (leads > 0).then(|| spent / leads as i64),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TicketSummary {
    pub total: u64,
    pub open_count: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_priority: BTreeMap<String, u64>,
}

pub fn ticket_summary(tickets: &[Ticket]) -> TicketSummary {
    TicketSummary {
        total: tickets.len() as u64,
        open_count: tickets
            .iter()
            .filter(|t| matches!(t.status, TicketStatus::Open | TicketStatus::InProgress))
            .count() as u64,
        by_status: count_by(tickets, |t| t.status.label()),
        by_priority: count_by(tickets, |t| sea_orm::ActiveEnum::to_value(&t.priority)),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KaizenSummary {
    pub total: u64,
    pub open_count: u64,
    pub by_status: BTreeMap<String, u64>,
}

pub fn kaizen_summary(suggestions: &[KaizenSuggestion]) -> KaizenSummary {
    KaizenSummary {
        total: suggestions.len() as u64,
        open_count: suggestions
            .iter()
            .filter(|s| !s.status.is_terminal())
            .count() as u64,
        by_status: count_by(suggestions, |s| s.status.label()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn lead(status: LeadStatus, value: i64) -> Lead {
        let now = Utc::now().into();
        Lead {
            id: Uuid::new_v4(),
            org_id: Uuid::nil(),
            name: "Prospect".into(),
            email: None,
            phone: None,
            company: None,
            source: None,
            estimated_value_cents: value,
            status,
            notes: None,
            owner_person_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn invoice(status: FinancialStatus, gross: i64, discount: i64, due: NaiveDate) -> Invoice {
        let now = Utc::now().into();
        Invoice {
            id: Uuid::new_v4(),
            org_id: Uuid::nil(),
            number: "INV".into(),
            customer_name: "Customer".into(),
            issue_date: due,
            due_date: due,
            gross_cents: gross,
            discount_cents: discount,
            net_cents: gross - discount,
            status,
            paid_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 2), 100.0);
        assert_eq!(percentage(5, 0), 0.0);
    }

    #[test]
    fn test_lead_pipeline() {
        let leads = vec![
            lead(LeadStatus::New, 1000),
            lead(LeadStatus::Negotiating, 5000),
            lead(LeadStatus::Won, 20000),
            lead(LeadStatus::Lost, 7000),
            lead(LeadStatus::Lost, 3000),
        ];
        let summary = lead_pipeline(&leads);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.by_status["lost"], 2);
        assert_eq!(summary.open_pipeline_cents, 6000);
        assert_eq!(summary.won_value_cents, 20000);
        assert_eq!(summary.conversion_rate, 33.33);
    }

    #[test]
    fn test_invoice_summary() {
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let earlier = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let later = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let invoices = vec![
            invoice(FinancialStatus::Pending, 10000, 1000, earlier),
            invoice(FinancialStatus::Pending, 5000, 0, later),
            invoice(FinancialStatus::Overdue, 2000, 0, earlier),
            invoice(FinancialStatus::Paid, 8000, 500, earlier),
            invoice(FinancialStatus::Cancelled, 99999, 0, earlier),
        ];
        let summary = invoice_summary(&invoices, today);
        assert_eq!(summary.outstanding_cents, 9000 + 5000 + 2000);
        assert_eq!(summary.collected_cents, 7500);
        assert_eq!(summary.overdue_count, 1);
        assert_eq!(summary.past_due_count, 1);
        // cancelled invoices do not count towards billed totals
        assert_eq!(summary.gross_cents, 25000);
        assert_eq!(summary.discount_cents, 1500);
    }

    #[test]
    fn test_count_by_orders_keys() {
        let counts = count_by(&["b", "a", "b"], |s| s.to_string());
        assert_eq!(counts.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(counts["b"], 2);
    }
}
