//! Support ticket triage.
//!
//! Priority is derived from the user's plan tier and the ticket category,
//! never taken from the caller:
//!
//! | Plan | Score | | Category | Score |
//! |------|-------|-|----------|-------|
//! | basic | 1 | | billing | 3 |
//! | premium | 2 | | technical | 2 |
//! | pro | 3 | | features | 1 |
//! | | | | general | 1 |
//!
//! A total of 5 or more is `high`, 3 or more is `medium`, anything else `low`.

use crate::error::{Error, Result};
use crate::types::{
    RequestMetadata, SupportTicket, TicketCategory, TicketPriority, TicketResponse, TicketStatus,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Score for a plan tier. Unknown tiers score like `basic`.
pub fn plan_score(plan: &str) -> u32 {
    match plan.trim().to_ascii_lowercase().as_str() {
        "pro" => 3,
        "premium" => 2,
        _ => 1,
    }
}

pub fn category_score(category: TicketCategory) -> u32 {
    match category {
        TicketCategory::Billing => 3,
        TicketCategory::Technical => 2,
        TicketCategory::Features | TicketCategory::General => 1,
    }
}

pub fn compute_priority(plan: &str, category: TicketCategory) -> TicketPriority {
    match plan_score(plan) + category_score(category) {
        total if total >= 5 => TicketPriority::High,
        total if total >= 3 => TicketPriority::Medium,
        _ => TicketPriority::Low,
    }
}

/// Caller-supplied fields for a new ticket.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub user_id: String,
    pub subject: String,
    pub category: TicketCategory,
    pub description: String,
    pub user_plan: String,
    pub metadata: RequestMetadata,
}

impl NewTicket {
    fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::validation("ticket userId is required"));
        }
        if self.subject.trim().is_empty() {
            return Err(Error::validation("ticket subject is required"));
        }
        if self.description.trim().is_empty() {
            return Err(Error::validation("ticket description is required"));
        }
        Ok(())
    }
}

/// Conjunctive ticket filters. `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub category: Option<TicketCategory>,
}

impl TicketFilter {
    pub fn matches(&self, ticket: &SupportTicket) -> bool {
        self.status.map_or(true, |s| ticket.status == s)
            && self.priority.map_or(true, |p| ticket.priority == p)
            && self.category.map_or(true, |c| ticket.category == c)
    }
}

/// One page of a ticket listing.
#[derive(Debug, Clone, Serialize)]
pub struct TicketPage {
    pub tickets: Vec<SupportTicket>,
    pub total_count: usize,
    pub total_pages: usize,
    /// 1-based
    pub current_page: usize,
}

/// The ticket collection.
#[derive(Debug, Clone, Default)]
pub struct TicketBook {
    tickets: Vec<SupportTicket>,
    next_seq: u64,
}

impl TicketBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate, prioritize, and store a new ticket.
    pub fn create(&mut self, new: NewTicket, now: DateTime<Utc>) -> Result<SupportTicket> {
        new.validate()?;

        let seq = self.next_seq.max(1);
        self.next_seq = seq + 1;

        let ticket = SupportTicket {
            id: format!("TKT-{:06}", seq),
            seq,
            priority: compute_priority(&new.user_plan, new.category),
            user_id: new.user_id,
            subject: new.subject,
            category: new.category,
            description: new.description,
            status: TicketStatus::Open,
            created_at: now,
            updated_at: now,
            assigned_to: None,
            user_plan: new.user_plan,
            responses: Vec::new(),
            metadata: new.metadata,
        };
        self.tickets.push(ticket.clone());
        Ok(ticket)
    }

    /// Re-insert a stored ticket (replay). Replaces any ticket with the same id.
    pub fn restore(&mut self, ticket: SupportTicket) {
        self.next_seq = self.next_seq.max(ticket.seq + 1);
        match self.tickets.iter_mut().find(|t| t.id == ticket.id) {
            Some(existing) => *existing = ticket,
            None => self.tickets.push(ticket),
        }
    }

    pub fn get(&self, id: &str) -> Result<&SupportTicket> {
        self.tickets
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::TicketNotFound(id.to_string()))
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut SupportTicket> {
        self.tickets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::TicketNotFound(id.to_string()))
    }

    /// Filter, sort by `created_at` descending, and cut one page.
    ///
    /// Pages are 1-based; page 0 is treated as page 1. A page past the end
    /// returns no tickets but still reports the totals.
    pub fn list(&self, filter: &TicketFilter, page: usize, page_size: usize) -> Result<TicketPage> {
        if page_size == 0 {
            return Err(Error::validation("pageSize must be at least 1"));
        }
        let page = page.max(1);

        let mut matching: Vec<&SupportTicket> =
            self.tickets.iter().filter(|t| filter.matches(t)).collect();
        // Newest first; creation order breaks timestamp ties
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.seq.cmp(&a.seq)));

        let total_count = matching.len();
        let total_pages = (total_count + page_size - 1) / page_size;
        let tickets = matching
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .cloned()
            .collect();

        Ok(TicketPage {
            tickets,
            total_count,
            total_pages,
            current_page: page,
        })
    }

    /// Move a ticket forward along open -> in_progress -> resolved -> closed.
    ///
    /// Steps may be skipped. Resolved and closed are both terminal and nothing
    /// moves backwards.
    pub fn update_status(
        &mut self,
        id: &str,
        status: TicketStatus,
        now: DateTime<Utc>,
    ) -> Result<SupportTicket> {
        let ticket = self.get_mut(id)?;
        if ticket.status.is_finished() || status <= ticket.status {
            return Err(Error::InvalidTransition {
                from: ticket.status.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }
        ticket.status = status;
        ticket.updated_at = now;
        Ok(ticket.clone())
    }

    pub fn assign(&mut self, id: &str, assignee: &str, now: DateTime<Utc>) -> Result<SupportTicket> {
        if assignee.trim().is_empty() {
            return Err(Error::validation("assignee is required"));
        }
        let ticket = self.get_mut(id)?;
        ticket.assigned_to = Some(assignee.to_string());
        ticket.updated_at = now;
        Ok(ticket.clone())
    }

    pub fn add_response(
        &mut self,
        id: &str,
        author: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<SupportTicket> {
        if message.trim().is_empty() {
            return Err(Error::validation("response message is required"));
        }
        let ticket = self.get_mut(id)?;
        ticket.responses.push(TicketResponse {
            author: author.to_string(),
            message: message.to_string(),
            created_at: now,
        });
        ticket.updated_at = now;
        Ok(ticket.clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SupportTicket> {
        self.tickets.iter()
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
    }

    fn new_ticket(plan: &str, category: TicketCategory) -> NewTicket {
        NewTicket {
            user_id: "u1".into(),
            subject: "Help".into(),
            category,
            description: "Something broke".into(),
            user_plan: plan.into(),
            metadata: RequestMetadata::default(),
        }
    }

    #[test]
    fn test_priority_table() {
        assert_eq!(compute_priority("pro", TicketCategory::Billing), TicketPriority::High);
        assert_eq!(compute_priority("basic", TicketCategory::General), TicketPriority::Low);
        assert_eq!(compute_priority("premium", TicketCategory::Billing), TicketPriority::High);
        assert_eq!(compute_priority("premium", TicketCategory::Features), TicketPriority::Medium);
        assert_eq!(compute_priority("basic", TicketCategory::Technical), TicketPriority::Medium);
        assert_eq!(compute_priority("pro", TicketCategory::Technical), TicketPriority::High);
        // Unknown tiers score like basic
        assert_eq!(compute_priority("enterprise", TicketCategory::General), TicketPriority::Low);
    }

    #[test]
    fn test_create_sets_defaults() {
        let mut book = TicketBook::new();
        let ticket = book.create(new_ticket("pro", TicketCategory::Billing), t0()).unwrap();

        assert_eq!(ticket.id, "TKT-000001");
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.priority, TicketPriority::High);
        assert_eq!(ticket.created_at, ticket.updated_at);
        assert!(ticket.responses.is_empty());
        assert!(ticket.assigned_to.is_none());
    }

    #[test]
    fn test_create_rejects_missing_fields() {
        let mut book = TicketBook::new();
        let mut missing = new_ticket("basic", TicketCategory::General);
        missing.subject = "  ".into();

        let err = book.create(missing, t0()).unwrap_err();
        assert!(err.is_validation());
        assert!(book.is_empty());
    }

    #[test]
    fn test_pagination_is_disjoint_and_newest_first() {
        let mut book = TicketBook::new();
        for i in 0..25 {
            book.create(
                new_ticket("basic", TicketCategory::General),
                t0() + Duration::minutes(i),
            )
            .unwrap();
        }

        let filter = TicketFilter::default();
        let p1 = book.list(&filter, 1, 10).unwrap();
        let p2 = book.list(&filter, 2, 10).unwrap();
        let p3 = book.list(&filter, 3, 10).unwrap();

        assert_eq!(p2.tickets.len(), 10);
        assert_eq!(p2.total_pages, 3);
        assert_eq!(p2.total_count, 25);
        assert_eq!(p2.current_page, 2);
        assert_eq!(p3.tickets.len(), 5);

        let ids = |page: &TicketPage| page.tickets.iter().map(|t| t.id.clone()).collect::<Vec<_>>();
        for id in ids(&p2) {
            assert!(!ids(&p1).contains(&id));
            assert!(!ids(&p3).contains(&id));
        }
        assert!(p1.tickets[0].created_at > p1.tickets[9].created_at);
        assert_eq!(p1.tickets[0].id, "TKT-000025");
    }

    #[test]
    fn test_same_timestamp_ordering_is_stable() {
        let mut book = TicketBook::new();
        for _ in 0..3 {
            book.create(new_ticket("basic", TicketCategory::General), t0()).unwrap();
        }
        let page = book.list(&TicketFilter::default(), 1, 10).unwrap();
        let ids: Vec<&str> = page.tickets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["TKT-000003", "TKT-000002", "TKT-000001"]);
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let mut book = TicketBook::new();
        book.create(new_ticket("pro", TicketCategory::Billing), t0()).unwrap();
        book.create(new_ticket("basic", TicketCategory::Billing), t0()).unwrap();
        book.create(new_ticket("pro", TicketCategory::General), t0()).unwrap();

        let filter = TicketFilter {
            category: Some(TicketCategory::Billing),
            priority: Some(TicketPriority::High),
            ..Default::default()
        };
        let page = book.list(&filter, 1, 10).unwrap();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.tickets[0].user_plan, "pro");

        let empty = book.list(&filter, 5, 10).unwrap();
        assert!(empty.tickets.is_empty());
        assert_eq!(empty.total_pages, 1);
        assert!(book.list(&filter, 1, 0).unwrap_err().is_validation());
    }

    #[test]
    fn test_status_moves_forward_only() {
        let mut book = TicketBook::new();
        let id = book
            .create(new_ticket("basic", TicketCategory::Technical), t0())
            .unwrap()
            .id;

        let later = t0() + Duration::hours(2);
        let ticket = book.update_status(&id, TicketStatus::InProgress, later).unwrap();
        assert_eq!(ticket.updated_at, later);

        book.update_status(&id, TicketStatus::Resolved, later).unwrap();
        assert!(book.update_status(&id, TicketStatus::Open, later).is_err());
    }

    #[test]
    fn test_resolved_and_closed_are_terminal() {
        let mut book = TicketBook::new();
        let resolved = book
            .create(new_ticket("basic", TicketCategory::Technical), t0())
            .unwrap()
            .id;
        let closed = book
            .create(new_ticket("basic", TicketCategory::General), t0())
            .unwrap()
            .id;
        let later = t0() + Duration::hours(1);

        book.update_status(&resolved, TicketStatus::Resolved, later).unwrap();
        let err = book
            .update_status(&resolved, TicketStatus::Closed, later)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(book.get(&resolved).unwrap().status, TicketStatus::Resolved);

        book.update_status(&closed, TicketStatus::Closed, later).unwrap();
        let err = book
            .update_status(&closed, TicketStatus::Resolved, later)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[test]
    fn test_assign_and_respond() {
        let mut book = TicketBook::new();
        let id = book
            .create(new_ticket("premium", TicketCategory::Features), t0())
            .unwrap()
            .id;

        book.assign(&id, "agent-7", t0()).unwrap();
        let ticket = book
            .add_response(&id, "agent-7", "Looking into it", t0() + Duration::minutes(5))
            .unwrap();
        assert_eq!(ticket.assigned_to.as_deref(), Some("agent-7"));
        assert_eq!(ticket.responses.len(), 1);
        assert_eq!(ticket.updated_at, t0() + Duration::minutes(5));

        assert!(book.get("TKT-999999").unwrap_err().is_not_found());
        assert!(book.assign("TKT-999999", "x", t0()).unwrap_err().is_not_found());
    }
}
