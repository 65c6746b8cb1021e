//! Plain-text rendering for dashboard reports and tickets.

use pulsetrack_core::analytics::{AlertSeverity, Report};
use pulsetrack_core::{SupportTicket, TicketPage};
use std::collections::BTreeMap;
use std::fmt::Write;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

fn counts(map: &BTreeMap<String, usize>) -> String {
    map.iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render the full dashboard as sectioned text.
pub fn report(report: &Report) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Dashboard: last {} day(s) ({} to {})",
        report.window_days,
        report.window_start.format(TIME_FORMAT),
        report.window_end.format(TIME_FORMAT)
    );

    let overview = &report.overview;
    let _ = writeln!(out, "\nOverview");
    let _ = writeln!(out, "  Active users:        {}", overview.active_users);
    let _ = writeln!(out, "  Events:              {}", overview.total_events);
    let _ = writeln!(
        out,
        "  Events per user:     {:.2}",
        overview.avg_events_per_user
    );
    match &overview.busiest_day {
        Some(day) => {
            let _ = writeln!(out, "  Busiest day:         {} ({} events)", day.date, day.events);
        }
        None => {
            let _ = writeln!(out, "  Busiest day:         -");
        }
    }
    for event in &overview.top_events {
        let _ = writeln!(out, "    {:<28} {}", event.event_name, event.count);
    }

    let _ = writeln!(out, "\nFeature adoption");
    if report.feature_adoption.is_empty() {
        let _ = writeln!(out, "  (no feature usage)");
    }
    for feature in &report.feature_adoption {
        let _ = writeln!(
            out,
            "  {:<28} {:>6.1}%  {} uses, {} users",
            feature.feature, feature.adoption_rate, feature.total_usage, feature.unique_users
        );
    }

    let funnel = &report.funnel_metrics;
    let _ = writeln!(
        out,
        "\nFunnel ({} users, {:.1}% converted)",
        funnel.total_users, funnel.conversion_rate
    );
    for stage in &funnel.stages {
        let _ = writeln!(
            out,
            "  {:<12} {:>5}  {:>5.1}%",
            stage.stage.as_str(),
            stage.users,
            stage.percentage
        );
    }

    let support = &report.support_metrics;
    let _ = writeln!(out, "\nSupport ({} tickets)", support.total_tickets);
    let _ = writeln!(out, "  Status:     {}", counts(&support.by_status));
    let _ = writeln!(out, "  Category:   {}", counts(&support.by_category));
    let _ = writeln!(out, "  Priority:   {}", counts(&support.by_priority));
    let _ = writeln!(out, "  Resolution: {:.1}%", support.resolution_rate);
    match support.avg_response_time_hours {
        Some(hours) => {
            let _ = writeln!(out, "  Avg response: {}h", hours);
        }
        None => {
            let _ = writeln!(out, "  Avg response: -");
        }
    }

    let upgrades = &report.upgrade_opportunities;
    let _ = writeln!(
        out,
        "\nUpgrade opportunities ({} scored, {} high potential, avg {:.1})",
        upgrades.scored_users, upgrades.high_potential_users, upgrades.average_score
    );
    for user in upgrades.users.iter().filter(|u| u.high_potential) {
        let _ = writeln!(out, "  {:<28} score {}", user.user_id, user.score);
    }

    let _ = writeln!(out, "\nTop users");
    for user in &report.top_users {
        let _ = writeln!(
            out,
            "  {:<28} {:>5}  {} features, last seen {}",
            user.user_id,
            user.engagement_score,
            user.distinct_features,
            user.last_activity.format(TIME_FORMAT)
        );
    }

    let _ = writeln!(out, "\nAlerts");
    if report.alerts.is_empty() {
        let _ = writeln!(out, "  none");
    }
    for alert in &report.alerts {
        let label = match alert.severity {
            AlertSeverity::Warning => "WARN",
            AlertSeverity::Critical => "CRIT",
        };
        let _ = writeln!(out, "  [{}] {}", label, alert.message);
    }

    out
}

/// One line per ticket plus a page footer.
pub fn ticket_page(page: &TicketPage) -> String {
    let mut out = String::new();
    for ticket in &page.tickets {
        let _ = writeln!(
            out,
            "{}  {:<11} {:<6} {:<9} {}  {}",
            ticket.id,
            ticket.status.as_str(),
            ticket.priority.as_str(),
            ticket.category.as_str(),
            ticket.created_at.format(TIME_FORMAT),
            ticket.subject
        );
    }
    let _ = writeln!(
        out,
        "page {} of {} ({} ticket(s))",
        page.current_page, page.total_pages, page.total_count
    );
    out
}

pub fn ticket(ticket: &SupportTicket) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}: {}", ticket.id, ticket.subject);
    let _ = writeln!(out, "  user:     {} ({})", ticket.user_id, ticket.user_plan);
    let _ = writeln!(
        out,
        "  status:   {}  priority: {}  category: {}",
        ticket.status,
        ticket.priority.as_str(),
        ticket.category.as_str()
    );
    let _ = writeln!(
        out,
        "  assigned: {}",
        ticket.assigned_to.as_deref().unwrap_or("-")
    );
    let _ = writeln!(out, "  created:  {}", ticket.created_at.format(TIME_FORMAT));
    let _ = writeln!(out, "  updated:  {}", ticket.updated_at.format(TIME_FORMAT));
    let _ = writeln!(out, "\n{}", ticket.description);
    for response in &ticket.responses {
        let _ = writeln!(
            out,
            "\n[{}] {}:\n{}",
            response.created_at.format(TIME_FORMAT),
            response.author,
            response.message
        );
    }
    out
}
