//! pulsetrack - user activity analytics and support triage
//!
//! Each invocation loads the durable event log, replays it into a fresh
//! tracker, runs one command, and persists whatever the command recorded.

mod render;
mod workspace;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pulsetrack_core::{
    Config, EventType, NewTicket, Properties, PropertyValue, RequestMetadata, TicketCategory,
    TicketFilter, TicketPriority, TicketStatus,
};

use crate::workspace::Workspace;

#[derive(Parser)]
#[command(name = "pulsetrack")]
#[command(about = "Track user activity, triage support tickets, and report on both")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Record a raw event
    Track {
        #[arg(short, long)]
        user: String,
        /// Event type (user_action, feature_access, subscription_event, ...)
        #[arg(short = 't', long = "type", default_value = "user_action")]
        event_type: EventType,
        /// Event name, e.g. `login`
        name: String,
        /// Event property as key=value (repeatable)
        #[arg(short, long = "prop", value_parser = parse_property)]
        props: Vec<(String, PropertyValue)>,
    },
    /// Record an onboarding step
    Onboarding {
        #[arg(short, long)]
        user: String,
        step: String,
        #[arg(short, long = "prop", value_parser = parse_property)]
        props: Vec<(String, PropertyValue)>,
    },
    /// Record a feature access attempt
    Feature {
        #[arg(short, long)]
        user: String,
        feature: String,
        /// Record the attempt as blocked by the user's plan
        #[arg(long)]
        blocked: bool,
    },
    /// Record a subscription lifecycle event
    Subscription {
        #[arg(short, long)]
        user: String,
        /// Lifecycle action, e.g. `created` or `cancelled`
        action: String,
        #[arg(short, long)]
        plan: String,
    },
    /// Record a response to an upgrade prompt
    UpgradePrompt {
        #[arg(short, long)]
        user: String,
        #[arg(long)]
        trigger: String,
        /// What the user did, e.g. `shown`, `clicked`, `dismissed`
        action: String,
    },
    /// Log admin-reported feature usage
    LogUsage {
        #[arg(short, long)]
        user: String,
        feature: String,
        #[arg(short, long = "meta", value_parser = parse_property)]
        metadata: Vec<(String, PropertyValue)>,
    },
    /// Support ticket operations
    #[command(subcommand)]
    Ticket(TicketCommand),
    /// Show the operational dashboard
    Dashboard {
        /// Window length in days (defaults to the configured window)
        #[arg(short, long)]
        days: Option<u32>,
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },
}

#[derive(Subcommand)]
enum TicketCommand {
    /// Open a ticket; priority is computed from plan and category
    Create {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        subject: String,
        #[arg(short, long)]
        category: TicketCategory,
        #[arg(short, long)]
        description: String,
        /// Plan tier; looked up from configuration when omitted
        #[arg(short, long)]
        plan: Option<String>,
        #[arg(long)]
        user_agent: Option<String>,
        #[arg(long)]
        ip_address: Option<String>,
        #[arg(long)]
        current_url: Option<String>,
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },
    /// List tickets, newest first
    List {
        #[arg(long)]
        status: Option<TicketStatus>,
        #[arg(long)]
        priority: Option<TicketPriority>,
        #[arg(long)]
        category: Option<TicketCategory>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        page_size: usize,
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },
    /// Show one ticket with its responses
    Show {
        id: String,
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },
    /// Move a ticket forward (open, in_progress, resolved, closed)
    Status { id: String, status: TicketStatus },
    /// Assign a ticket to a support agent
    Assign { id: String, assignee: String },
    /// Add a response to a ticket
    Respond {
        id: String,
        #[arg(short, long)]
        author: String,
        message: String,
    },
}

/// Parse `key=value`. `true`/`false` become booleans and numeric values numbers.
fn parse_property(raw: &str) -> std::result::Result<(String, PropertyValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty property key in '{}'", raw));
    }

    let value = match value {
        "true" => PropertyValue::Bool(true),
        "false" => PropertyValue::Bool(false),
        other => match other.parse::<f64>() {
            Ok(n) if n.is_finite() => PropertyValue::Number(n),
            _ => PropertyValue::String(other.to_string()),
        },
    };
    Ok((key.to_string(), value))
}

fn to_properties(pairs: Vec<(String, PropertyValue)>) -> Properties {
    pairs.into_iter().collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        pulsetrack_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let mut workspace = Workspace::open(&config).context("failed to load stored state")?;
    run(&workspace, cli.command)?;
    workspace.persist()?;

    Ok(())
}

fn run(workspace: &Workspace, command: Command) -> Result<()> {
    let tracker = workspace.tracker();

    match command {
        Command::Track {
            user,
            event_type,
            name,
            props,
        } => {
            let id = tracker.track_event(&user, event_type, &name, to_properties(props))?;
            println!("{}", id);
        }
        Command::Onboarding { user, step, props } => {
            let id = tracker.track_onboarding_step(&user, &step, to_properties(props))?;
            println!("{}", id);
        }
        Command::Feature {
            user,
            feature,
            blocked,
        } => {
            let id = tracker.track_feature_access(&user, &feature, !blocked)?;
            println!("{}", id);
        }
        Command::Subscription { user, action, plan } => {
            let id = tracker.track_subscription_event(&user, &action, &plan)?;
            println!("{}", id);
        }
        Command::UpgradePrompt {
            user,
            trigger,
            action,
        } => {
            let id = tracker.track_upgrade_prompt(&user, &trigger, &action)?;
            println!("{}", id);
        }
        Command::LogUsage {
            user,
            feature,
            metadata,
        } => {
            let id = tracker.log_feature_usage(&user, &feature, to_properties(metadata))?;
            println!("{}", id);
        }
        Command::Ticket(command) => run_ticket(workspace, command)?,
        Command::Dashboard { days, format } => {
            let report = match days {
                Some(days) => tracker.dashboard(days)?,
                None => tracker.default_dashboard()?,
            };
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                Format::Text => print!("{}", render::report(&report)),
            }
        }
    }

    Ok(())
}

fn run_ticket(workspace: &Workspace, command: TicketCommand) -> Result<()> {
    let tracker = workspace.tracker();

    match command {
        TicketCommand::Create {
            user,
            subject,
            category,
            description,
            plan,
            user_agent,
            ip_address,
            current_url,
            format,
        } => {
            let ticket = tracker.create_ticket(NewTicket {
                user_id: user,
                subject,
                category,
                description,
                user_plan: plan.unwrap_or_default(),
                metadata: RequestMetadata {
                    user_agent,
                    ip_address,
                    current_url,
                },
            })?;
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&ticket)?),
                Format::Text => println!(
                    "{} created (priority: {})",
                    ticket.id,
                    ticket.priority.as_str()
                ),
            }
        }
        TicketCommand::List {
            status,
            priority,
            category,
            page,
            page_size,
            format,
        } => {
            let filter = TicketFilter {
                status,
                priority,
                category,
            };
            let page = tracker.list_tickets(&filter, page, page_size)?;
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&page)?),
                Format::Text => print!("{}", render::ticket_page(&page)),
            }
        }
        TicketCommand::Show { id, format } => {
            let ticket = tracker.get_ticket(&id)?;
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&ticket)?),
                Format::Text => print!("{}", render::ticket(&ticket)),
            }
        }
        TicketCommand::Status { id, status } => {
            let ticket = tracker.update_ticket_status(&id, status)?;
            println!("{} is now {}", ticket.id, ticket.status);
        }
        TicketCommand::Assign { id, assignee } => {
            let ticket = tracker.assign_ticket(&id, &assignee)?;
            println!("{} assigned to {}", ticket.id, assignee);
        }
        TicketCommand::Respond {
            id,
            author,
            message,
        } => {
            let ticket = tracker.add_ticket_response(&id, &author, &message)?;
            println!("{} now has {} response(s)", ticket.id, ticket.responses.len());
        }
    }

    Ok(())
}
