//! Studio - studio and academy booking desk
//!
//! Runs one booking operation per invocation against the local database.

use std::path::PathBuf;
use std::process;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use studio_core::{ResourceCategory, Role, TimeSpan};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod commands;
mod state;

/// Studio booking desk
#[derive(Parser)]
#[command(name = "studio", version, about = "Studio and academy booking desk")]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true, env = "STUDIO_DB")]
    db: Option<PathBuf>,

    /// Configuration file path
    #[arg(long, global = true, env = "STUDIO_CONFIG")]
    config: Option<PathBuf>,

    /// Display name of the acting user
    #[arg(long = "as", global = true, env = "STUDIO_ACTOR_NAME", default_value = "cli")]
    actor_name: String,

    /// Role of the acting user (admin, manager, basic)
    #[arg(long, global = true, env = "STUDIO_ACTOR_ROLE", default_value = "manager", value_parser = parse_role)]
    role: Role,

    /// Stable id of the acting user; needed to withdraw one's own request
    #[arg(long, global = true, env = "STUDIO_ACTOR_ID")]
    actor_id: Option<Uuid>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load resources, compatibility and requesters from a TOML catalog
    Seed {
        file: PathBuf,
    },

    /// Find a free resource for a window, or alternatives that day
    Availability {
        shoot_type: String,
        #[arg(value_parser = parse_date)]
        date: NaiveDate,
        start: String,
        end: String,
        /// Booking or group id to leave out (when re-checking an edit)
        #[arg(long)]
        exclude: Option<String>,
    },

    /// Submit a new booking
    Submit(FormArgs),

    /// Apply a workflow action (approve, cancel_request, withdraw, ...)
    Transition {
        /// Booking id or group id
        target: String,
        action: String,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Edit an editable booking; it returns to pending
    Edit {
        /// Booking id or group id
        target: String,
        #[command(flatten)]
        form: FormArgs,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Show the audit history of a booking
    History {
        booking_id: Uuid,
    },

    /// List active bookings on a date
    Schedule {
        #[arg(value_parser = parse_date)]
        date: NaiveDate,
    },

    /// Suggest a break window for a long booking
    BreakHint {
        start: String,
        end: String,
    },

    /// Record an externally reported event such as a cross-check
    Record {
        booking_id: Uuid,
        change_type: String,
        #[arg(long)]
        reason: Option<String>,
    },
}

/// Booking form fields shared by submit and edit
#[derive(Args, Debug)]
struct FormArgs {
    #[arg(long, value_parser = parse_category)]
    category: ResourceCategory,
    #[arg(long, value_parser = parse_date)]
    date: NaiveDate,
    #[arg(long)]
    start: String,
    #[arg(long)]
    end: String,
    #[arg(long, requires = "break_end")]
    break_start: Option<String>,
    #[arg(long, requires = "break_start")]
    break_end: Option<String>,
    #[arg(long)]
    requester: String,
    #[arg(long = "type")]
    shoot_type: String,
    #[arg(long)]
    course_name: Option<String>,
    #[arg(long)]
    course_code: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

impl FormArgs {
    fn into_form(self) -> studio_core::Result<studio_core::BookingForm> {
        let break_window = match (&self.break_start, &self.break_end) {
            (Some(start), Some(end)) => Some(TimeSpan::parse(start, end)?),
            _ => None,
        };
        Ok(studio_core::BookingForm {
            category: self.category,
            date: self.date,
            span: TimeSpan::parse(&self.start, &self.end)?,
            break_window,
            requester_name: self.requester,
            shoot_type: self.shoot_type,
            course_name: self.course_name,
            course_code: self.course_code,
            notes: self.notes,
        })
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    studio_core::parse_date(s).map_err(|e| e.user_message())
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse().map_err(|e: studio_core::ParseEnumError| e.to_string())
}

fn parse_category(s: &str) -> Result<ResourceCategory, String> {
    s.parse()
        .map_err(|e: studio_core::ParseEnumError| e.to_string())
}

fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let paths = match state::Paths::resolve(cli.db, cli.config) {
        Ok(paths) => paths,
        Err(e) => {
            tracing::error!("Failed to resolve data paths: {}", e);
            process::exit(1);
        }
    };
    let actor = state::actor_from(&cli.actor_name, cli.role, cli.actor_id);

    let app = match state::AppState::new(&paths, actor) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("Failed to initialize application: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = commands::run(&app, cli.command) {
        eprintln!("error: {}", e.user_message());
        process::exit(1);
    }
}
