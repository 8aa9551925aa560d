//! Subcommand handlers

use studio_core::{
    suggest_break, ActionResponse, Action, Allocation, BookingOutcome, BookingRef, Error, Result,
    TimeSpan,
};

use crate::state::AppState;
use crate::Commands;

pub fn run(app: &AppState, command: Commands) -> Result<()> {
    let service = &app.service;
    let actor = &app.actor;

    match command {
        Commands::Seed { file } => {
            app.seed(&file)?;
            println!("Catalog loaded from {}", file.display());
        }

        Commands::Availability {
            shoot_type,
            date,
            start,
            end,
            exclude,
        } => {
            let span = TimeSpan::parse(&start, &end)?;
            let exclude = exclude.map(|e| e.parse::<BookingRef>()).transpose()?;
            match service.check_availability(&shoot_type, date, span, exclude.as_ref())? {
                Allocation::Assigned { resource_id } => {
                    println!("Free: resource {resource_id}");
                }
                Allocation::Unavailable {
                    message,
                    suggestions,
                } => {
                    println!("{message}");
                    for window in suggestions {
                        println!("  try {window}");
                    }
                }
            }
        }

        Commands::Submit(form) => {
            let result = form
                .into_form()
                .and_then(|form| service.submit_booking(&form, actor));
            respond(result)?;
        }

        Commands::Transition {
            target,
            action,
            reason,
        } => {
            let target = target.parse::<BookingRef>()?;
            let action = action
                .parse::<Action>()
                .map_err(|e| Error::validation(e.to_string()))?;
            let result = service.request_transition(&target, action, reason.as_deref(), actor);
            respond(result)?;
        }

        Commands::Edit {
            target,
            form,
            reason,
        } => {
            let target = target.parse::<BookingRef>()?;
            let result = form
                .into_form()
                .and_then(|form| service.edit_booking(&target, &form, reason.as_deref(), actor));
            respond(result)?;
        }

        Commands::History { booking_id } => {
            for view in service.get_history(booking_id)? {
                println!(
                    "{}  {:<24} {:<16} {}",
                    view.entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                    view.entry.change_type.as_str(),
                    view.entry.actor_name,
                    view.summary
                );
            }
        }

        Commands::Schedule { date } => {
            for booking in service.day_schedule(date)? {
                println!(
                    "{}  resource {:<4} {:<24} {:<22} {}",
                    booking.span,
                    booking.resource_id,
                    booking.status.as_str(),
                    booking.requester_name,
                    booking.id
                );
            }
        }

        Commands::BreakHint { start, end } => {
            let outer = TimeSpan::parse(&start, &end)?;
            let threshold = service.config().composer.break_hint_threshold_minutes;
            match suggest_break(&outer, threshold) {
                Some(brk) => println!("Consider a break at {brk}"),
                None => println!("No break needed for {outer}"),
            }
        }

        Commands::Record {
            booking_id,
            change_type,
            reason,
        } => {
            let outcome =
                service.record_external(booking_id, &change_type, reason.as_deref(), actor)?;
            println!("{outcome:?}");
        }
    }
    Ok(())
}

/// Print the JSON response and hand back the original error, if any
fn respond(result: Result<BookingOutcome>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&ActionResponse::of(&result))?);
    result.map(|_| ())
}
