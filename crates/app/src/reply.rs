//! Reply rendering — plain-text bodies for every dispatch result.

use std::fmt::Write as _;

use hassbridge_domain::command::Verb;
use hassbridge_domain::context::ContextSnapshot;
use hassbridge_domain::entity::{EntityDomain, EntityRecord};
use hassbridge_domain::outcome::CommandResult;

use crate::dispatcher::FailureReason;
use crate::services::{Generation, RefreshReport};

/// Maximum number of search hits listed in one reply.
pub const SEARCH_LIMIT: usize = 20;

/// Reply used when the conversation agent answers with nothing.
pub const REQUEST_PROCESSED: &str = "Request processed.";

pub const SESSION_CLEARED: &str = "Conversation context cleared.";

const UNASSIGNED_AREA: &str = "Unassigned";

/// Aggregate report of a multi-target command.
#[must_use]
pub fn command_results(verb: Verb, results: &[CommandResult]) -> String {
    let succeeded = results.iter().filter(|r| r.success()).count();
    let mut out = format!("{verb}: {succeeded}/{} succeeded", results.len());
    for result in results {
        let label = result
            .entity_id
            .as_ref()
            .map_or_else(|| result.token.clone(), ToString::to_string);
        match &result.outcome {
            Ok(response) => {
                let _ = match &response.new_state {
                    Some(state) => write!(out, "\n✓ {label}: {state}"),
                    None => write!(out, "\n✓ {label}"),
                };
            }
            Err(failure) => {
                let _ = write!(out, "\n✗ {label}: {failure}");
            }
        }
        if let Some(warning) = &result.warning {
            let _ = write!(out, "\n  ⚠ {warning}");
        }
    }
    out
}

/// Entities of `domain` grouped by area, unassigned last.
#[must_use]
pub fn listing(domain: EntityDomain, generation: &Generation) -> String {
    let grouped = generation.by_domain_and_area(domain);
    let total: usize = grouped.values().map(Vec::len).sum();
    if total == 0 {
        return format!("No {domain} entities found.");
    }

    let mut out = format!("{total} {domain} entities:");
    let named = grouped.iter().filter(|(area, _)| area.is_some());
    let unassigned = grouped.iter().filter(|(area, _)| area.is_none());
    for (area, records) in named.chain(unassigned) {
        let _ = write!(out, "\n[{}]", area.unwrap_or(UNASSIGNED_AREA));
        for record in records {
            let marker = if record.is_on() { "●" } else { "○" };
            let _ = write!(
                out,
                "\n  {marker} {} ({}): {}",
                record.friendly_name, record.entity_id, record.state.state
            );
        }
    }
    out
}

/// Search hits, capped at [`SEARCH_LIMIT`].
#[must_use]
pub fn search_results(query: &str, hits: &[&EntityRecord]) -> String {
    if hits.is_empty() {
        return format!("No entity matches {query:?}.");
    }
    let mut out = format!("{} result(s) for {query:?}:", hits.len());
    for record in hits.iter().take(SEARCH_LIMIT) {
        let _ = write!(
            out,
            "\n• {} ({}): {}",
            record.friendly_name, record.entity_id, record.state.state
        );
        if !record.aliases.is_empty() {
            let _ = write!(out, " [aliases: {}]", record.aliases.join(", "));
        }
    }
    if hits.len() > SEARCH_LIMIT {
        let _ = write!(
            out,
            "\n… {} more, refine the query.",
            hits.len() - SEARCH_LIMIT
        );
    }
    out
}

/// Home summary for the `info` verb.
#[must_use]
pub fn context(snapshot: &ContextSnapshot) -> String {
    if snapshot.is_empty() {
        return "Nothing to report.".to_string();
    }
    let mut out = String::from("Home status:");

    if !snapshot.lights_on.is_empty() {
        let _ = write!(out, "\nLights on ({}):", snapshot.lights_on.len());
        for light in &snapshot.lights_on {
            let _ = match light.brightness {
                Some(pct) => write!(out, "\n  {} {pct}%", light.name),
                None => write!(out, "\n  {}", light.name),
            };
        }
    }
    if !snapshot.climate.is_empty() {
        out.push_str("\nClimate:");
        for unit in &snapshot.climate {
            let _ = write!(out, "\n  {} {}", unit.name, unit.hvac_mode);
            if let Some(current) = unit.current_temperature {
                let _ = write!(out, ", now {current}°C");
            }
            if let Some(target) = unit.target_temperature {
                let _ = write!(out, ", target {target}°C");
            }
            if let Some(fan) = &unit.fan_mode {
                let _ = write!(out, ", fan {fan}");
            }
        }
    }
    for (title, readings) in [
        ("Temperature", &snapshot.temperatures),
        ("Humidity", &snapshot.humidity),
        ("Air quality", &snapshot.air_quality),
    ] {
        if readings.is_empty() {
            continue;
        }
        let _ = write!(out, "\n{title}:");
        for reading in readings {
            let _ = write!(out, "\n  {} {}{}", reading.name, reading.value, reading.unit);
        }
    }
    for weather in &snapshot.weather {
        let _ = write!(out, "\nWeather: {} {}", weather.name, weather.condition);
        if let Some(temperature) = weather.temperature {
            let _ = write!(out, ", {temperature}°C");
        }
        if let Some(humidity) = weather.humidity {
            let _ = write!(out, ", {humidity}%");
        }
    }
    if !snapshot.alerts.is_empty() {
        out.push_str("\nAttention:");
        for alert in &snapshot.alerts {
            let _ = write!(out, "\n  {} ({})", alert.name, alert.device_class);
        }
    }
    out
}

/// Verb overview for the `help` verb.
#[must_use]
pub fn help(marker: &str) -> String {
    let mut out = String::from("Commands:");
    for verb in Verb::ALL {
        let _ = write!(out, "\n{marker}{}  {}", verb.usage(), verb.description());
    }
    out.push_str("\nAnything else is sent to the conversation agent.");
    out
}

#[must_use]
pub fn refreshed(report: &RefreshReport) -> String {
    format!(
        "Directory refreshed: {} entities (generation {}).",
        report.entity_count, report.generation
    )
}

/// Single reply for a dispatch that failed before or instead of execution.
#[must_use]
pub fn failure(reason: &FailureReason, marker: &str) -> String {
    match reason {
        FailureReason::Parse(err) => format!("Could not parse command: {err}."),
        FailureReason::PermissionDenied(err) => {
            format!("Permission denied: you may not run {marker}{}.", err.verb)
        }
        FailureReason::Validation { verb, error } => {
            format!("{error}. Usage: {marker}{}", verb.usage())
        }
        FailureReason::Transport {
            collaborator,
            kind,
        } => format!("Sorry, the {collaborator} is not available ({kind})."),
        FailureReason::ReplyUndeliverable => "Reply could not be delivered.".to_string(),
    }
}
