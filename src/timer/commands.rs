use std::str::FromStr;

use chrono::{DateTime, Local, Utc};

use crate::{
    alerts::{ManualOutcome, Priority},
    analytics::{format_duration, summarize},
    sensing::parse_presence_token,
};

use super::{TrackerController, TrackerSnapshot};

/// One line of the host protocol read from stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Presence(bool),
    Hide,
    Show,
    Monitor(bool),
    Detect(bool),
    Alert(Priority),
    Status,
    Sessions,
    Stats,
    Clear,
    Quit,
}

impl FromStr for HostCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Err("empty command".into());
        };
        let arg = parts.next();

        let command = match (verb.to_ascii_lowercase().as_str(), arg) {
            ("present", None) => HostCommand::Presence(true),
            ("absent", None) => HostCommand::Presence(false),
            // Anything unrecognised after `sample` reads as absent.
            ("sample", token) => HostCommand::Presence(token.map(parse_presence_token).unwrap_or(false)),
            ("hide", None) => HostCommand::Hide,
            ("show", None) => HostCommand::Show,
            ("monitor", Some(value)) => HostCommand::Monitor(parse_switch(value)?),
            ("detect", Some(value)) => HostCommand::Detect(parse_switch(value)?),
            ("alert", Some("low")) => HostCommand::Alert(Priority::Low),
            ("alert", Some("high")) => HostCommand::Alert(Priority::High),
            ("status", None) => HostCommand::Status,
            ("sessions", None) => HostCommand::Sessions,
            ("stats", None) => HostCommand::Stats,
            ("clear", None) => HostCommand::Clear,
            ("quit" | "exit", None) => HostCommand::Quit,
            _ => return Err(format!("unrecognised command: {}", line.trim())),
        };
        Ok(command)
    }
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value {
        "on" => Ok(true),
        "off" => Ok(false),
        other => Err(format!("expected on|off, got {other}")),
    }
}

/// Run one command against the tracker and render a one-line reply.
/// `Quit` is left to the caller.
pub async fn execute(
    controller: &TrackerController,
    command: HostCommand,
    now: DateTime<Utc>,
) -> Result<String, String> {
    match command {
        HostCommand::Presence(present) => {
            controller
                .presence(present, now)
                .map_err(|e| e.to_string())?;
            Ok(if present { "present" } else { "absent" }.to_string())
        }
        HostCommand::Hide => {
            controller.suspend(now).map_err(|e| e.to_string())?;
            Ok("suspended".into())
        }
        HostCommand::Show => {
            controller.resume(now).map_err(|e| e.to_string())?;
            Ok("resumed".into())
        }
        HostCommand::Monitor(active) => {
            controller
                .set_monitoring(active, now)
                .map_err(|e| e.to_string())?;
            Ok(format!("monitoring {}", on_off(active)))
        }
        HostCommand::Detect(active) => {
            controller
                .set_detection(active, now)
                .map_err(|e| e.to_string())?;
            Ok(format!("detection {}", on_off(active)))
        }
        HostCommand::Alert(priority) => {
            let outcome = controller
                .trigger_manual(priority, now)
                .await
                .map_err(|e| e.to_string())?;
            Ok(match outcome {
                ManualOutcome::Fired(alert) => format!(
                    "alert sent ({}): {}{}",
                    alert.priority.as_str(),
                    alert.title,
                    if alert.notified { "" } else { " [sound only]" }
                ),
                ManualOutcome::CoolingDown { remaining_secs } => {
                    format!("alert cooling down, {} left", format_duration(remaining_secs))
                }
            })
        }
        HostCommand::Status => {
            let snapshot = snapshot(controller).await?;
            Ok(render_status(&snapshot))
        }
        HostCommand::Sessions => {
            let snapshot = snapshot(controller).await?;
            if snapshot.sessions.is_empty() {
                return Ok("no sessions".into());
            }
            let lines: Vec<String> = snapshot
                .sessions
                .iter()
                .map(|s| {
                    let badge = s.health_badge();
                    format!(
                        "#{} {} {} ({}{})",
                        s.id,
                        s.started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                        format_duration(s.duration_secs),
                        badge.as_str(),
                        if badge.suggests_break() { ", break due" } else { "" }
                    )
                })
                .collect();
            Ok(lines.join("\n"))
        }
        HostCommand::Stats => {
            let snapshot = snapshot(controller).await?;
            let mut sessions = snapshot.sessions.clone();
            sessions.reverse();
            let summary = summarize(&sessions, snapshot.state.elapsed_secs, &Local);
            Ok(format!(
                "sessions={} total={} average={} longest={}",
                summary.total_sessions,
                format_duration(summary.total_secs),
                format_duration(summary.average_secs),
                format_duration(summary.longest_secs)
            ))
        }
        HostCommand::Clear => {
            controller.clear_history().map_err(|e| e.to_string())?;
            Ok("history cleared".into())
        }
        HostCommand::Quit => Ok("bye".into()),
    }
}

async fn snapshot(controller: &TrackerController) -> Result<TrackerSnapshot, String> {
    controller.snapshot().await.map_err(|e| e.to_string())
}

fn render_status(snapshot: &TrackerSnapshot) -> String {
    let state = &snapshot.state;
    let phase = if state.is_active() {
        format!("active {}", format_duration(state.elapsed_secs))
    } else {
        "idle".to_string()
    };
    format!(
        "{phase}; monitoring {}; detection {}{}; {} sessions; {} duplicates suppressed",
        on_off(state.monitoring_active),
        on_off(state.detection_active),
        if state.is_suspended() { "; suspended" } else { "" },
        snapshot.sessions.len(),
        snapshot.suppressed_duplicates
    )
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
