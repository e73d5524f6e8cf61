//! Text rendering for read command output

use std::fmt::Write;

use colored::Colorize;
use perryclient::patient::sort_by_schedule;
use perryclient::{
    CpcDashboard, Health, Patient, PatientSchedule, PatientStatus, Reminder, ReminderStatus, ReminderType,
    UpcomingReminders, UploadResult,
};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// "N of M reminders completed (P%)"
pub fn completion_summary(completed: u32, total: u32) -> String {
    let percent = if total == 0 {
        0
    } else {
        (completed as u64 * 100 / total as u64) as u32
    };
    format!("{} of {} reminders completed ({}%)", completed, total, percent)
}

fn kind_label(kind: ReminderType) -> &'static str {
    match kind {
        ReminderType::Medication => "medication",
        ReminderType::Fasting => "fasting",
        ReminderType::Bathing => "bathing",
        ReminderType::SubstanceUse => "substance use",
        ReminderType::Unknown => "other",
    }
}

fn status_marker(status: ReminderStatus) -> colored::ColoredString {
    match status {
        ReminderStatus::Completed => "[x]".green(),
        ReminderStatus::Missed => "[!]".red(),
        ReminderStatus::Sent => "[>]".yellow(),
        ReminderStatus::Pending | ReminderStatus::Unknown => "[ ]".normal(),
    }
}

fn reminder_line(reminder: &Reminder) -> String {
    let when = reminder
        .scheduled_at()
        .map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| "unscheduled".to_string());
    let mut line = format!(
        "  {} {:<16}  {:<13}  {}",
        status_marker(reminder.status),
        when,
        kind_label(reminder.kind),
        reminder.label()
    );
    if let Some(notes) = reminder.notes.as_deref().filter(|n| !n.is_empty()) {
        let _ = write!(line, "\n      {}", notes.dimmed());
    }
    line
}

fn reminder_lines(reminders: &[Reminder]) -> Vec<String> {
    let mut sorted = reminders.to_vec();
    sort_by_schedule(&mut sorted);
    sorted.iter().map(reminder_line).collect()
}

/// Full schedule: surgery date, completion summary, reminders in time order
pub fn render_schedule(schedule: &PatientSchedule) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", "Schedule for patient".bright_cyan(), schedule.patient_id.bold());
    if let Some(surgery) = schedule.surgery_at() {
        let _ = writeln!(out, "Surgery: {}", surgery.format(TIME_FORMAT));
    }

    let total = if schedule.total_reminders == 0 {
        schedule.reminders.len() as u32
    } else {
        schedule.total_reminders
    };
    let _ = writeln!(out, "{}", completion_summary(schedule.completed_reminders, total));
    if schedule.is_optimized {
        let _ = writeln!(out, "{}", "Patient is optimized for surgery".green());
    }

    if schedule.reminders.is_empty() {
        let _ = writeln!(out, "{}", "No reminders scheduled.".dimmed());
    } else {
        out.push('\n');
        for line in reminder_lines(&schedule.reminders) {
            let _ = writeln!(out, "{}", line);
        }
    }
    out
}

/// Reminders due within the look-ahead window
pub fn render_upcoming(upcoming: &UpcomingReminders) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} reminder(s) due in the next {} hours",
        upcoming.count(),
        upcoming.hours_ahead
    );
    for line in reminder_lines(&upcoming.reminders) {
        let _ = writeln!(out, "{}", line);
    }
    out
}

/// Optimization status summary
pub fn render_status(status: &PatientStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", "Status for patient".bright_cyan(), status.patient_id.bold());
    let _ = writeln!(out, "{}", completion_summary(status.completed_reminders, status.total_reminders));
    if status.missed_reminders > 0 {
        let _ = writeln!(out, "{}", format!("{} missed", status.missed_reminders).red());
    }
    let verdict = if status.is_optimized {
        "optimized".green()
    } else if status.needs_reschedule {
        "needs reschedule".red()
    } else {
        "in progress".yellow()
    };
    let _ = writeln!(out, "Optimization: {}", verdict);
    out
}

/// CPC patient list
pub fn render_patients(patients: &[Patient]) -> String {
    if patients.is_empty() {
        return format!("{}\n", "No patients.".dimmed());
    }
    let mut out = String::new();
    for patient in patients {
        let _ = write!(out, "{:<24} {:<28} {}", patient.id, patient.name, patient.email.dimmed());
        if let Some(condition) = patient.condition.as_deref().filter(|c| !c.is_empty()) {
            let _ = write!(out, "  ({})", condition);
        }
        out.push('\n');
    }
    out
}

/// CPC dashboard counters
pub fn render_dashboard(dashboard: &CpcDashboard) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "CPC Dashboard".bright_cyan());
    let _ = writeln!(out, "  {:<18} {}", "Patients:", dashboard.total_patients);
    let _ = writeln!(out, "  {:<18} {}", "Pending reports:", dashboard.pending_reports);
    let _ = writeln!(out, "  {:<18} {}", "Processed reports:", dashboard.processed_reports);
    let _ = writeln!(out, "  {:<18} {}", "Reminders:", dashboard.total_reminders);
    out
}

pub fn render_health(health: &Health) -> String {
    let status = if health.status == "healthy" {
        health.status.green()
    } else {
        health.status.yellow()
    };
    format!("Backend: {}\n", status)
}

pub fn render_upload(result: &UploadResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Session: {}", result.session_id.as_str().bold());
    if !result.message.is_empty() {
        let _ = writeln!(out, "{}", result.message);
    }
    for file in &result.files_uploaded {
        let _ = writeln!(out, "  {}", file.dimmed());
    }
    out
}
