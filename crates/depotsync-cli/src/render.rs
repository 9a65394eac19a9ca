use std::io::IsTerminal;

use anstyle::{AnsiColor, Effects, Style};
use depotsync_installer::{ApplyReport, UpdateCheck};
use depotsync_resolver::RestartReport;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

pub fn current_output_style() -> OutputStyle {
    if std::io::stdout().is_terminal() {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "err" => "[ERR]",
        _ => "[..]",
    }
}

pub fn render_section_header(style: OutputStyle, title: &str) -> Option<String> {
    match style {
        OutputStyle::Plain => None,
        OutputStyle::Rich => Some(colorize(section_style(), &format!("== {title} =="))),
    }
}

pub fn format_check_line(check: &UpdateCheck, style: OutputStyle) -> String {
    let status = if check.needs_update() { "warn" } else { "ok" };
    render_status_line(style, status, &check.summary())
}

pub fn format_apply_lines(
    report: &ApplyReport,
    validated: bool,
    style: OutputStyle,
) -> Vec<String> {
    let mut lines = Vec::new();
    let action = if report.initial_install {
        "initial installation complete"
    } else {
        "update applied"
    };
    lines.push(render_status_line(style, "ok", action));
    if report.recovered {
        lines.push(render_status_line(
            style,
            "warn",
            "recovered from installer state 0x6 by clearing metadata",
        ));
    }
    if validated {
        lines.push(render_status_line(style, "ok", "validation passed"));
    } else {
        lines.push(render_status_line(style, "step", "validation skipped"));
    }
    lines
}

pub fn format_restart_lines(report: &RestartReport, style: OutputStyle) -> Vec<String> {
    if report.units == 0 {
        return vec![render_status_line(
            style,
            "warn",
            "no pods matched the selector, nothing to restart",
        )];
    }

    let mut lines = vec![render_status_line(
        style,
        "step",
        &format!("matched {} pod(s)", report.units),
    )];
    for workload in &report.restarted {
        lines.push(render_status_line(
            style,
            "ok",
            &format!("restarted {workload}"),
        ));
    }
    for (workload, reason) in &report.failed {
        lines.push(render_status_line(
            style,
            "err",
            &format!("failed {workload} (reason={reason})"),
        ));
    }
    for (unit, reason) in &report.unresolved {
        lines.push(render_status_line(
            style,
            "warn",
            &format!("unresolved pod {unit} (reason={reason})"),
        ));
    }
    lines
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
