//! Presentation state for the status badge and report panel

use crate::report::{Report, Verdict};
use colored::{ColoredString, Colorize};
use std::sync::Arc;

/// Hint shown in the panel when no backend URL is configured
pub const CONFIG_HINT: &str = "BACKEND_URL=https://your-backend.example.com";

/// Panel open flag, in-flight flag and the last completed report
#[derive(Debug, Clone, Default)]
pub struct PanelState {
    pub open: bool,
    pub busy: bool,
    pub report: Option<Arc<Report>>,
}

impl PanelState {
    pub fn toggle_open(&mut self) {
        self.open = !self.open;
    }

    /// Enter the busy state; returns false if a run is already in flight
    pub fn start_run(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    /// Swap in the new report and leave the busy state
    pub fn complete_run(&mut self, report: impl Into<Arc<Report>>) {
        self.report = Some(report.into());
        self.busy = false;
    }

    pub fn badge(&self, configured: bool) -> BadgeStatus {
        if !configured {
            return BadgeStatus::Unconfigured;
        }
        match self.report.as_ref().map(|report| report.verdict) {
            Some(Verdict::Ok) => BadgeStatus::Ok,
            Some(Verdict::Fail) => BadgeStatus::Fail,
            None => BadgeStatus::Pending,
        }
    }

    /// Render the badge line and, when open, the panel below it
    pub fn render(&self, configured: bool) -> String {
        let badge = self.badge(configured);
        let mut output = format!("{} {}", badge.dot(), badge.title().dimmed());

        if self.open {
            output.push('\n');
            output.push_str(&self.render_panel(configured));
        }

        output
    }

    fn render_panel(&self, configured: bool) -> String {
        let mut panel = String::new();
        panel.push_str(&format!("{}\n", "DrWeb – diagnostics".bold()));

        let run_label = if self.busy { "Testing…" } else { "Run tests" };
        panel.push_str(&format!(
            "  [r] {}   [c] {}\n",
            control(run_label, configured && !self.busy),
            control("Copy report", self.report.is_some()),
        ));

        if !configured {
            panel.push_str("\nConfigure the backend variable:\n");
            panel.push_str(&format!("  {}\n", CONFIG_HINT));
        }

        panel.push('\n');
        match self.report.as_ref().map(|report| report.to_pretty_json()) {
            Some(Ok(json)) => panel.push_str(&json),
            Some(Err(e)) => panel.push_str(&format!("Report could not be rendered: {}", e)),
            None => panel.push_str("No report – run the tests."),
        }
        panel.push('\n');

        panel
    }
}

fn control(label: &str, enabled: bool) -> ColoredString {
    if enabled { label.normal() } else { label.dimmed() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeStatus {
    Unconfigured,
    Pending,
    Ok,
    Fail,
}

impl BadgeStatus {
    /// Colour of the badge dot
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            BadgeStatus::Ok => (0x16, 0xa3, 0x4a),
            BadgeStatus::Fail => (0xdc, 0x26, 0x26),
            BadgeStatus::Pending | BadgeStatus::Unconfigured => (0x9c, 0xa3, 0xaf),
        }
    }

    /// CSS-style form of [`BadgeStatus::rgb`]
    pub fn color_hex(&self) -> String {
        let (r, g, b) = self.rgb();
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }

    pub fn title(&self) -> &'static str {
        match self {
            BadgeStatus::Unconfigured => "DrWeb: no BACKEND_URL",
            BadgeStatus::Pending => "DrWeb: …",
            BadgeStatus::Ok => "DrWeb: OK",
            BadgeStatus::Fail => "DrWeb: FAIL",
        }
    }

    fn dot(&self) -> ColoredString {
        let (r, g, b) = self.rgb();
        "●".truecolor(r, g, b)
    }
}
