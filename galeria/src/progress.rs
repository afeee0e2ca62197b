//! Job progress derived from the status endpoint.
//!
//! The server reports progress as free-text log lines. Per-gallery results
//! are announced with `GALERIA_<n>_ROI:<value>` lines and the chosen location
//! with `Mejor comuna encontrada: <n>`. A status payload may also carry the
//! same facts as typed `items` / `best_candidate` fields; those take
//! precedence and the log scan fills in whatever they leave out.
//!
//! [`PollState`] holds the little state that must survive between ticks (how
//! many lines were already shown and which galleries already finished) and
//! turns each snapshot into a [`TickReport`] for the view to render.

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClientConfig;
use crate::routes::results_url;
use crate::{GaleriaError, STATUS_COMPLETED, STATUS_RUNNING};

/// Bar width shown while a gallery has no result yet.
pub const PROCESSING_WIDTH_PERCENT: u32 = 40;

fn result_line() -> &'static Regex {
    static RESULT_RE: OnceLock<Regex> = OnceLock::new();
    RESULT_RE.get_or_init(|| {
        Regex::new(r"(?i)^GALERIA_([0-9]+)_ROI:(-?[0-9]+(?:\.[0-9]+)?)")
            .expect("result line regex compiles")
    })
}

fn best_line() -> &'static Regex {
    static BEST_RE: OnceLock<Regex> = OnceLock::new();
    BEST_RE.get_or_init(|| {
        Regex::new(r"(?i)Mejor comuna encontrada:\s*([0-9]+)").expect("best line regex compiles")
    })
}

/// Facts extracted from a log history.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LogScan {
    /// Latest announced result per gallery number.
    pub results: BTreeMap<u32, f64>,
    /// Gallery announced by the last "best" line.
    pub best_candidate: Option<u32>,
}

/// Scan the whole log history. Pure: the same lines always give the same scan.
pub fn scan_logs<S: AsRef<str>>(logs: &[S]) -> LogScan {
    let mut scan = LogScan::default();
    for line in logs {
        let line = line.as_ref();
        if let Some(caps) = result_line().captures(line) {
            if let (Ok(item), Ok(value)) = (caps[1].parse::<u32>(), caps[2].parse::<f64>()) {
                scan.results.insert(item, value);
            }
        }
    }
    scan.best_candidate = logs.iter().rev().find_map(|line| {
        best_line()
            .captures(line.as_ref())
            .and_then(|caps| caps[1].parse::<u32>().ok())
    });
    scan
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ItemResult {
    pub item: u32,
    pub result: f64,
}

/// One response of the status endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    #[serde(default)]
    pub logs: Option<Vec<String>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub has_results: Option<bool>,
    #[serde(default)]
    pub items: Option<Vec<ItemResult>>,
    #[serde(default)]
    pub best_candidate: Option<u32>,
}

impl StatusSnapshot {
    pub fn logs(&self) -> &[String] {
        self.logs.as_deref().unwrap_or_default()
    }

    pub fn status(&self) -> &str {
        self.status
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(STATUS_RUNNING)
    }

    pub fn is_completed(&self) -> bool {
        self.status() == STATUS_COMPLETED
    }

    pub fn is_finished(&self) -> bool {
        self.is_completed() || self.has_results.unwrap_or(false)
    }

    /// Typed fields first, log scan for anything they do not cover.
    pub fn scan(&self) -> LogScan {
        let mut scan = scan_logs(self.logs());
        if let Some(items) = self.items.as_ref() {
            for item in items {
                if item.result.is_finite() {
                    scan.results.insert(item.item, item.result);
                }
            }
        }
        if self.best_candidate.is_some() {
            scan.best_candidate = self.best_candidate;
        }
        scan
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ItemBar {
    Processing,
    Completed { result: f64 },
}

impl ItemBar {
    pub fn is_completed(&self) -> bool {
        matches!(self, ItemBar::Completed { .. })
    }

    pub fn width_percent(&self) -> u32 {
        match self {
            ItemBar::Processing => PROCESSING_WIDTH_PERCENT,
            ItemBar::Completed { .. } => 100,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ItemBar::Processing => "Procesando…",
            ItemBar::Completed { .. } => "Completado",
        }
    }

    pub fn result_text(&self) -> Option<String> {
        match self {
            ItemBar::Processing => None,
            ItemBar::Completed { result } => Some(format!("{result:.2}%")),
        }
    }
}

pub fn best_candidate_message(candidate: u32) -> String {
    format!("Mejor comuna: {candidate} — la nueva galería se optimizó para esta comuna.")
}

/// Everything the view needs to render one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    pub status: String,
    pub status_completed: bool,
    /// Lines not shown before this tick.
    pub new_lines: Vec<String>,
    /// `(gallery number, bar)` for galleries `1..=total_items`.
    pub bars: Vec<(u32, ItemBar)>,
    /// Galleries that finished for the first time on this tick.
    pub newly_completed: Vec<u32>,
    pub overall_percent: u32,
    pub best_candidate: Option<u32>,
    pub finished: bool,
}

/// What the loop does after rendering a tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NextStep {
    PollAgain { after: Duration },
    Navigate { url: String, after: Duration },
}

impl TickReport {
    pub fn next_step(
        &self,
        config: &ClientConfig,
        results_base: &str,
        run_id: Option<&str>,
    ) -> NextStep {
        if self.finished {
            NextStep::Navigate {
                url: results_url(results_base, run_id.unwrap_or_default()),
                after: config.redirect_delay(),
            }
        } else {
            NextStep::PollAgain {
                after: config.poll_interval(),
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct PollState {
    total_items: u32,
    seen_lines: usize,
    completed: BTreeMap<u32, f64>,
    consecutive_errors: u32,
}

impl PollState {
    pub fn new(total_items: u32) -> Self {
        Self {
            total_items: total_items.max(1),
            seen_lines: 0,
            completed: BTreeMap::new(),
            consecutive_errors: 0,
        }
    }

    pub fn total_items(&self) -> u32 {
        self.total_items
    }

    pub fn seen_lines(&self) -> usize {
        self.seen_lines
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn overall_percent(&self) -> u32 {
        let pct = (100.0 * self.completed.len() as f64 / self.total_items as f64).round();
        pct.min(100.0) as u32
    }

    /// Forget shown lines so the next tick replays the full history.
    pub fn reset_log_view(&mut self) {
        self.seen_lines = 0;
    }

    /// Fold one successful status response into the state.
    pub fn apply(&mut self, snapshot: &StatusSnapshot) -> TickReport {
        self.consecutive_errors = 0;

        let logs = snapshot.logs();
        let new_lines = if logs.len() > self.seen_lines {
            let fresh = logs[self.seen_lines..].to_vec();
            self.seen_lines = logs.len();
            fresh
        } else {
            Vec::new()
        };

        let scan = snapshot.scan();
        let mut bars = Vec::with_capacity(self.total_items as usize);
        let mut newly_completed = Vec::new();
        for item in 1..=self.total_items {
            let bar = match scan.results.get(&item) {
                Some(&result) => {
                    if self.completed.insert(item, result).is_none() {
                        newly_completed.push(item);
                    }
                    ItemBar::Completed { result }
                }
                // Completion is sticky: keep the last known result.
                None => match self.completed.get(&item) {
                    Some(&result) => ItemBar::Completed { result },
                    None => ItemBar::Processing,
                },
            };
            bars.push((item, bar));
        }

        let report = TickReport {
            status: snapshot.status().to_string(),
            status_completed: snapshot.is_completed(),
            new_lines,
            bars,
            newly_completed,
            overall_percent: self.overall_percent(),
            best_candidate: scan.best_candidate,
            finished: snapshot.is_finished(),
        };
        debug!(
            status = %report.status,
            new_lines = report.new_lines.len(),
            completed = self.completed.len(),
            overall = report.overall_percent,
            finished = report.finished,
            "status tick applied"
        );
        report
    }

    /// Count a failed tick. Errors once `limit` failures happened in a row.
    pub fn record_error(&mut self, limit: Option<u32>) -> Result<u32, GaleriaError> {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        match limit {
            Some(max) if self.consecutive_errors >= max => {
                Err(GaleriaError::PollGaveUp(self.consecutive_errors))
            }
            _ => Ok(self.consecutive_errors),
        }
    }
}
