//! Progress modal: polls the run's status endpoint once per interval and
//! mirrors it into the status badge, log dock and per-gallery bars.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use galeria::coerce::parse_int;
use galeria::progress::best_candidate_message;
use galeria::routes::{status_path, RESULTS_PATH};
use galeria::{ClientConfig, ItemBar, NextStep, PollState, StatusSnapshot, TickReport};
use gloo::console;
use gloo::events::EventListener;
use gloo::timers::future::TimeoutFuture;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, HtmlElement};

use crate::dom;

/// Everything needed to follow one run.
#[derive(Clone, Debug)]
pub struct PollJob {
    pub thread_id: String,
    pub run_id: Option<String>,
    pub results_url: String,
    pub config: ClientConfig,
}

impl PollJob {
    pub fn new(thread_id: String, run_id: Option<String>) -> Self {
        Self {
            thread_id,
            run_id,
            results_url: RESULTS_PATH.to_string(),
            config: ClientConfig::default(),
        }
    }

    /// Build a job from `data-*` attributes; blank values count as missing.
    pub fn from_attributes<F>(attr: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| attr(name).filter(|v| !v.trim().is_empty());
        let mut config = ClientConfig::default();
        if let Some(total) = read("data-total-galleries").and_then(|v| parse_int(&v)) {
            config.total_items = total.clamp(1, u32::MAX as i64) as u32;
        }
        if let Some(max) = read("data-max-errors").and_then(|v| parse_int(&v)) {
            if max > 0 {
                config.max_consecutive_errors = Some(max.min(u32::MAX as i64) as u32);
            }
        }
        let results_url = read("data-results-url").unwrap_or_else(|| RESULTS_PATH.to_string());
        config.results_path = results_url.clone();

        Self {
            thread_id: read("data-thread-id").unwrap_or_default(),
            run_id: read("data-run-id"),
            results_url,
            config,
        }
    }

    /// Same page settings, different run.
    pub fn with_ids(mut self, thread_id: String, run_id: Option<String>) -> Self {
        self.thread_id = thread_id;
        self.run_id = run_id.filter(|r| !r.is_empty());
        self
    }

    pub fn has_thread(&self) -> bool {
        !self.thread_id.is_empty()
    }

    /// The run announced by the page itself. `None` unless the progress modal
    /// is present and a thread id is known (data attribute or `?thread_id=`).
    pub fn from_page() -> Option<Self> {
        dom::by_id("progressModal")?;
        let data = dom::by_id("progressData")?;
        let mut job = Self::from_attributes(|name| data.get_attribute(name));
        if !job.has_thread() {
            job.thread_id = dom::query_param("thread_id").unwrap_or_default();
        }
        job.has_thread().then_some(job)
    }

    /// Job for a run started from this page: page settings from
    /// `#progressData` when present, ids from the submission.
    pub fn handoff(thread_id: String, run_id: Option<String>) -> Self {
        match dom::by_id("progressData") {
            Some(data) => Self::from_attributes(|name| data.get_attribute(name)),
            None => Self::new(String::new(), None),
        }
        .with_ids(thread_id, run_id)
    }
}

struct ProgressView {
    status_badge: Option<Element>,
    log_pre: Option<HtmlElement>,
    overall_bar: Option<HtmlElement>,
    final_message: Option<HtmlElement>,
    best_info: Option<HtmlElement>,
    best_text: Option<Element>,
}

impl ProgressView {
    fn from_page() -> Self {
        Self {
            status_badge: dom::by_id("execStatus"),
            log_pre: dom::html_by_id("logPre"),
            overall_bar: dom::html_by_id("overallProgress"),
            final_message: dom::html_by_id("finalMessage"),
            best_info: dom::html_by_id("bestComunaInfo"),
            best_text: dom::by_id("bestComunaText"),
        }
    }

    fn render(&self, report: &TickReport) {
        if let Some(badge) = &self.status_badge {
            dom::set_text(badge, &report.status);
            dom::set_class(badge, "bg-success", report.status_completed);
            dom::set_class(badge, "bg-secondary", !report.status_completed);
        }

        if let Some(pre) = &self.log_pre {
            if !report.new_lines.is_empty() {
                let mut text = dom::text_of(pre);
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&report.new_lines.join("\n"));
                pre.set_text_content(Some(&text));
                pre.set_scroll_top(pre.scroll_height());
            }
        }

        for (item, bar) in &report.bars {
            render_bar(*item, bar);
        }

        if let Some(overall) = &self.overall_bar {
            let pct = format!("{}%", report.overall_percent);
            dom::set_style(overall, "width", &pct);
            dom::set_text(overall, &pct);
        }

        if let (Some(best), Some(info), Some(text)) =
            (report.best_candidate, &self.best_info, &self.best_text)
        {
            dom::set_text(text, &best_candidate_message(best));
            dom::show(info);
        }
    }

    fn show_dock(&self) {
        if let Some(dock) = dom::html_by_id("logsDock") {
            dom::show(&dock);
        }
    }

    fn clear_logs(&self) {
        if let Some(pre) = &self.log_pre {
            pre.set_text_content(Some(""));
        }
    }

    fn show_final(&self) {
        if let Some(msg) = &self.final_message {
            dom::show(msg);
        }
    }

    fn show_failure(&self, message: &str) {
        if let Some(badge) = &self.status_badge {
            dom::set_text(badge, message);
            dom::set_class(badge, "bg-secondary", false);
            dom::set_class(badge, "bg-danger", true);
        }
    }
}

fn render_bar(item: u32, bar: &ItemBar) {
    let (Some(el), Some(label)) = (
        dom::html_by_id(&format!("progress-{item}")),
        dom::by_id(&format!("progress-text-{item}")),
    ) else {
        return;
    };
    dom::set_style(&el, "width", &format!("{}%", bar.width_percent()));
    dom::set_text(&label, bar.label());
    match bar {
        ItemBar::Completed { .. } => {
            dom::set_class(&el, "bg-success", true);
            dom::set_class(&el, "progress-bar-animated", false);
            if let (Some(roi), Some(text)) = (dom::by_id(&format!("roi-{item}")), bar.result_text()) {
                dom::set_text(&roi, &text);
            }
        }
        ItemBar::Processing => dom::set_class(&el, "progress-bar-animated", true),
    }
}

async fn sleep(duration: Duration) {
    let ms = duration.as_millis().min(u32::MAX as u128) as u32;
    TimeoutFuture::new(ms).await;
}

async fn fetch_status(url: &str) -> Result<StatusSnapshot, gloo_net::Error> {
    gloo_net::http::Request::get(url)
        .send()
        .await?
        .json::<StatusSnapshot>()
        .await
}

/// The page's single progress loop. Starting a new job supersedes the one
/// being followed, so at most one loop writes to the modal.
#[derive(Clone)]
pub struct Poller {
    inner: Rc<PollerInner>,
}

struct PollerInner {
    view: ProgressView,
    state: RefCell<PollState>,
    generation: Cell<u64>,
}

impl Poller {
    pub fn new() -> Self {
        let inner = Rc::new(PollerInner {
            view: ProgressView::from_page(),
            state: RefCell::new(PollState::new(ClientConfig::default().total_items)),
            generation: Cell::new(0),
        });

        if let Some(button) = dom::by_id("clearLogs") {
            let inner = inner.clone();
            EventListener::new(&button, "click", move |_| {
                inner.view.clear_logs();
                inner.state.borrow_mut().reset_log_view();
            })
            .forget();
        }
        Self { inner }
    }

    /// Follow `job`. Ticks never overlap: the next request is scheduled only
    /// after the previous one settled.
    pub fn start(&self, job: PollJob) {
        if !job.has_thread() {
            console::warn!("galeria: no thread id to poll");
            return;
        }
        let generation = self.inner.generation.get() + 1;
        self.inner.generation.set(generation);
        *self.inner.state.borrow_mut() = PollState::new(job.config.total_items);
        self.inner.view.show_dock();
        spawn_local(run(job, self.inner.clone(), generation));
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

async fn run(job: PollJob, poller: Rc<PollerInner>, generation: u64) {
    let current = || poller.generation.get() == generation;
    let url = status_path(&job.thread_id);
    console::log!("galeria: polling", url.clone());
    loop {
        let fetched = fetch_status(&url).await;
        if !current() {
            return;
        }
        let step = match fetched {
            Ok(snapshot) => {
                let report = poller.state.borrow_mut().apply(&snapshot);
                poller.view.render(&report);
                report.next_step(&job.config, &job.results_url, job.run_id.as_deref())
            }
            Err(err) => {
                console::error!("Polling error:", err.to_string());
                let recorded = poller
                    .state
                    .borrow_mut()
                    .record_error(job.config.max_consecutive_errors);
                if let Err(gave_up) = recorded {
                    poller.view.show_failure(&gave_up.to_string());
                    return;
                }
                NextStep::PollAgain {
                    after: job.config.poll_interval(),
                }
            }
        };
        match step {
            NextStep::PollAgain { after } => sleep(after).await,
            NextStep::Navigate { url, after } => {
                poller.view.show_final();
                sleep(after).await;
                if current() {
                    dom::navigate(&url);
                }
                return;
            }
        }
        if !current() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn attrs(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn page_attributes_configure_the_job() {
        let job = PollJob::from_attributes(attrs(&[
            ("data-thread-id", "t-7"),
            ("data-run-id", "r-1"),
            ("data-results-url", "/resultados/comparar"),
            ("data-total-galleries", "5"),
            ("data-max-errors", "3"),
        ]));
        assert_eq!(job.thread_id, "t-7");
        assert_eq!(job.run_id.as_deref(), Some("r-1"));
        assert_eq!(job.results_url, "/resultados/comparar");
        assert_eq!(job.config.results_path, "/resultados/comparar");
        assert_eq!(job.config.total_items, 5);
        assert_eq!(job.config.max_consecutive_errors, Some(3));
    }

    #[test]
    fn blank_or_bad_attributes_fall_back_to_defaults() {
        let job = PollJob::from_attributes(attrs(&[
            ("data-thread-id", "  "),
            ("data-run-id", ""),
            ("data-total-galleries", "x"),
            ("data-max-errors", "0"),
        ]));
        assert!(!job.has_thread());
        assert_eq!(job.run_id, None);
        assert_eq!(job.results_url, RESULTS_PATH);
        assert_eq!(job.config, ClientConfig::default());
    }

    #[test]
    fn handoff_keeps_page_settings_and_replaces_ids() {
        let page = PollJob::from_attributes(attrs(&[
            ("data-thread-id", "stale"),
            ("data-run-id", "old-run"),
            ("data-total-galleries", "4"),
            ("data-max-errors", "2"),
        ]));
        let job = page.with_ids("fresh".to_string(), Some(String::new()));
        assert_eq!(job.thread_id, "fresh");
        assert_eq!(job.run_id, None);
        assert_eq!(job.config.total_items, 4);
        assert_eq!(job.config.max_consecutive_errors, Some(2));
    }
}
