//! Browser glue for the gallery optimization pages.
//!
//! One wasm module serves every page; each feature binds only when its
//! elements are present:
//! - `#cmp-data` on the results page → comparison charts,
//! - `#parametrosForm` → weight/slot validation on submit,
//! - `#btn-procesar` → asynchronous job submission,
//! - `#progressModal` + `#progressData` → status polling.

mod charts;
mod dom;
mod form;
mod poller;
mod submit;

use std::cell::RefCell;
use std::rc::Rc;

use galeria::StartedJob;
use gloo::events::EventListener;
use wasm_bindgen::prelude::*;

pub use poller::{PollJob, Poller};
pub use submit::Submitter;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

thread_local! {
    static PAGE_POLLER: RefCell<Option<Poller>> = const { RefCell::new(None) };
}

/// The one poller bound to this page, created on first use.
fn page_poller() -> Poller {
    PAGE_POLLER.with(|slot| slot.borrow_mut().get_or_insert_with(Poller::new).clone())
}

fn bind_page() {
    form::bind();

    Submitter::new()
        .open_progress(Rc::new(|| {
            if let Some(modal) = dom::html_by_id("progressModal") {
                dom::show(&modal);
            }
        }))
        .on_started(Rc::new(|job: StartedJob| {
            page_poller().start(PollJob::handoff(job.thread_id, job.run_id));
        }))
        .bind();

    if let Some(job) = PollJob::from_page() {
        page_poller().start(job);
    }

    if dom::by_id(charts::DATA_ELEMENT_ID).is_some() {
        charts::render_all();
    }
}

/// Draw the comparison charts on demand; returns how many were drawn.
#[wasm_bindgen]
pub fn render_comparison_charts() -> usize {
    charts::render_all()
}

/// Follow a run that was started elsewhere on the page.
#[wasm_bindgen]
pub fn start_polling(thread_id: String, run_id: Option<String>) {
    page_poller().start(PollJob::handoff(thread_id, run_id));
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    gloo::console::log!("galeria_web", APP_VERSION);

    let Some(document) = dom::document() else {
        return;
    };
    if document.ready_state() == "loading" {
        EventListener::once(&document, "DOMContentLoaded", |_| bind_page()).forget();
    } else {
        bind_page();
    }
}
