use std::rc::Rc;

use galeria::routes::{CSRF_HEADER, SUBMIT_PATH};
use galeria::submit::NETWORK_ERROR_MESSAGE;
use galeria::{StartedJob, SubmitOutcome, SubmitResponse};
use gloo::console;
use gloo::events::EventListener;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{FormData, HtmlFormElement, HtmlMetaElement, RequestCredentials};

use crate::dom;

pub const BUTTON_ID: &str = "btn-procesar";
pub const FORM_SELECTOR: &str = "#param-form";

pub type StartedHandler = Rc<dyn Fn(StartedJob)>;
pub type Hook = Rc<dyn Fn()>;

/// Click handler for the "process all galleries" button.
#[derive(Clone, Default)]
pub struct Submitter {
    on_started: Option<StartedHandler>,
    open_progress: Option<Hook>,
}

impl Submitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the job when the server keeps processing in the background.
    pub fn on_started(mut self, handler: StartedHandler) -> Self {
        self.on_started = Some(handler);
        self
    }

    /// Called right before the request goes out.
    pub fn open_progress(mut self, hook: Hook) -> Self {
        self.open_progress = Some(hook);
        self
    }

    pub fn bind(self) {
        let Some(button) = dom::by_id(BUTTON_ID) else {
            return;
        };
        EventListener::new_with_options(&button, "click", dom::cancelable(), move |event| {
            event.prevent_default();
            let submitter = self.clone();
            spawn_local(async move { submitter.submit().await });
        })
        .forget();
    }

    async fn submit(&self) {
        if let Some(hook) = &self.open_progress {
            hook();
        }
        match send().await {
            Ok(response) => self.handle(response.outcome()),
            Err(err) => {
                console::error!("galeria: submit failed", err);
                dom::alert(NETWORK_ERROR_MESSAGE);
            }
        }
    }

    fn handle(&self, outcome: SubmitOutcome) {
        match outcome {
            SubmitOutcome::Rejected { message } => dom::alert(&message),
            SubmitOutcome::Completed { results_url } => dom::navigate(&results_url),
            SubmitOutcome::Started(job) => match &self.on_started {
                Some(handler) => handler(job),
                None => console::log!("thread_id:", job.thread_id),
            },
            SubmitOutcome::Untracked => console::warn!("galeria: run accepted without thread_id"),
        }
    }
}

fn csrf_token() -> Option<String> {
    let from_meta = dom::query("meta[name=csrf-token]")
        .and_then(|el| el.dyn_into::<HtmlMetaElement>().ok())
        .map(|meta| meta.content())
        .filter(|v| !v.is_empty());
    from_meta.or_else(|| {
        dom::query("input[name=csrf_token]")
            .and_then(|el| dom::control_value(&el))
            .filter(|v| !v.is_empty())
    })
}

async fn send() -> Result<SubmitResponse, String> {
    let form = dom::query(FORM_SELECTOR).and_then(|el| el.dyn_into::<HtmlFormElement>().ok());
    let body = match form {
        Some(form) => FormData::new_with_form(&form),
        None => FormData::new(),
    }
    .map_err(|e| dom::describe(&e))?;

    let mut request =
        gloo_net::http::Request::post(SUBMIT_PATH).credentials(RequestCredentials::SameOrigin);
    if let Some(token) = csrf_token() {
        request = request.header(CSRF_HEADER, &token);
    }
    let response = request
        .body(body)
        .map_err(|e| e.to_string())?
        .send()
        .await
        .map_err(|e| e.to_string())?;
    response
        .json::<SubmitResponse>()
        .await
        .map_err(|e| e.to_string())
}
