use galeria::form::{slot_field_ids, WEIGHT_FIELD_IDS};
use galeria::{ParamForm, SlotFields, WeightFields, SLOT_COUNT};
use gloo::events::EventListener;
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlButtonElement};

use crate::dom;

pub const FORM_ID: &str = "parametrosForm";
const BUSY_LABEL: &str = r#"<span class="spinner-border spinner-border-sm" role="status" aria-hidden="true"></span> Iniciando procesamiento..."#;

/// Snapshot of the parameter inputs currently on the page.
pub fn read_form() -> ParamForm {
    let field = |id: &str| dom::field_value(id).unwrap_or_default();
    let weights = WeightFields {
        social: field(WEIGHT_FIELD_IDS[0]),
        economic: field(WEIGHT_FIELD_IDS[1]),
        municipal: field(WEIGHT_FIELD_IDS[2]),
    };
    let slots = (1..=SLOT_COUNT)
        .map(|slot| {
            let [lot, primary, secondary] = slot_field_ids(slot);
            SlotFields {
                lot_size: field(&lot),
                primary_count: field(&primary),
                secondary_count: field(&secondary),
            }
        })
        .collect();
    ParamForm { weights, slots }
}

/// Validate the parameter form on submit; lets the browser post it when valid.
pub fn bind() {
    let Some(form) = dom::by_id(FORM_ID) else {
        return;
    };
    let target = form.clone();
    EventListener::new_with_options(&target, "submit", dom::cancelable(), move |event| {
        if let Err(err) = read_form().validate() {
            event.prevent_default();
            dom::alert(&err.to_string());
            return;
        }
        mark_busy(&form);
    })
    .forget();
}

fn mark_busy(form: &Element) {
    let button = form
        .query_selector(r#"button[type="submit"]"#)
        .ok()
        .flatten()
        .and_then(|el| el.dyn_into::<HtmlButtonElement>().ok());
    if let Some(button) = button {
        button.set_disabled(true);
        button.set_inner_html(BUSY_LABEL);
    }
}
