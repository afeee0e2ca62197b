// Small DOM helpers. Every lookup is optional: a missing element means the
// feature it backs is skipped, never an error.

use gloo::events::{EventListenerOptions, EventListenerPhase};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    Document, Element, HtmlElement, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement, Window,
};

pub fn window() -> Option<Window> {
    web_sys::window()
}

pub fn document() -> Option<Document> {
    window().and_then(|w| w.document())
}

pub fn by_id(id: &str) -> Option<Element> {
    document().and_then(|d| d.get_element_by_id(id))
}

pub fn html_by_id(id: &str) -> Option<HtmlElement> {
    by_id(id).and_then(|el| el.dyn_into::<HtmlElement>().ok())
}

pub fn query(selector: &str) -> Option<Element> {
    document().and_then(|d| d.query_selector(selector).ok().flatten())
}

/// Current value of a form control, `None` when the element is missing.
pub fn control_value(element: &Element) -> Option<String> {
    if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
        return Some(input.value());
    }
    if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
        return Some(select.value());
    }
    if let Some(area) = element.dyn_ref::<HtmlTextAreaElement>() {
        return Some(area.value());
    }
    element.get_attribute("value")
}

pub fn field_value(id: &str) -> Option<String> {
    by_id(id).and_then(|el| control_value(&el))
}

pub fn set_text(element: &Element, text: &str) {
    element.set_text_content(Some(text));
}

pub fn text_of(element: &Element) -> String {
    element.text_content().unwrap_or_default()
}

pub fn set_style(element: &HtmlElement, property: &str, value: &str) {
    let _ = element.style().set_property(property, value);
}

pub fn show(element: &HtmlElement) {
    set_style(element, "display", "block");
}

pub fn set_class(element: &Element, class: &str, on: bool) {
    let list = element.class_list();
    let _ = if on { list.add_1(class) } else { list.remove_1(class) };
}

pub fn alert(message: &str) {
    if let Some(w) = window() {
        let _ = w.alert_with_message(message);
    }
}

pub fn navigate(url: &str) {
    if let Some(w) = window() {
        if let Err(err) = w.location().set_href(url) {
            gloo::console::error!("navigation failed", err);
        }
    }
}

/// Value of `name` in the page's query string.
pub fn query_param(name: &str) -> Option<String> {
    let search = window()?.location().search().ok()?;
    web_sys::UrlSearchParams::new_with_str(&search).ok()?.get(name)
}

/// Listener options for handlers that call `prevent_default`; gloo's default
/// registration is passive and would ignore it.
pub fn cancelable() -> EventListenerOptions {
    EventListenerOptions {
        phase: EventListenerPhase::Bubble,
        passive: false,
    }
}

pub fn describe(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelable_listeners_are_not_passive() {
        let options = cancelable();
        assert!(!options.passive);
        assert!(matches!(options.phase, EventListenerPhase::Bubble));
        assert!(EventListenerOptions::default().passive);
    }
}
