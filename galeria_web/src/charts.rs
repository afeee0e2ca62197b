use galeria::{comparison_charts, ChartBundle, ChartSpec, GaleriaError};
use gloo::console;
use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::HtmlCanvasElement;

use crate::dom;

pub const DATA_ELEMENT_ID: &str = "cmp-data";

fn chart_constructor() -> Option<js_sys::Function> {
    js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str("Chart"))
        .ok()
        .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
}

/// Draw every comparison chart whose canvas exists on the page.
///
/// Returns the number of charts drawn. All failures are logged here.
pub fn render_all() -> usize {
    let Some(chart) = chart_constructor() else {
        console::error!("galeria: Chart.js is not loaded; skipping charts");
        return 0;
    };
    let Some(data_el) = dom::by_id(DATA_ELEMENT_ID) else {
        console::warn!("galeria: #cmp-data not found; nothing to draw");
        return 0;
    };
    let bundle = match ChartBundle::from_json(&dom::text_of(&data_el)) {
        Ok(bundle) => bundle,
        Err(err) => {
            console::error!("galeria: invalid JSON in #cmp-data", err.to_string());
            return 0;
        }
    };
    let specs = match comparison_charts(&bundle) {
        Ok(specs) => specs,
        Err(GaleriaError::EmptyLabels) => {
            console::warn!("galeria: empty labels; no charts drawn");
            return 0;
        }
        Err(err) => {
            console::error!("galeria: chart data rejected", err.to_string());
            return 0;
        }
    };

    let mut drawn = 0;
    for spec in &specs {
        match draw(&chart, spec) {
            Ok(true) => drawn += 1,
            Ok(false) => {}
            Err(err) => console::error!("galeria: failed to draw", spec.canvas_id, err),
        }
    }
    drawn
}

fn draw(chart: &js_sys::Function, spec: &ChartSpec) -> Result<bool, JsValue> {
    let Some(canvas) = dom::by_id(spec.canvas_id)
        .and_then(|el| el.dyn_into::<HtmlCanvasElement>().ok())
    else {
        console::warn!("galeria: missing canvas", spec.canvas_id);
        return Ok(false);
    };
    if canvas.style().get_property_value("height")?.is_empty() {
        canvas.style().set_property("height", "100%")?;
    }
    let Some(ctx) = canvas.get_context("2d")? else {
        return Ok(false);
    };

    let config = spec
        .to_chartjs_config()
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(JsValue::from)?;
    let args = js_sys::Array::of2(&ctx, &config);
    js_sys::Reflect::construct(chart, &args)?;
    Ok(true)
}
