use wasm_bindgen::prelude::*;

mod dom;

pub use dom::{Location, Page};

/// Runs once the module is instantiated, which the home page does after its
/// markup is in place.
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    wasm_logger::init(wasm_logger::Config::default());

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("window is unavailable"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("document is unavailable"))?;

    let page = Page::new(document);
    let location = Location::new(window.location());

    let bindings =
        binder::bind(&page, &location).map_err(|e| JsValue::from_str(&e.to_string()))?;

    log::info!("bound {}", bindings.ids().collect::<Vec<_>>().join(", "));

    // Listeners live as long as the page does.
    for listener in bindings.into_listeners() {
        listener.forget();
    }

    Ok(())
}
