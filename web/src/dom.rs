use binder::{BindError, Handler};
use gloo::events::EventListener;
use wasm_bindgen::JsCast;
use web_sys::HtmlElement;

#[derive(Clone)]
pub struct Page {
    document: web_sys::Document,
}

impl Page {
    pub fn new(document: web_sys::Document) -> Self {
        Self { document }
    }
}

impl binder::Document for Page {
    type Element = Node;

    fn element_by_id(&self, id: &str) -> Option<Self::Element> {
        let element = self.document.get_element_by_id(id)?;

        match element.dyn_into::<HtmlElement>() {
            Ok(element) => Some(Node {
                id: id.to_owned(),
                element,
            }),
            Err(_) => {
                log::warn!("{}: not an html element", id);
                None
            }
        }
    }
}

pub struct Node {
    id: String,
    element: HtmlElement,
}

impl binder::Element for Node {
    type Listener = EventListener;

    fn set_display(&self, value: &str) -> Result<(), BindError> {
        self.element
            .style()
            .set_property("display", value)
            .map_err(|e| BindError::Style {
                id: self.id.clone(),
                reason: format!("{:?}", e),
            })
    }

    fn on_click(&self, mut handler: Handler) -> Self::Listener {
        let id = self.id.clone();

        EventListener::new(&self.element, "click", move |_event| {
            if let Err(e) = handler() {
                log::error!("{}: {}", id, e);
                wasm_bindgen::throw_str(&e.to_string());
            }
        })
    }
}

#[derive(Clone)]
pub struct Location {
    location: web_sys::Location,
}

impl Location {
    pub fn new(location: web_sys::Location) -> Self {
        Self { location }
    }
}

impl binder::Navigator for Location {
    fn navigate(&self, path: &str) -> Result<(), BindError> {
        log::debug!("navigate {}", path);

        self.location
            .set_href(path)
            .map_err(|e| BindError::Navigation {
                path: path.to_owned(),
                reason: format!("{:?}", e),
            })
    }
}
