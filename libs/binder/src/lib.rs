use log::*;
use thiserror::Error;

/// Identifiers of the elements the pages are expected to carry.
pub mod ids {
    pub const REGISTER_BUTTON: &str = "register-btn";
    pub const LOGOUT_BUTTON: &str = "logout-btn";
    pub const CONFIRM_LOGOUT_BUTTON: &str = "confirm-logout-btn";
    pub const CANCEL_LOGOUT_BUTTON: &str = "cancel-logout-btn";
    pub const LOGOUT_POPUP: &str = "popup-logout";
}

/// Server routes the buttons navigate to.
pub mod paths {
    pub const REGISTER: &str = "/register";
    pub const LOGOUT: &str = "/logout";
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("Missing element: {0}")]
    MissingElement(String),
    #[error("Styling '{id}' failed: {reason}")]
    Style { id: String, reason: String },
    #[error("Navigating to '{path}' failed: {reason}")]
    Navigation { path: String, reason: String },
}

/// Two states a popup can be in, kept apart from how the host expresses
/// them. The host only ever sees the display value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Shown,
    Hidden,
}

impl Visibility {
    pub fn display(&self) -> &'static str {
        match self {
            Visibility::Shown => "block",
            Visibility::Hidden => "none",
        }
    }
}

pub type Handler = Box<dyn FnMut() -> Result<(), BindError>>;

pub trait Element {
    /// Whatever the host hands back for an attached listener. Dropping it
    /// may detach the listener, so `Bindings` holds on to them.
    type Listener;

    fn set_display(&self, value: &str) -> Result<(), BindError>;

    fn on_click(&self, handler: Handler) -> Self::Listener;
}

pub trait Document: Clone + 'static {
    type Element: Element;

    fn element_by_id(&self, id: &str) -> Option<Self::Element>;
}

pub trait Navigator: Clone + 'static {
    fn navigate(&self, path: &str) -> Result<(), BindError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Navigate(&'static str),
    Show(&'static str),
    Hide(&'static str),
}

/// Trigger element and what clicking it does.
pub const BINDINGS: [(&str, Action); 4] = [
    (ids::REGISTER_BUTTON, Action::Navigate(paths::REGISTER)),
    (ids::LOGOUT_BUTTON, Action::Show(ids::LOGOUT_POPUP)),
    (ids::CONFIRM_LOGOUT_BUTTON, Action::Navigate(paths::LOGOUT)),
    (ids::CANCEL_LOGOUT_BUTTON, Action::Hide(ids::LOGOUT_POPUP)),
];

fn require<D: Document>(document: &D, id: &str) -> Result<D::Element, BindError> {
    document
        .element_by_id(id)
        .ok_or_else(|| BindError::MissingElement(id.to_owned()))
}

pub fn set_visibility<D: Document>(
    document: &D,
    id: &str,
    visibility: Visibility,
) -> Result<(), BindError> {
    let element = require(document, id)?;

    trace!("{}: {:?}", id, visibility);

    element.set_display(visibility.display())
}

pub fn show_popup<D: Document>(document: &D, popup_id: &str) -> Result<(), BindError> {
    set_visibility(document, popup_id, Visibility::Shown)
}

pub fn hide_popup<D: Document>(document: &D, popup_id: &str) -> Result<(), BindError> {
    set_visibility(document, popup_id, Visibility::Hidden)
}

pub fn perform<D: Document, N: Navigator>(
    action: Action,
    document: &D,
    navigator: &N,
) -> Result<(), BindError> {
    debug!("perform {:?}", action);

    match action {
        Action::Navigate(path) => navigator.navigate(path),
        Action::Show(popup_id) => show_popup(document, popup_id),
        Action::Hide(popup_id) => hide_popup(document, popup_id),
    }
}

pub struct Bindings<L> {
    listeners: Vec<(&'static str, L)>,
}

impl<L> Bindings<L> {
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.listeners.iter().map(|(id, _)| *id)
    }

    pub fn into_listeners(self) -> Vec<L> {
        self.listeners.into_iter().map(|(_, l)| l).collect()
    }
}

/// Attaches every entry in `BINDINGS`. Call once, after the page markup is
/// in place. All triggers are resolved before any listener is attached, so
/// a missing trigger leaves the page entirely unbound.
pub fn bind<D: Document, N: Navigator>(
    document: &D,
    navigator: &N,
) -> Result<Bindings<<D::Element as Element>::Listener>, BindError> {
    let triggers = BINDINGS
        .iter()
        .map(|(id, action)| require(document, id).map(|element| (*id, *action, element)))
        .collect::<Result<Vec<_>, BindError>>()?;

    let listeners = triggers
        .into_iter()
        .map(|(id, action, element)| {
            let document = document.clone();
            let navigator = navigator.clone();
            let listener = element.on_click(Box::new(move || {
                perform(action, &document, &navigator)
            }));

            (id, listener)
        })
        .collect::<Vec<_>>();

    info!("bound {} triggers", listeners.len());

    Ok(Bindings { listeners })
}
