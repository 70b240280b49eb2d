//! Error overlays anchored to form inputs.
//!
//! The popup widget and the element tree are host collaborators. `Overlay` and
//! `OverlayFactory` describe the popup library, `Document` the element tree.
//! `memory` provides headless implementations of both.

mod memory;
mod sync;

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::form::{FieldKey, FormId};

pub use memory::{
    ElementId, MemoryDocument, OverlayCall, OverlayView, RecordingOverlay, RecordingOverlays,
};
pub use sync::{OverlaySynchronizer, render_content};

/// Options handed to the popup library when an overlay is created.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverlayOptions {
    /// Render content as markup; multiple messages become an itemized list.
    pub allow_html_content: bool,
    /// Library-specific options passed through untouched.
    #[serde(flatten)]
    pub passthrough: BTreeMap<String, serde_json::Value>,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            allow_html_content: true,
            passthrough: BTreeMap::new(),
        }
    }
}

/// A popup instance bound to one element.
pub trait Overlay: Send + Sync {
    fn enable(&mut self);
    fn disable(&mut self);
    fn set_content(&mut self, content: &str);
    /// Shows the popup now instead of waiting for the next hover.
    fn show(&mut self);
}

pub trait OverlayFactory<E>: Send + Sync {
    type Overlay: Overlay;

    fn create(&self, element: &E, options: &OverlayOptions) -> Self::Overlay;
}

/// Element tree the form is rendered into.
pub trait Document: Send + Sync {
    type Element: Clone + PartialEq + Send + Sync;

    /// Input elements under the root attached to `form`, or `None` when that root
    /// is not mounted.
    fn form_inputs(&self, form: FormId) -> Option<Vec<Self::Element>>;
    fn field_name(&self, element: &Self::Element) -> Option<FieldKey>;

    fn has_class(&self, element: &Self::Element, class: &str) -> bool;
    fn add_class(&self, element: &Self::Element, class: &str);
    fn remove_class(&self, element: &Self::Element, class: &str);

    /// Innermost input currently under the pointer.
    fn hovered_input(&self) -> Option<Self::Element>;
    fn focused_element(&self) -> Option<Self::Element>;

    /// Pointer rests on `element` while it holds input focus.
    fn is_pointer_engaged(&self, element: &Self::Element) -> bool {
        self.hovered_input().as_ref() == Some(element)
            && self.focused_element().as_ref() == Some(element)
    }
}
