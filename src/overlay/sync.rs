use std::collections::BTreeMap;
use std::marker::PhantomData;

use log::{debug, trace};

use super::{Document, Overlay, OverlayFactory, OverlayOptions};
use crate::form::{FieldKey, ValidationResult};

const LIST_STYLE: &str = "list-style-position:outside;padding-left:18px;margin:0";

struct Slot<V> {
    overlay: V,
    enabled: bool,
    content: Option<String>,
}

/// Keeps one overlay per field in line with that field's visible failures, and the
/// invalid-state class of its element.
///
/// Overlays are created once and never recreated; afterwards they are only enabled,
/// disabled, refilled or shown. Every write is skipped when the current state
/// already matches, so repeated syncs with the same failures touch nothing.
pub struct OverlaySynchronizer<E, O>
where
    O: OverlayFactory<E>,
{
    factory: O,
    options: OverlayOptions,
    invalid_class: String,
    slots: BTreeMap<FieldKey, Slot<O::Overlay>>,
    _element: PhantomData<fn(&E)>,
}

impl<E, O> OverlaySynchronizer<E, O>
where
    O: OverlayFactory<E>,
{
    pub fn new(factory: O, options: OverlayOptions, invalid_class: impl Into<String>) -> Self {
        Self {
            factory,
            options,
            invalid_class: invalid_class.into(),
            slots: BTreeMap::new(),
            _element: PhantomData,
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.slots.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_enabled(&self, field: &str) -> Option<bool> {
        self.slots.get(field).map(|slot| slot.enabled)
    }

    /// Creates the field's overlay if it has none yet. A new overlay is disabled
    /// right away unless `start_enabled`. Returns whether an overlay was created.
    pub fn ensure(&mut self, field: &FieldKey, element: &E, start_enabled: bool) -> bool {
        if self.slots.contains_key(field) {
            return false;
        }
        let mut overlay = self.factory.create(element, &self.options);
        if !start_enabled {
            overlay.disable();
        }
        debug!("created overlay for `{field}` (enabled: {start_enabled})");
        self.slots.insert(
            field.clone(),
            Slot {
                overlay,
                enabled: start_enabled,
                content: None,
            },
        );
        true
    }

    /// Brings the field's overlay and class in line with `failures` (the failures of
    /// this field only). Returns whether anything was written.
    pub fn sync<D>(
        &mut self,
        document: &D,
        field: &FieldKey,
        element: &E,
        failures: &[&ValidationResult],
        start_enabled: bool,
    ) -> bool
    where
        D: Document<Element = E>,
    {
        let mut changed = self.ensure(field, element, start_enabled);
        let messages = failures
            .iter()
            .filter(|result| result.is_visible())
            .map(|result| result.message.as_str())
            .collect::<Vec<_>>();
        let allow_html = self.options.allow_html_content;

        if let Some(slot) = self.slots.get_mut(field) {
            if messages.is_empty() {
                if slot.enabled {
                    slot.overlay.disable();
                    slot.enabled = false;
                    changed = true;
                }
            } else {
                let content = render_content(&messages, allow_html);
                let mut revealed = false;
                if slot.content.as_deref() != Some(content.as_str()) {
                    slot.overlay.set_content(&content);
                    slot.content = Some(content);
                    revealed = true;
                }
                if !slot.enabled {
                    slot.overlay.enable();
                    slot.enabled = true;
                    revealed = true;
                }
                if revealed && document.is_pointer_engaged(element) {
                    slot.overlay.show();
                }
                changed |= revealed;
            }
        }

        changed |= toggle_class(document, element, &self.invalid_class, !messages.is_empty());
        if !changed {
            trace!("overlay for `{field}` already up to date");
        }
        changed
    }

    /// Hides the overlay and clears the class of a field that lost its rules.
    pub fn retire<D>(&mut self, document: &D, field: &FieldKey, element: Option<&E>)
    where
        D: Document<Element = E>,
    {
        if let Some(slot) = self.slots.get_mut(field) {
            if slot.enabled {
                slot.overlay.disable();
                slot.enabled = false;
            }
        }
        if let Some(element) = element {
            toggle_class(document, element, &self.invalid_class, false);
        }
    }

    /// Drops every overlay instance.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

/// A single message verbatim; several messages as a list.
pub fn render_content(messages: &[&str], allow_html: bool) -> String {
    match messages {
        [] => String::new(),
        [single] => (*single).to_owned(),
        many if allow_html => {
            let items = many
                .iter()
                .map(|message| format!("<li>{message}</li>"))
                .collect::<String>();
            format!("<ul style='{LIST_STYLE}'>{items}</ul>")
        }
        many => many
            .iter()
            .map(|message| format!("- {message}"))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn toggle_class<D>(document: &D, element: &D::Element, class: &str, present: bool) -> bool
where
    D: Document,
{
    if document.has_class(element, class) == present {
        return false;
    }
    if present {
        document.add_class(element, class);
    } else {
        document.remove_class(element, class);
    }
    true
}
