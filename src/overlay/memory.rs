use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Document, Overlay, OverlayFactory, OverlayOptions};
use crate::form::{FieldKey, FormId};

/// Handle of an element inside a `MemoryDocument`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ElementId(pub u64);

#[derive(Default)]
struct Element {
    name: Option<FieldKey>,
    classes: BTreeSet<String>,
}

#[derive(Default)]
struct DocumentState {
    next_id: u64,
    elements: BTreeMap<ElementId, Element>,
    roots: BTreeMap<FormId, Vec<ElementId>>,
    hovered: Option<ElementId>,
    focused: Option<ElementId>,
    class_writes: usize,
}

/// Headless element tree: form roots with named inputs, class sets, hover and focus.
#[derive(Clone, Default)]
pub struct MemoryDocument {
    state: Arc<RwLock<DocumentState>>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts a root for `form` holding one named input per entry.
    pub fn mount_form(&self, form: FormId, names: &[&str]) -> Vec<ElementId> {
        self.write().roots.entry(form).or_default();
        names
            .iter()
            .map(|name| self.add_input(form, Some(*name)))
            .collect()
    }

    /// Appends an input to the root of `form`, mounting the root if needed.
    pub fn add_input(&self, form: FormId, name: Option<&str>) -> ElementId {
        let mut state = self.write();
        let id = ElementId(state.next_id);
        state.next_id += 1;
        state.elements.insert(
            id,
            Element {
                name: name.map(FieldKey::new),
                classes: BTreeSet::new(),
            },
        );
        state.roots.entry(form).or_default().push(id);
        id
    }

    pub fn unmount_form(&self, form: FormId) {
        let mut state = self.write();
        if let Some(inputs) = state.roots.remove(&form) {
            for input in inputs {
                state.elements.remove(&input);
            }
        }
    }

    pub fn element_named(&self, form: FormId, name: &str) -> Option<ElementId> {
        let state = self.read();
        state.roots.get(&form)?.iter().copied().find(|id| {
            state
                .elements
                .get(id)
                .and_then(|element| element.name.as_ref())
                .is_some_and(|key| key.as_str() == name)
        })
    }

    pub fn hover(&self, element: Option<ElementId>) {
        self.write().hovered = element;
    }

    pub fn focus(&self, element: Option<ElementId>) {
        self.write().focused = element;
    }

    pub fn classes(&self, element: ElementId) -> BTreeSet<String> {
        self.read()
            .elements
            .get(&element)
            .map(|element| element.classes.clone())
            .unwrap_or_default()
    }

    /// Number of class additions and removals performed so far.
    pub fn class_writes(&self) -> usize {
        self.read().class_writes
    }

    fn read(&self) -> RwLockReadGuard<'_, DocumentState> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, DocumentState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Document for MemoryDocument {
    type Element = ElementId;

    fn form_inputs(&self, form: FormId) -> Option<Vec<ElementId>> {
        self.read().roots.get(&form).cloned()
    }

    fn field_name(&self, element: &ElementId) -> Option<FieldKey> {
        self.read()
            .elements
            .get(element)
            .and_then(|element| element.name.clone())
    }

    fn has_class(&self, element: &ElementId, class: &str) -> bool {
        self.read()
            .elements
            .get(element)
            .is_some_and(|element| element.classes.contains(class))
    }

    fn add_class(&self, element: &ElementId, class: &str) {
        let mut state = self.write();
        state.class_writes += 1;
        if let Some(element) = state.elements.get_mut(element) {
            element.classes.insert(class.to_string());
        }
    }

    fn remove_class(&self, element: &ElementId, class: &str) {
        let mut state = self.write();
        state.class_writes += 1;
        if let Some(element) = state.elements.get_mut(element) {
            element.classes.remove(class);
        }
    }

    fn hovered_input(&self) -> Option<ElementId> {
        self.read().hovered
    }

    fn focused_element(&self) -> Option<ElementId> {
        self.read().focused
    }
}

/// One call made on an overlay created by `RecordingOverlays`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OverlayCall {
    Created(ElementId),
    Enabled(ElementId),
    Disabled(ElementId),
    Content(ElementId, String),
    Shown(ElementId),
}

impl OverlayCall {
    pub fn element(&self) -> ElementId {
        match self {
            Self::Created(element)
            | Self::Enabled(element)
            | Self::Disabled(element)
            | Self::Content(element, _)
            | Self::Shown(element) => *element,
        }
    }
}

/// State of one overlay as replayed from the call log.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OverlayView {
    pub enabled: bool,
    pub content: Option<String>,
    pub shown: usize,
}

type CallLog = Arc<RwLock<Vec<OverlayCall>>>;

fn record(log: &CallLog, call: OverlayCall) {
    match log.write() {
        Ok(mut calls) => calls.push(call),
        Err(poisoned) => poisoned.into_inner().push(call),
    }
}

/// Overlay factory that records every call instead of rendering anything.
#[derive(Clone, Default)]
pub struct RecordingOverlays {
    log: CallLog,
}

impl RecordingOverlays {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<OverlayCall> {
        match self.log.read() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn calls_for(&self, element: ElementId) -> Vec<OverlayCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.element() == element)
            .collect()
    }

    /// Replays the log of `element`; `None` when no overlay was created for it.
    pub fn view(&self, element: ElementId) -> Option<OverlayView> {
        let calls = self.calls_for(element);
        if !calls.contains(&OverlayCall::Created(element)) {
            return None;
        }
        let mut view = OverlayView::default();
        for call in calls {
            match call {
                OverlayCall::Created(_) | OverlayCall::Enabled(_) => view.enabled = true,
                OverlayCall::Disabled(_) => view.enabled = false,
                OverlayCall::Content(_, content) => view.content = Some(content),
                OverlayCall::Shown(_) => view.shown += 1,
            }
        }
        Some(view)
    }
}

impl OverlayFactory<ElementId> for RecordingOverlays {
    type Overlay = RecordingOverlay;

    fn create(&self, element: &ElementId, _options: &OverlayOptions) -> RecordingOverlay {
        record(&self.log, OverlayCall::Created(*element));
        RecordingOverlay {
            element: *element,
            log: self.log.clone(),
        }
    }
}

pub struct RecordingOverlay {
    element: ElementId,
    log: CallLog,
}

impl Overlay for RecordingOverlay {
    fn enable(&mut self) {
        record(&self.log, OverlayCall::Enabled(self.element));
    }

    fn disable(&mut self) {
        record(&self.log, OverlayCall::Disabled(self.element));
    }

    fn set_content(&mut self, content: &str) {
        record(
            &self.log,
            OverlayCall::Content(self.element, content.to_string()),
        );
    }

    fn show(&mut self) {
        record(&self.log, OverlayCall::Shown(self.element));
    }
}
