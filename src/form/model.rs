use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};

use super::controller::FieldKey;
use super::rule::{CompositeValidator, ErrorMap};
use super::value::FieldValue;

/// Snapshot of every control value in a form.
pub type FormValues = BTreeMap<FieldKey, FieldValue>;

/// Change notification published by a form model.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FormEvent {
    ValueChanged(FieldKey),
    Recomputed(Option<FieldKey>),
}

/// The host form the controller attaches to.
///
/// A control's validity is only refreshed by `recompute`; `errors` returns the map
/// produced by the last recompute of that control.
pub trait FormModel: Send + Sync {
    fn control_names(&self) -> Vec<FieldKey>;

    fn has_control(&self, field: &str) -> bool {
        self.control_names().iter().any(|key| key.as_str() == field)
    }

    fn value(&self, field: &str) -> Option<FieldValue>;
    fn is_dirty(&self, field: &str) -> bool;
    fn mark_dirty(&self, field: &str);

    /// Replaces the control's validator; `None` detaches it.
    fn set_validator(&self, field: &str, validator: Option<CompositeValidator>);
    fn errors(&self, field: &str) -> ErrorMap;
    fn recompute(&self, field: &str);
    fn recompute_all(&self);
}

/// Initial control values for a form, usually derived with `#[derive(FormFields)]`.
pub trait FormFields {
    fn field_values(&self) -> Vec<(FieldKey, FieldValue)>;
}

#[derive(Clone, Debug, Default)]
struct Control {
    initial: FieldValue,
    value: FieldValue,
    dirty: bool,
    validator: Option<CompositeValidator>,
    errors: ErrorMap,
}

#[derive(Default)]
struct MemoryFormState {
    controls: BTreeMap<FieldKey, Control>,
    subscribers: Vec<UnboundedSender<FormEvent>>,
    recompute_all_count: usize,
}

/// Headless form model holding its controls in memory.
///
/// Every recompute publishes a `FormEvent`, the same way a UI host reports validity
/// updates through its value-change stream.
#[derive(Clone, Default)]
pub struct MemoryForm {
    state: Arc<RwLock<MemoryFormState>>,
}

impl MemoryForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: &impl FormFields) -> Self {
        fields
            .field_values()
            .into_iter()
            .fold(Self::new(), |form, (key, value)| form.with_control(key, value))
    }

    pub fn with_control(self, field: impl Into<FieldKey>, value: impl Into<FieldValue>) -> Self {
        self.add_control(field, value);
        self
    }

    pub fn add_control(&self, field: impl Into<FieldKey>, value: impl Into<FieldValue>) {
        let value = value.into();
        self.write().controls.insert(
            field.into(),
            Control {
                initial: value.clone(),
                value,
                ..Control::default()
            },
        );
    }

    /// Stream of change events published after this call.
    pub fn changes(&self) -> UnboundedReceiver<FormEvent> {
        let (sender, receiver) = unbounded();
        self.write().subscribers.push(sender);
        receiver
    }

    /// A user edit: stores the value, marks the control dirty and revalidates it.
    pub fn input(&self, field: &str, value: impl Into<FieldValue>) -> bool {
        self.update(field, value.into(), true)
    }

    /// A programmatic write: stores the value and revalidates without touching the
    /// dirty flag.
    pub fn set_value(&self, field: &str, value: impl Into<FieldValue>) -> bool {
        self.update(field, value.into(), false)
    }

    pub fn mark_pristine(&self, field: &str) {
        if let Some(control) = self.write().controls.get_mut(field) {
            control.dirty = false;
        }
    }

    /// Restores initial values, clears dirty flags and revalidates every control.
    pub fn reset(&self) {
        {
            let mut state = self.write();
            for control in state.controls.values_mut() {
                control.value = control.initial.clone();
                control.dirty = false;
            }
        }
        self.recompute_all();
    }

    pub fn values(&self) -> FormValues {
        self.read()
            .controls
            .iter()
            .map(|(key, control)| (key.clone(), control.value.clone()))
            .collect()
    }

    pub fn validator(&self, field: &str) -> Option<CompositeValidator> {
        self.read()
            .controls
            .get(field)
            .and_then(|control| control.validator.clone())
    }

    pub fn recompute_all_count(&self) -> usize {
        self.read().recompute_all_count
    }

    fn update(&self, field: &str, value: FieldValue, dirty: bool) -> bool {
        {
            let mut state = self.write();
            let Some(control) = state.controls.get_mut(field) else {
                return false;
            };
            control.value = value;
            control.dirty |= dirty;
        }
        let key = FieldKey::new(field);
        self.revalidate(&[key.clone()]);
        self.publish(FormEvent::ValueChanged(key));
        true
    }

    fn revalidate(&self, keys: &[FieldKey]) {
        let values = self.values();
        let validators = {
            let state = self.read();
            keys.iter()
                .filter_map(|key| {
                    state
                        .controls
                        .get(key)
                        .map(|control| (key.clone(), control.validator.clone()))
                })
                .collect::<Vec<_>>()
        };
        let computed = validators
            .into_iter()
            .map(|(key, validator)| {
                let errors = validator
                    .map(|validator| validator.validate(&key, &values))
                    .unwrap_or_default();
                (key, errors)
            })
            .collect::<Vec<_>>();

        let mut state = self.write();
        for (key, errors) in computed {
            if let Some(control) = state.controls.get_mut(&key) {
                control.errors = errors;
            }
        }
    }

    fn publish(&self, event: FormEvent) {
        let mut state = self.write();
        state
            .subscribers
            .retain(|subscriber| subscriber.unbounded_send(event.clone()).is_ok());
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryFormState> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryFormState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl FormModel for MemoryForm {
    fn control_names(&self) -> Vec<FieldKey> {
        self.read().controls.keys().cloned().collect()
    }

    fn has_control(&self, field: &str) -> bool {
        self.read().controls.contains_key(field)
    }

    fn value(&self, field: &str) -> Option<FieldValue> {
        self.read()
            .controls
            .get(field)
            .map(|control| control.value.clone())
    }

    fn is_dirty(&self, field: &str) -> bool {
        self.read()
            .controls
            .get(field)
            .is_some_and(|control| control.dirty)
    }

    fn mark_dirty(&self, field: &str) {
        if let Some(control) = self.write().controls.get_mut(field) {
            control.dirty = true;
        }
    }

    fn set_validator(&self, field: &str, validator: Option<CompositeValidator>) {
        if let Some(control) = self.write().controls.get_mut(field) {
            control.validator = validator;
        }
    }

    fn errors(&self, field: &str) -> ErrorMap {
        self.read()
            .controls
            .get(field)
            .map(|control| control.errors.clone())
            .unwrap_or_default()
    }

    fn recompute(&self, field: &str) {
        if !self.has_control(field) {
            return;
        }
        let key = FieldKey::new(field);
        self.revalidate(&[key.clone()]);
        self.publish(FormEvent::Recomputed(Some(key)));
    }

    fn recompute_all(&self) {
        let keys = self.control_names();
        self.revalidate(&keys);
        self.write().recompute_all_count += 1;
        self.publish(FormEvent::Recomputed(None));
    }
}
