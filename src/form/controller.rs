use std::borrow::Borrow;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures::future::{AbortHandle, Abortable, Aborted, Fuse, FutureExt};
use futures::{Stream, StreamExt, select_biased};
use futures_timer::Delay;
use log::{debug, trace};
use serde::Deserialize;

use super::broadcast::ValidationResults;
use super::gate::Gate;
use super::model::{FormEvent, FormModel};
use super::registry::{RequirementRegistry, Requirements, SkippedEntry};
use super::rule::CompositeValidator;
use super::validation::{ValidationEngine, ValidationResult};
use crate::overlay::{Document, OverlayFactory, OverlayOptions, OverlaySynchronizer};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

/// Handle correlating a controller with the root element of its form.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

impl Display for FormId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "form-{}", self.0)
    }
}

/// Name of a form control.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(Arc<str>);

impl FieldKey {
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FieldKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Borrow<str> for FieldKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("validation state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("validation controller has been torn down")]
    TornDown,
    #[error("invalid validation config: {0}")]
    InvalidConfig(String),
}

pub type FormResult<T> = Result<T, FormError>;

/// Controller knobs.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationOptions {
    /// Debounce interval of the change stream, also used as the guard window after
    /// each pass.
    #[serde(alias = "validationDebounceTime")]
    pub debounce_ms: u64,
    /// When false, results are computed and broadcast but no overlay or class is
    /// ever touched.
    #[serde(alias = "useTooltips")]
    pub use_overlays: bool,
    pub invalid_class: String,
    #[serde(alias = "overlayDefaults")]
    pub overlay: OverlayOptions,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            debounce_ms: 0,
            use_overlays: true,
            invalid_class: "validation-error".to_string(),
            overlay: OverlayOptions::default(),
        }
    }
}

impl ValidationOptions {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn from_json_str(source: &str) -> FormResult<Self> {
        serde_json::from_str(source).map_err(|error| FormError::InvalidConfig(error.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ControllerMode {
    #[default]
    Idle,
    Active,
    TornDown,
}

#[derive(Clone, Debug)]
pub enum PassOutcome {
    /// The gate was down; nothing ran.
    Ignored,
    Evaluated(ValidationResults),
}

impl PassOutcome {
    pub fn results(&self) -> Option<&[ValidationResult]> {
        match self {
            Self::Ignored => None,
            Self::Evaluated(results) => Some(&results[..]),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConfigureReport {
    pub registered: Vec<FieldKey>,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Default)]
struct ControllerState {
    mode: ControllerMode,
    gate: Gate,
    registry: RequirementRegistry,
    passes: usize,
    /// Number of `configure` calls in flight. The gate stays down while non-zero.
    configuring: usize,
}

/// Attaches a requirement registry to a form and keeps the form's overlays in sync
/// with its validity.
///
/// Every pass disarms the gate; it stays down until `rearm`, which the async driver
/// schedules one debounce interval later. Change notifications arriving in between,
/// including the ones caused by the pass itself, are dropped.
pub struct ValidationController<F, D, O>
where
    F: FormModel + ?Sized,
    D: Document,
    O: OverlayFactory<D::Element>,
{
    id: FormId,
    form: Arc<F>,
    document: Arc<D>,
    options: ValidationOptions,
    engine: ValidationEngine,
    state: Arc<RwLock<ControllerState>>,
    overlays: Arc<RwLock<OverlaySynchronizer<D::Element, O>>>,
    driver: Arc<RwLock<Option<AbortHandle>>>,
}

impl<F, D, O> Clone for ValidationController<F, D, O>
where
    F: FormModel + ?Sized,
    D: Document,
    O: OverlayFactory<D::Element>,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            form: self.form.clone(),
            document: self.document.clone(),
            options: self.options.clone(),
            engine: self.engine.clone(),
            state: self.state.clone(),
            overlays: self.overlays.clone(),
            driver: self.driver.clone(),
        }
    }
}

impl<F, D, O> ValidationController<F, D, O>
where
    F: FormModel + ?Sized,
    D: Document,
    O: OverlayFactory<D::Element>,
{
    pub fn new(form: Arc<F>, document: Arc<D>, overlays: O, options: ValidationOptions) -> Self {
        let synchronizer = OverlaySynchronizer::new(
            overlays,
            options.overlay.clone(),
            options.invalid_class.clone(),
        );
        Self {
            id: FormId::next(),
            form,
            document,
            options,
            engine: ValidationEngine::new(),
            state: Arc::new(RwLock::new(ControllerState::default())),
            overlays: Arc::new(RwLock::new(synchronizer)),
            driver: Arc::new(RwLock::new(None)),
        }
    }

    /// Identifier the host must give the form's root element.
    pub fn form_id(&self) -> FormId {
        self.id
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    pub fn form(&self) -> &Arc<F> {
        &self.form
    }

    /// Replaces the registry and attaches its rules to the form.
    ///
    /// Runs with the gate held down: driver re-arms and passes are ignored until it
    /// returns. Each registered field gets its composite validator
    /// replaced, is seeded dirty when it already holds a value or has a rule shown
    /// while pristine, gets its overlay if the root is mounted, and is recomputed.
    /// Fields that lost their rules are detached. Ends by arming the gate and
    /// requesting one whole-form recompute.
    pub fn configure(&self, requirements: Requirements) -> FormResult<ConfigureReport> {
        let previous = {
            let mut state = write_lock(&self.state, "configuring")?;
            if state.mode == ControllerMode::TornDown {
                return Err(FormError::TornDown);
            }
            state.gate.disarm();
            state.configuring += 1;
            state.registry.clone()
        };
        let result = self.attach(previous, requirements);

        let mut state = write_lock(&self.state, "configuring")?;
        state.configuring = state.configuring.saturating_sub(1);
        let (registry, skipped) = result?;
        let registered = registry.fields().cloned().collect::<Vec<_>>();
        if !registry.is_empty() && state.mode != ControllerMode::TornDown {
            state.mode = ControllerMode::Active;
        }
        state.registry = registry;
        if state.configuring == 0 && state.mode != ControllerMode::TornDown {
            state.gate.arm();
        }
        drop(state);
        debug!(
            "{} configured: {} field(s) registered, {} entr(ies) skipped",
            self.id,
            registered.len(),
            skipped.len()
        );

        self.form.recompute_all();
        Ok(ConfigureReport {
            registered,
            skipped,
        })
    }

    fn attach(
        &self,
        previous: RequirementRegistry,
        requirements: Requirements,
    ) -> FormResult<(RequirementRegistry, Vec<SkippedEntry>)> {
        let form = self.form.as_ref();
        let (registry, skipped) =
            RequirementRegistry::build(requirements, |field| form.has_control(field));
        let elements = if self.options.use_overlays {
            self.field_elements()
        } else {
            None
        };

        {
            let mut overlays = write_lock(&self.overlays, "configuring overlays")?;
            for field in previous.fields() {
                if registry.contains(field.as_str()) {
                    continue;
                }
                debug!("detaching rules from `{field}`");
                form.set_validator(field.as_str(), None);
                overlays.retire(self.document.as_ref(), field, element_for(&elements, field));
                form.recompute(field.as_str());
            }

            for (field, rules) in registry.iter() {
                let name = field.as_str();
                let seeded = form.value(name).is_some_and(|value| value.has_content())
                    || registry.shows_when_pristine(name);
                if seeded {
                    form.mark_dirty(name);
                }
                form.set_validator(name, Some(CompositeValidator::new(rules.to_vec())));
                if let Some(element) = element_for(&elements, field) {
                    overlays.ensure(field, element, seeded);
                }
                form.recompute(name);
            }
        }
        Ok((registry, skipped))
    }

    /// One validation pass, if the gate is armed. Leaves the gate down.
    pub fn handle_change(&self) -> FormResult<PassOutcome> {
        let registry = {
            let mut state = write_lock(&self.state, "starting a pass")?;
            if state.mode == ControllerMode::TornDown
                || state.configuring > 0
                || !state.gate.disarm()
            {
                trace!("{}: gate is down, change ignored", self.id);
                return Ok(PassOutcome::Ignored);
            }
            state.passes += 1;
            state.registry.clone()
        };

        let reevaluated = registry.always_reevaluated();
        for field in &reevaluated {
            self.form.recompute(field.as_str());
        }
        if !reevaluated.is_empty() {
            self.form.recompute_all();
        }

        let results = self.engine.run(&registry, self.form.as_ref());
        if self.options.use_overlays {
            self.sync_overlays(&registry, &results)?;
        }
        Ok(PassOutcome::Evaluated(results))
    }

    /// Lifts the gate after the guard window. No effect once torn down or while a
    /// `configure` call is still attaching rules; that call arms the gate itself.
    pub fn rearm(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "re-arming")?;
        if state.mode != ControllerMode::TornDown && state.configuring == 0 {
            state.gate.arm();
        }
        Ok(())
    }

    /// Stops the change driver and drops every overlay. Further changes are ignored.
    pub fn teardown(&self) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "tearing down")?;
            state.mode = ControllerMode::TornDown;
            state.gate.disarm();
        }
        if let Some(handle) = write_lock(&self.driver, "tearing down")?.take() {
            handle.abort();
        }
        write_lock(&self.overlays, "tearing down")?.clear();
        debug!("{} torn down", self.id);
        Ok(())
    }

    /// Drives passes from `changes` until the stream ends or `teardown` is called.
    ///
    /// An event arriving while the gate is armed (re)starts the debounce timer and a
    /// pass runs once it fires; events arriving while the gate is down are dropped.
    /// After an evaluated pass the gate is re-armed one debounce interval later.
    pub async fn run<S>(&self, changes: S) -> FormResult<()>
    where
        S: Stream<Item = FormEvent> + Unpin,
    {
        let (handle, registration) = AbortHandle::new_pair();
        if let Some(previous) = write_lock(&self.driver, "starting the driver")?.replace(handle) {
            previous.abort();
        }
        if self.mode()? == ControllerMode::TornDown {
            return Err(FormError::TornDown);
        }

        match Abortable::new(self.drive(changes), registration).await {
            Ok(result) => result,
            Err(Aborted) => {
                debug!("{}: change driver stopped", self.id);
                Ok(())
            }
        }
    }

    async fn drive<S>(&self, changes: S) -> FormResult<()>
    where
        S: Stream<Item = FormEvent> + Unpin,
    {
        let interval = self.options.debounce();
        let mut changes = changes.fuse();
        let mut debounce: Fuse<Delay> = Fuse::terminated();
        let mut rearm: Fuse<Delay> = Fuse::terminated();

        loop {
            select_biased! {
                event = changes.next() => match event {
                    Some(event) => {
                        if self.is_armed()? {
                            trace!("{}: {event:?} restarts the debounce", self.id);
                            debounce = Delay::new(interval).fuse();
                        } else {
                            trace!("{}: {event:?} dropped inside the guard window", self.id);
                        }
                    }
                    None => return Ok(()),
                },
                () = rearm => self.rearm()?,
                () = debounce => {
                    if let PassOutcome::Evaluated(_) = self.handle_change()? {
                        rearm = Delay::new(interval).fuse();
                    }
                }
            }
        }
    }

    /// Stream of the failure list of every pass.
    pub fn subscribe(&self) -> futures::channel::mpsc::UnboundedReceiver<ValidationResults> {
        self.engine.broadcast().subscribe()
    }

    pub fn latest_results(&self) -> Option<ValidationResults> {
        self.engine.broadcast().latest()
    }

    pub fn mode(&self) -> FormResult<ControllerMode> {
        Ok(read_lock(&self.state, "reading mode")?.mode)
    }

    pub fn is_armed(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading gate")?.gate.is_armed())
    }

    /// Number of evaluated passes so far.
    pub fn pass_count(&self) -> FormResult<usize> {
        Ok(read_lock(&self.state, "reading pass count")?.passes)
    }

    pub fn registry(&self) -> FormResult<RequirementRegistry> {
        Ok(read_lock(&self.state, "reading registry")?.registry.clone())
    }

    fn field_elements(&self) -> Option<Vec<(FieldKey, D::Element)>> {
        let inputs = self.document.form_inputs(self.id)?;
        Some(
            inputs
                .into_iter()
                .filter_map(|element| {
                    let field = self.document.field_name(&element)?;
                    self.form
                        .has_control(field.as_str())
                        .then_some((field, element))
                })
                .collect(),
        )
    }

    fn sync_overlays(
        &self,
        registry: &RequirementRegistry,
        results: &[ValidationResult],
    ) -> FormResult<()> {
        let Some(elements) = self.field_elements() else {
            debug!("{}: root element not mounted, overlay sync skipped", self.id);
            return Ok(());
        };
        let mut overlays = write_lock(&self.overlays, "syncing overlays")?;
        for (field, element) in elements {
            let name = field.as_str();
            if !registry.contains(name) {
                continue;
            }
            let failures = results
                .iter()
                .filter(|result| result.field == field)
                .collect::<Vec<_>>();
            let start_enabled = self.form.is_dirty(name) || registry.shows_when_pristine(name);
            overlays.sync(
                self.document.as_ref(),
                &field,
                &element,
                &failures,
                start_enabled,
            );
        }
        Ok(())
    }
}

fn element_for<'a, E>(
    elements: &'a Option<Vec<(FieldKey, E)>>,
    field: &FieldKey,
) -> Option<&'a E> {
    elements
        .as_deref()?
        .iter()
        .find(|(key, _)| key == field)
        .map(|(_, element)| element)
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
