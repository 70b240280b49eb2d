pub mod form;
pub mod overlay;
pub mod prelude;

#[cfg(test)]
mod test_public_api;

pub use form::{
    FieldKey, FieldValue, FormError, FormId, FormResult, RuleDescriptor, RuleId,
    ValidationController, ValidationOptions, ValidationResult,
};
pub use overlay::{Document, Overlay, OverlayFactory, OverlayOptions};
