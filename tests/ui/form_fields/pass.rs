use calmform::form::{FieldValue, FormFields, FormModel, MemoryForm};

#[derive(calmform::form::FormFields)]
struct ProfileForm {
    email: String,
    age: Option<u32>,
    r#type: String,
}

fn main() {
    let profile = ProfileForm {
        email: "a@calm.form".to_string(),
        age: None,
        r#type: "admin".to_string(),
    };
    let values = profile.field_values();
    assert_eq!(values.len(), 3);
    assert_eq!(values[2].0.as_str(), "type");

    let form = MemoryForm::from_fields(&profile);
    assert_eq!(form.value("age"), Some(FieldValue::Empty));
    assert_eq!(form.value("email"), Some(FieldValue::from("a@calm.form")));
}
