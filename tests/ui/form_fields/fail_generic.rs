#![allow(dead_code)]

use calmform::form::FormFields;

#[derive(FormFields)]
struct DraftForm<T> {
    value: T,
}

fn main() {}
