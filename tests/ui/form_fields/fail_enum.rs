#![allow(dead_code)]

use calmform::form::FormFields;

#[derive(FormFields)]
enum Consent {
    Given,
    Withheld,
}

fn main() {}
