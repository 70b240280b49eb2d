#![allow(dead_code)]

use calmform::form::FormFields;

#[derive(FormFields)]
struct LoginForm(String, String);

fn main() {}
