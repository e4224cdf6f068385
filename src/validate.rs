use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::FieldErrors;

pub const MAX_CHARS: usize = 255;
pub const MIN_PASSWORD_CHARS: usize = 8;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn too_long(field: &str, value: &str, errors: &mut FieldErrors) -> bool {
    if value.chars().count() > MAX_CHARS {
        errors.add(
            field,
            format!("Ensure this field has no more than {MAX_CHARS} characters."),
        );
        return true;
    }
    false
}

/// Non-blank text of at most [`MAX_CHARS`]. `None` is reported only when `required`.
pub fn text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    required: bool,
) -> Option<String> {
    let Some(value) = value else {
        if required {
            errors.add(field, REQUIRED);
        }
        return None;
    };
    let value = value.trim().to_string();
    if value.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if too_long(field, &value, errors) {
        return None;
    }
    Some(value)
}

/// Text that may be empty, still bounded by [`MAX_CHARS`].
pub fn optional_text(errors: &mut FieldErrors, field: &str, value: Option<String>) -> Option<String> {
    let value = value?.trim().to_string();
    if too_long(field, &value, errors) {
        return None;
    }
    Some(value)
}

pub fn email(errors: &mut FieldErrors, field: &str, value: Option<String>, required: bool) -> Option<String> {
    let value = text(errors, field, value, required)?;
    if !is_valid_email(&value) {
        errors.add(field, "Enter a valid email address.");
        return None;
    }
    Some(value)
}

pub fn password(errors: &mut FieldErrors, field: &str, value: Option<String>, required: bool) -> Option<String> {
    let Some(value) = value else {
        if required {
            errors.add(field, REQUIRED);
        }
        return None;
    };
    if value.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if value.chars().count() < MIN_PASSWORD_CHARS {
        errors.add(
            field,
            format!("Ensure this field has at least {MIN_PASSWORD_CHARS} characters."),
        );
        return None;
    }
    Some(value)
}

pub fn minutes(errors: &mut FieldErrors, field: &str, value: Option<i32>, required: bool) -> Option<i32> {
    let Some(value) = value else {
        if required {
            errors.add(field, REQUIRED);
        }
        return None;
    };
    if value < 0 {
        errors.add(field, "Ensure this value is greater than or equal to 0.");
        return None;
    }
    Some(value)
}

/// A price fitting `NUMERIC(5, 2)`: three integer digits, two decimal places.
/// Accepted values are rescaled to exactly two places so they render as `"5.00"`.
pub fn price(errors: &mut FieldErrors, field: &str, value: Option<Decimal>, required: bool) -> Option<Decimal> {
    let Some(mut value) = value else {
        if required {
            errors.add(field, REQUIRED);
        }
        return None;
    };
    if value.round_dp(2) != value {
        errors.add(field, "Ensure that there are no more than 2 decimal places.");
        return None;
    }
    if value.abs() >= Decimal::from(1000) {
        errors.add(field, "Ensure that there are no more than 3 digits before the decimal point.");
        return None;
    }
    value.rescale(2);
    Some(value)
}
