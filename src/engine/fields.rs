//! Structural validation: required fields, the future-date rule, and the
//! format rules of customer and resource registrations.
//!
//! Every check runs; failures are collected in field order.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::limits::MAX_EMAIL_LEN;
use crate::model::*;

use super::error::FieldViolation;
use super::validator::Mode;

pub const MSG_REQUIRED: &str = "may not be null";
pub const MSG_FUTURE_DATE: &str =
    "booking dates can not be in the past, please choose one from the future";

static PERSON_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z'-]+$").unwrap());
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
static CUSTOMER_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\([2-9][0-8][0-9]\)\s?[0-9]{3}-[0-9]{4}$").unwrap());
static HOTEL_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(0[0-9]{2}\)\s?[0-9]{4}-[0-9]{4}$").unwrap());
static POSTCODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{6}$").unwrap());
static FLIGHT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}[0-9]{3}$").unwrap());
static AIRPORT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{3}$").unwrap());
static REGISTRATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{7}$").unwrap());

pub const MAX_NAME_CHARS: usize = 25;
pub const MIN_TAXI_SEATS: u32 = 2;
pub const MAX_TAXI_SEATS: u32 = 22;

fn check_name(out: &mut Vec<FieldViolation>, field: &'static str, value: &str) {
    let len = value.chars().count();
    if len == 0 || len > MAX_NAME_CHARS {
        out.push(FieldViolation::new(
            field,
            format!("size must be between 1 and {MAX_NAME_CHARS}"),
        ));
    } else if !PERSON_NAME.is_match(value) {
        out.push(FieldViolation::new(
            field,
            "please use a name without numbers or specials",
        ));
    }
}

fn check_pattern(
    out: &mut Vec<FieldViolation>,
    field: &'static str,
    value: &str,
    pattern: &Regex,
    message: &str,
) {
    if !pattern.is_match(value) {
        out.push(FieldViolation::new(field, message));
    }
}

/// Field rules for a booking candidate.
///
/// `customer_id`, the kind's primary resource and `date` are required; slots the
/// kind does not use must be empty; the date must be strictly after `today`.
/// Updates must carry the id being updated and creates must not carry one.
pub fn booking_violations(
    candidate: &BookingCandidate,
    mode: Mode,
    today: NaiveDate,
) -> Vec<FieldViolation> {
    let mut out = Vec::new();

    match (mode, candidate.id) {
        (Mode::Update, None) => out.push(FieldViolation::new("id", MSG_REQUIRED)),
        (Mode::Create, Some(_)) => out.push(FieldViolation::new(
            "id",
            "ids are assigned by the store and must not be supplied on create",
        )),
        _ => {}
    }

    if candidate.customer_id.is_none() {
        out.push(FieldViolation::new("customer_id", MSG_REQUIRED));
    }

    let primary = candidate.kind.primary();
    for slot in RESOURCE_KINDS {
        let filled = candidate.resources.get(slot).is_some();
        if slot == primary && !filled {
            out.push(FieldViolation::new(slot.ref_field(), MSG_REQUIRED));
        } else if filled && !candidate.kind.accepts(slot) {
            out.push(FieldViolation::new(
                slot.ref_field(),
                format!("not applicable to {} records", candidate.kind),
            ));
        }
    }

    match candidate.date {
        None => out.push(FieldViolation::new("date", MSG_REQUIRED)),
        Some(d) if d <= today => out.push(FieldViolation::new("date", MSG_FUTURE_DATE)),
        Some(_) => {}
    }

    out
}

/// Field rules for a customer or resource registration.
pub fn registration_violations(new: &NewReference) -> Vec<FieldViolation> {
    let mut out = Vec::new();
    match new {
        NewReference::Customer(c) => {
            check_name(&mut out, "first_name", &c.first_name);
            check_name(&mut out, "last_name", &c.last_name);
            if c.email.len() > MAX_EMAIL_LEN || !EMAIL.is_match(&c.email) {
                out.push(FieldViolation::new(
                    "email",
                    "the email address must be in the format of name@domain.com",
                ));
            }
            check_pattern(
                &mut out,
                "phone_number",
                &c.phone_number,
                &CUSTOMER_PHONE,
                "phone number must be in the format (212) 555-1212",
            );
        }
        NewReference::Hotel(h) => {
            check_name(&mut out, "name", &h.name);
            check_pattern(
                &mut out,
                "phone_number",
                &h.phone_number,
                &HOTEL_PHONE,
                "phone number must be in the format (012) 3456-7890",
            );
            check_pattern(
                &mut out,
                "postcode",
                &h.postcode,
                &POSTCODE,
                "postcode must be 6 letters or digits",
            );
        }
        NewReference::Flight(f) => {
            check_pattern(
                &mut out,
                "flight_number",
                &f.flight_number,
                &FLIGHT_NUMBER,
                "please input a flight number: two capital letters and three digits",
            );
            check_pattern(
                &mut out,
                "departure",
                &f.departure,
                &AIRPORT,
                "please input a valid departure",
            );
            check_pattern(
                &mut out,
                "destination",
                &f.destination,
                &AIRPORT,
                "please input a valid destination",
            );
            if f.departure == f.destination {
                out.push(FieldViolation::new(
                    "destination",
                    "destination must differ from departure",
                ));
            }
        }
        NewReference::Taxi(t) => {
            check_pattern(
                &mut out,
                "registration",
                &t.registration,
                &REGISTRATION,
                "registration must be exactly 7 letters or digits",
            );
            if !(MIN_TAXI_SEATS..=MAX_TAXI_SEATS).contains(&t.seats) {
                out.push(FieldViolation::new(
                    "seats",
                    format!("seats must be between {MIN_TAXI_SEATS} and {MAX_TAXI_SEATS}"),
                ));
            }
        }
    }
    out
}
