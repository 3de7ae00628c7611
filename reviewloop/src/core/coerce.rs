//! Coercion of free-form generation output into structured records.
//!
//! Generation backends are asked for JSON but routinely return prose, fenced
//! blocks, or objects with missing fields. [`coerce`] is total: it either
//! parses a conforming record ([`Coerced::Parsed`]) or degrades to a record
//! that carries the raw text as its prose field ([`Coerced::Fallback`]).

use std::sync::LazyLock;

use jsonschema::{Draft, Validator};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::types::{Feedback, Proposal};

const PROPOSAL_SCHEMA: &str = include_str!("../../schemas/proposal.schema.json");
const FEEDBACK_SCHEMA: &str = include_str!("../../schemas/feedback.schema.json");

static PROPOSAL_VALIDATOR: LazyLock<Validator> =
    LazyLock::new(|| compile_schema(PROPOSAL_SCHEMA, "proposal"));
static FEEDBACK_VALIDATOR: LazyLock<Validator> =
    LazyLock::new(|| compile_schema(FEEDBACK_SCHEMA, "feedback"));

/// A record shape the coercer can target.
pub trait Shape: DeserializeOwned {
    /// Human-readable shape name for diagnostics.
    const NAME: &'static str;

    /// Compiled JSON Schema the parsed value must satisfy.
    fn validator() -> &'static Validator;

    /// Degraded record carrying `raw` as the prose field.
    fn degraded(raw: &str) -> Self;
}

impl Shape for Proposal {
    const NAME: &'static str = "proposal";

    fn validator() -> &'static Validator {
        &PROPOSAL_VALIDATOR
    }

    fn degraded(raw: &str) -> Self {
        Proposal::degraded(raw)
    }
}

impl Shape for Feedback {
    const NAME: &'static str = "feedback";

    fn validator() -> &'static Validator {
        &FEEDBACK_VALIDATOR
    }

    fn degraded(raw: &str) -> Self {
        Feedback::degraded(raw, false)
    }
}

/// Outcome of a coercion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coerced<T> {
    /// The text held a conforming record; absent optional fields got defaults.
    Parsed(T),
    /// The text did not conform; `record` carries it verbatim as prose.
    Fallback { record: T, reason: String },
}

impl<T> Coerced<T> {
    pub fn record(&self) -> &T {
        match self {
            Coerced::Parsed(record) | Coerced::Fallback { record, .. } => record,
        }
    }

    pub fn into_record(self) -> T {
        match self {
            Coerced::Parsed(record) | Coerced::Fallback { record, .. } => record,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Coerced::Fallback { .. })
    }
}

/// Coerce raw generation output into the shape `T`. Never fails.
pub fn coerce<T: Shape>(raw: &str) -> Coerced<T> {
    let trimmed = raw.trim();
    match parse_conforming::<T>(trimmed) {
        Ok(record) => Coerced::Parsed(record),
        Err(reason) => Coerced::Fallback {
            record: T::degraded(trimmed),
            reason,
        },
    }
}

fn parse_conforming<T: Shape>(text: &str) -> Result<T, String> {
    let value = parse_json(text)?;
    let violations: Vec<String> = T::validator()
        .iter_errors(&value)
        .map(|err| err.to_string())
        .collect();
    if !violations.is_empty() {
        return Err(format!(
            "{} does not conform: {}",
            T::NAME,
            violations.join("; ")
        ));
    }
    serde_json::from_value(value).map_err(|err| format!("decode {}: {err}", T::NAME))
}

/// Parse `text` as JSON, or the body of its only fenced code block.
fn parse_json(text: &str) -> Result<Value, String> {
    let err = match serde_json::from_str(text) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };
    let Some(body) = single_fenced_block(text) else {
        return Err(format!("parse json: {err}"));
    };
    serde_json::from_str(body).map_err(|err| format!("parse fenced json: {err}"))
}

fn single_fenced_block(text: &str) -> Option<&str> {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)```").expect("fence regex is valid")
    });

    let mut blocks = FENCE_RE.captures_iter(text);
    let first = blocks.next()?;
    if blocks.next().is_some() {
        return None;
    }
    first.get(1).map(|body| body.as_str())
}

fn compile_schema(raw: &str, name: &str) -> Validator {
    let schema: Value = serde_json::from_str(raw)
        .unwrap_or_else(|err| panic!("embedded {name} schema is not json: {err}"));
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .unwrap_or_else(|err| panic!("embedded {name} schema does not compile: {err}"))
}
