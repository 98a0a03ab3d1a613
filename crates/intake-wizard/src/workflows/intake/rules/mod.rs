//! Declarative field rules and the single evaluator that applies them.
//!
//! Every requiredness decision the wizard makes, whether advancing a step or resolving where a
//! returning applicant should resume, goes through [`FieldRuleSet::evaluate`].

mod table;
mod value;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::domain::{ApplicationRecord, SectionKey, StepDraft, SubStepId};

pub use table::RuleTable;
pub(crate) use value::{is_absent, lookup, parse_date};
use value::{is_email, is_file_reference, scalar_text};

/// Type constraint applied to a field once it is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    Date,
    OneOf(&'static [&'static str]),
    /// Boolean that reads as `false` when absent.
    Flag,
    /// Boolean that must be `true`; absent reads as `false`.
    MustAccept,
    File,
    List {
        min_items: usize,
        items: &'static [ItemRule],
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

/// Gate on a discriminator field. Evaluated against draft values merged over the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Equals {
        section: SectionKey,
        field: &'static str,
        value: &'static str,
    },
}

impl Condition {
    pub const fn equals(section: SectionKey, field: &'static str, value: &'static str) -> Self {
        Self::Equals {
            section,
            field,
            value,
        }
    }

    pub fn holds(&self, record: &ApplicationRecord) -> bool {
        match self {
            Condition::Equals {
                section,
                field,
                value: expected,
            } => record
                .value_at(*section, field)
                .and_then(scalar_text)
                .map(|current| current == *expected)
                .unwrap_or(false),
        }
    }
}

/// Rule for one field of each entry in a list-valued field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRule {
    pub field: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub presence: Presence,
}

impl ItemRule {
    pub const fn required(field: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            field,
            label,
            kind,
            presence: Presence::Required,
        }
    }

    pub const fn optional(field: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            field,
            label,
            kind,
            presence: Presence::Optional,
        }
    }
}

/// Entry of the rule table, keyed by `(section, field)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub section: SectionKey,
    pub field: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub presence: Presence,
    pub when: Option<Condition>,
    pub sub_step: SubStepId,
}

impl FieldRule {
    pub const fn required(
        section: SectionKey,
        field: &'static str,
        label: &'static str,
        kind: FieldKind,
    ) -> Self {
        Self {
            section,
            field,
            label,
            kind,
            presence: Presence::Required,
            when: None,
            sub_step: SubStepId::Whole,
        }
    }

    pub const fn optional(
        section: SectionKey,
        field: &'static str,
        label: &'static str,
        kind: FieldKind,
    ) -> Self {
        Self {
            section,
            field,
            label,
            kind,
            presence: Presence::Optional,
            when: None,
            sub_step: SubStepId::Whole,
        }
    }

    pub const fn when(self, condition: Condition) -> Self {
        Self {
            when: Some(condition),
            ..self
        }
    }

    pub const fn in_sub_step(self, sub_step: SubStepId) -> Self {
        Self { sub_step, ..self }
    }

    pub fn applies_to(&self, record: &ApplicationRecord) -> bool {
        self.when
            .map(|condition| condition.holds(record))
            .unwrap_or(true)
    }
}

/// Rules for one step or sub-step.
#[derive(Debug, Clone)]
pub struct FieldRuleSet<'a> {
    rules: Vec<&'a FieldRule>,
}

impl<'a> FieldRuleSet<'a> {
    pub fn new(rules: Vec<&'a FieldRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[&'a FieldRule] {
        &self.rules
    }

    /// Validate draft values for the step against the record they will be merged into.
    pub fn validate(&self, draft: &StepDraft, record: &ApplicationRecord) -> ValidationReport {
        self.evaluate(&record.with_draft(draft))
    }

    /// Validate a record as it currently stands.
    pub fn evaluate(&self, record: &ApplicationRecord) -> ValidationReport {
        let mut report = ValidationReport::default();
        for rule in &self.rules {
            if !rule.applies_to(record) {
                continue;
            }
            let value = record.value_at(rule.section, rule.field);
            check_field(
                &mut report,
                rule.field,
                rule.label,
                rule.kind,
                rule.presence,
                value,
            );
        }
        report
    }
}

fn check_field(
    report: &mut ValidationReport,
    path: &str,
    label: &str,
    kind: FieldKind,
    presence: Presence,
    value: Option<&Value>,
) {
    match kind {
        FieldKind::Flag => {
            if let Some(value) = value.filter(|value| !is_absent(Some(*value))) {
                if !value.is_boolean() {
                    report.push(path, format!("{label} must be true or false"));
                }
            }
        }
        FieldKind::MustAccept => {
            if value.and_then(Value::as_bool) != Some(true) {
                report.push(path, format!("{label} must be accepted"));
            }
        }
        FieldKind::List { min_items, items } => {
            let entries: &[Value] = match value {
                None | Some(Value::Null) => &[],
                Some(Value::Array(entries)) => entries.as_slice(),
                Some(_) => {
                    report.push(path, format!("{label} must be a list"));
                    return;
                }
            };
            if matches!(presence, Presence::Required) && entries.len() < min_items {
                let noun = if min_items == 1 { "entry" } else { "entries" };
                report.push(path, format!("{label} needs at least {min_items} {noun}"));
            }
            for (index, entry) in entries.iter().enumerate() {
                let Some(object) = entry.as_object() else {
                    report.push(
                        &format!("{path}[{index}]"),
                        format!("{label} entries must be objects"),
                    );
                    continue;
                };
                for item in items {
                    check_field(
                        report,
                        &format!("{path}[{index}].{}", item.field),
                        item.label,
                        item.kind,
                        item.presence,
                        lookup(object, item.field),
                    );
                }
            }
        }
        scalar => {
            if is_absent(value) {
                if matches!(presence, Presence::Required) {
                    report.push(path, format!("{label} is required"));
                }
                return;
            }
            if let Some(value) = value {
                if let Some(message) = scalar_violation(label, scalar, value) {
                    report.push(path, message);
                }
            }
        }
    }
}

fn scalar_violation(label: &str, kind: FieldKind, value: &Value) -> Option<String> {
    match kind {
        FieldKind::Text => (!value.is_string()).then(|| format!("{label} must be text")),
        FieldKind::Email => (!value.as_str().map(is_email).unwrap_or(false))
            .then(|| format!("{label} must be a valid email address")),
        FieldKind::Date => (!value
            .as_str()
            .map(|raw| parse_date(raw).is_some())
            .unwrap_or(false))
        .then(|| format!("{label} must be a valid date")),
        FieldKind::OneOf(options) => (!scalar_text(value)
            .as_deref()
            .map(|current| options.contains(&current))
            .unwrap_or(false))
        .then(|| format!("{label} must be one of: {}", options.join(", "))),
        FieldKind::File => (!is_file_reference(value))
            .then(|| format!("{label} must reference an uploaded file")),
        FieldKind::Flag | FieldKind::MustAccept | FieldKind::List { .. } => None,
    }
}

/// Field-level validation messages keyed by field path (section prefix omitted).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    errors: BTreeMap<String, String>,
}

impl ValidationReport {
    fn push(&mut self, path: &str, message: String) {
        self.errors.entry(path.to_string()).or_insert(message);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn error(&self, path: &str) -> Option<&str> {
        self.errors.get(path).map(String::as_str)
    }

    pub fn into_result(self) -> Result<(), ValidationFailure> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationFailure {
                errors: self.errors,
            })
        }
    }
}

/// Step data that does not yet satisfy its rules; always recoverable by the applicant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} field(s) failed validation", .errors.len())]
pub struct ValidationFailure {
    pub errors: BTreeMap<String, String>,
}
