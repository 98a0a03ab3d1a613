use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key/value body of a single record section.
pub type SectionValues = Map<String, Value>;

/// Identifier wrapper for applicants moving through the intake wizard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicantId(pub String);

impl fmt::Display for ApplicantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named groups of related fields inside an application record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKey {
    PersonalDetails,
    AddressData,
    ContactData,
    EmergencyContactData,
    ComplianceData,
    DocumentsData,
    EmploymentData,
    EducationData,
    CourseDetailsData,
    FundingData,
    TermsData,
}

impl SectionKey {
    pub const fn ordered() -> [Self; 11] {
        [
            Self::PersonalDetails,
            Self::AddressData,
            Self::ContactData,
            Self::EmergencyContactData,
            Self::ComplianceData,
            Self::DocumentsData,
            Self::EmploymentData,
            Self::EducationData,
            Self::CourseDetailsData,
            Self::FundingData,
            Self::TermsData,
        ]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PersonalDetails => "personalDetails",
            Self::AddressData => "addressData",
            Self::ContactData => "contactData",
            Self::EmergencyContactData => "emergencyContactData",
            Self::ComplianceData => "complianceData",
            Self::DocumentsData => "documentsData",
            Self::EmploymentData => "employmentData",
            Self::EducationData => "educationData",
            Self::CourseDetailsData => "courseDetailsData",
            Self::FundingData => "fundingData",
            Self::TermsData => "termsData",
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wizard stages in their fixed declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    PersonalDetails,
    AddressAndContact,
    Compliance,
    Education,
    Employment,
    Documents,
    CourseAndFunding,
    Terms,
}

impl StepId {
    pub const fn ordered() -> [Self; 8] {
        [
            Self::PersonalDetails,
            Self::AddressAndContact,
            Self::Compliance,
            Self::Education,
            Self::Employment,
            Self::Documents,
            Self::CourseAndFunding,
            Self::Terms,
        ]
    }

    /// One-based position of the step in the wizard.
    pub const fn number(self) -> u8 {
        match self {
            Self::PersonalDetails => 1,
            Self::AddressAndContact => 2,
            Self::Compliance => 3,
            Self::Education => 4,
            Self::Employment => 5,
            Self::Documents => 6,
            Self::CourseAndFunding => 7,
            Self::Terms => 8,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::PersonalDetails => "Personal Details",
            Self::AddressAndContact => "Address & Contact",
            Self::Compliance => "Compliance",
            Self::Education => "Education",
            Self::Employment => "Employment",
            Self::Documents => "Documents",
            Self::CourseAndFunding => "Course & Funding",
            Self::Terms => "Terms & Conditions",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Internal stage of a step. Steps without a partition use `Whole`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubStepId {
    Whole,
    LanguageQualification,
    AcademicQualifications,
}

impl SubStepId {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Whole => "",
            Self::LanguageQualification => "Language Qualification",
            Self::AcademicQualifications => "Academic Qualifications",
        }
    }
}

/// Tagged wizard position; always carries a sub-step, `Whole` for unpartitioned steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub step: StepId,
    #[serde(default = "whole_sub_step")]
    pub sub_step: SubStepId,
}

fn whole_sub_step() -> SubStepId {
    SubStepId::Whole
}

impl Position {
    pub const fn new(step: StepId, sub_step: SubStepId) -> Self {
        Self { step, sub_step }
    }

    pub const fn whole(step: StepId) -> Self {
        Self::new(step, SubStepId::Whole)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sub_step {
            SubStepId::Whole => write!(f, "{} ({})", self.step.label(), self.step.number()),
            sub_step => write!(
                f,
                "{} ({}) / {}",
                self.step.label(),
                self.step.number(),
                sub_step.label()
            ),
        }
    }
}

/// Accumulated, section-keyed application data built up across steps.
///
/// Sections are kept as plain JSON objects so partial writes can be merged field by field.
/// Top-level keys the wizard does not own are preserved untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub is_reviewed: bool,
    #[serde(flatten)]
    fields: BTreeMap<String, Value>,
}

impl ApplicationRecord {
    pub fn section(&self, key: SectionKey) -> Option<&SectionValues> {
        self.fields.get(key.as_str()).and_then(Value::as_object)
    }

    /// Overlay `values` onto the section field by field.
    pub fn merge_section(&mut self, key: SectionKey, values: &SectionValues) {
        let slot = self
            .fields
            .entry(key.as_str().to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(existing) = slot {
            for (field, value) in values {
                existing.insert(field.clone(), value.clone());
            }
        }
    }

    pub fn merge_draft(&mut self, draft: &StepDraft) {
        for (key, values) in draft.sections() {
            self.merge_section(key, values);
        }
    }

    /// Copy of the record with `draft` overlaid, leaving `self` untouched.
    pub fn with_draft(&self, draft: &StepDraft) -> Self {
        let mut merged = self.clone();
        merged.merge_draft(draft);
        merged
    }

    /// Apply a top-level partial update as the remote store would.
    pub fn apply_patch(&mut self, patch: &RecordPatch) {
        for (key, value) in patch.fields() {
            match key.as_str() {
                "isCompleted" => self.is_completed = value.as_bool().unwrap_or(false),
                "isReviewed" => self.is_reviewed = value.as_bool().unwrap_or(false),
                _ => {
                    self.fields.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Resolve a dotted field path (`currentEmployment.employer`) inside a section.
    pub fn value_at(&self, key: SectionKey, path: &str) -> Option<&Value> {
        self.section(key)
            .and_then(|values| super::rules::lookup(values, path))
    }

    pub fn text(&self, key: SectionKey, path: &str) -> Option<&str> {
        self.value_at(key, path)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// True when no section carries any value, i.e. a brand new applicant.
    pub fn is_blank(&self) -> bool {
        SectionKey::ordered().into_iter().all(|key| {
            self.section(key)
                .map(|values| {
                    values
                        .values()
                        .all(|value| super::rules::is_absent(Some(value)))
                })
                .unwrap_or(true)
        })
    }
}

/// In-progress values for the sections owned by the active step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepDraft {
    sections: BTreeMap<SectionKey, SectionValues>,
}

impl StepDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(mut self, key: SectionKey, values: SectionValues) -> Self {
        self.sections.insert(key, values);
        self
    }

    /// Stage a single top-level field of a section.
    pub fn set(&mut self, key: SectionKey, field: &str, value: impl Into<Value>) {
        self.sections
            .entry(key)
            .or_default()
            .insert(field.to_string(), value.into());
    }

    pub fn section(&self, key: SectionKey) -> Option<&SectionValues> {
        self.sections.get(&key)
    }

    pub fn sections(&self) -> impl Iterator<Item = (SectionKey, &SectionValues)> {
        self.sections.iter().map(|(key, values)| (*key, values))
    }

    pub fn section_keys(&self) -> Vec<SectionKey> {
        self.sections.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Drop sections outside `allowed`, returning the keys that were removed.
    pub fn retain_sections(&mut self, allowed: &[SectionKey]) -> Vec<SectionKey> {
        let dropped: Vec<SectionKey> = self
            .sections
            .keys()
            .filter(|key| !allowed.contains(key))
            .copied()
            .collect();
        self.sections.retain(|key, _| allowed.contains(key));
        dropped
    }

    /// Fill fields from `staged` that this draft does not already carry.
    pub fn absorb_missing(&mut self, staged: &StepDraft) {
        for (key, values) in staged.sections() {
            let target = self.sections.entry(key).or_default();
            for (field, value) in values {
                target
                    .entry(field.clone())
                    .or_insert_with(|| value.clone());
            }
        }
    }
}

/// Top-level partial update sent to the persistence gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordPatch(Map<String, Value>);

impl RecordPatch {
    /// Patch carrying the full merged body of each listed section.
    pub fn sections(record: &ApplicationRecord, keys: &[SectionKey]) -> Self {
        let mut fields = Map::new();
        for key in keys {
            let body = record.section(*key).cloned().unwrap_or_default();
            fields.insert(key.as_str().to_string(), Value::Object(body));
        }
        Self(fields)
    }

    /// Whole record with `isCompleted` raised, sent as one update on submission.
    pub fn completion(record: &ApplicationRecord) -> Self {
        let mut fields: Map<String, Value> = record
            .fields
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        fields.insert("isCompleted".to_string(), Value::Bool(true));
        Self(fields)
    }

    pub fn reviewed() -> Self {
        let mut fields = Map::new();
        fields.insert("isReviewed".to_string(), Value::Bool(true));
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn keys(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }
}

/// Reference returned by the upload gateway; the wizard never holds file bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReference {
    pub file_url: String,
    pub file_name: String,
}

/// File handed to the upload gateway by a document-bearing section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Course/intake pair remembered locally before the wizard started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEnrollment {
    pub course_id: String,
    pub intake_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRequest {
    pub course_id: String,
    pub intake_id: String,
    pub applicant_id: ApplicantId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRecord {
    pub enrollment_id: String,
    pub course_id: String,
    pub intake_id: String,
    pub applicant_id: ApplicantId,
}
