use super::{Condition, FieldKind, FieldRule, FieldRuleSet, ItemRule};
use crate::workflows::intake::domain::{SectionKey, SubStepId};

use FieldKind::{Date, Email, File, Flag, MustAccept, OneOf, Text};
use SectionKey::{
    AddressData, ComplianceData, ContactData, CourseDetailsData, DocumentsData, EducationData,
    EmergencyContactData, EmploymentData, FundingData, PersonalDetails, TermsData,
};

const YES_NO: &[&str] = &["yes", "no"];
const STUDENT_TYPES: &[&str] = &["eu", "international"];
const GENDERS: &[&str] = &["female", "male", "non-binary", "prefer-not-to-say"];
const SETTLEMENT_STATUSES: &[&str] = &["settled", "pre-settled", "none"];
const IMMIGRATION_STATUSES: &[&str] = &["citizen", "settled", "pre-settled", "other"];
const ENGLISH_TESTS: &[&str] = &["IELTS", "TOEFL", "PTE", "Duolingo", "Other"];
const STUDY_MODES: &[&str] = &["full-time", "part-time"];
const FUNDING_TYPES: &[&str] = &["Self", "Student Loan", "Employer", "Scholarship"];

const INTERNATIONAL: Condition =
    Condition::equals(PersonalDetails, "studentType", "international");
const EU: Condition = Condition::equals(PersonalDetails, "studentType", "eu");
const EMPLOYED: Condition = Condition::equals(EmploymentData, "isEmployed", "yes");

const EDUCATION_ENTRY: &[ItemRule] = &[
    ItemRule::required("institution", "Institution", Text),
    ItemRule::required("qualification", "Qualification", Text),
    ItemRule::required("subject", "Subject", Text),
    ItemRule::required("startDate", "Start date", Date),
    ItemRule::optional("endDate", "End date", Date),
];

const EMPLOYMENT_ENTRY: &[ItemRule] = &[
    ItemRule::required("employer", "Employer", Text),
    ItemRule::required("jobTitle", "Job title", Text),
    ItemRule::required("startDate", "Start date", Date),
    ItemRule::required("endDate", "End date", Date),
];

static STANDARD_RULES: &[FieldRule] = &[
    // personal details
    FieldRule::required(PersonalDetails, "firstName", "First name", Text),
    FieldRule::required(PersonalDetails, "lastName", "Last name", Text),
    FieldRule::required(PersonalDetails, "dateOfBirth", "Date of birth", Date),
    FieldRule::required(PersonalDetails, "gender", "Gender", OneOf(GENDERS)),
    FieldRule::required(
        PersonalDetails,
        "studentType",
        "Student type",
        OneOf(STUDENT_TYPES),
    ),
    FieldRule::required(PersonalDetails, "nationality", "Nationality", Text).when(INTERNATIONAL),
    FieldRule::required(
        PersonalDetails,
        "euSettlementStatus",
        "EU settlement status",
        OneOf(SETTLEMENT_STATUSES),
    )
    .when(EU),
    // address & contact
    FieldRule::required(AddressData, "addressLine1", "Address line 1", Text),
    FieldRule::optional(AddressData, "addressLine2", "Address line 2", Text),
    FieldRule::required(AddressData, "city", "City", Text),
    FieldRule::required(AddressData, "postcode", "Postcode", Text),
    FieldRule::required(AddressData, "country", "Country", Text),
    FieldRule::required(ContactData, "email", "Email", Email),
    FieldRule::required(ContactData, "phone", "Phone number", Text),
    FieldRule::required(
        EmergencyContactData,
        "emergencyContactName",
        "Emergency contact name",
        Text,
    ),
    FieldRule::required(
        EmergencyContactData,
        "emergencyContactRelationship",
        "Emergency contact relationship",
        Text,
    ),
    FieldRule::required(
        EmergencyContactData,
        "emergencyContactPhone",
        "Emergency contact phone",
        Text,
    ),
    // compliance
    FieldRule::required(ComplianceData, "visaRequired", "Visa required", OneOf(YES_NO))
        .when(INTERNATIONAL),
    FieldRule::required(
        ComplianceData,
        "visaRefusal",
        "Previous visa refusal",
        OneOf(YES_NO),
    ),
    FieldRule::required(
        ComplianceData,
        "visaRefusalDetail",
        "Visa refusal details",
        Text,
    )
    .when(Condition::equals(ComplianceData, "visaRefusal", "yes")),
    FieldRule::required(
        ComplianceData,
        "immigrationStatus",
        "Immigration status",
        OneOf(IMMIGRATION_STATUSES),
    )
    .when(EU),
    FieldRule::required(ComplianceData, "disability", "Disability", OneOf(YES_NO)),
    FieldRule::required(
        ComplianceData,
        "disabilityDetails",
        "Disability details",
        Text,
    )
    .when(Condition::equals(ComplianceData, "disability", "yes")),
    FieldRule::optional(
        ComplianceData,
        "criminalConviction",
        "Criminal conviction",
        Flag,
    ),
    // education: language test first, academic records second
    FieldRule::required(
        EducationData,
        "englishTestType",
        "English test",
        OneOf(ENGLISH_TESTS),
    )
    .in_sub_step(SubStepId::LanguageQualification),
    FieldRule::required(EducationData, "englishTestScore", "English test score", Text)
        .in_sub_step(SubStepId::LanguageQualification),
    FieldRule::required(EducationData, "englishTestDate", "English test date", Date)
        .in_sub_step(SubStepId::LanguageQualification),
    FieldRule::required(
        EducationData,
        "educationData",
        "Education history",
        FieldKind::List {
            min_items: 1,
            items: EDUCATION_ENTRY,
        },
    )
    .in_sub_step(SubStepId::AcademicQualifications),
    // employment
    FieldRule::required(EmploymentData, "isEmployed", "Currently employed", OneOf(YES_NO)),
    FieldRule::required(
        EmploymentData,
        "currentEmployment.employer",
        "Employer",
        Text,
    )
    .when(EMPLOYED),
    FieldRule::required(
        EmploymentData,
        "currentEmployment.jobTitle",
        "Job title",
        Text,
    )
    .when(EMPLOYED),
    FieldRule::required(
        EmploymentData,
        "currentEmployment.startDate",
        "Employment start date",
        Date,
    )
    .when(EMPLOYED),
    FieldRule::required(
        EmploymentData,
        "currentEmployment.employerAddress",
        "Employer address",
        Text,
    )
    .when(EMPLOYED),
    FieldRule::required(
        EmploymentData,
        "hasPreviousEmployment",
        "Previous employment",
        OneOf(YES_NO),
    ),
    FieldRule::required(
        EmploymentData,
        "previousEmployments",
        "Previous employments",
        FieldKind::List {
            min_items: 1,
            items: EMPLOYMENT_ENTRY,
        },
    )
    .when(Condition::equals(
        EmploymentData,
        "hasPreviousEmployment",
        "yes",
    )),
    // documents
    FieldRule::required(DocumentsData, "passportDocument", "Passport", File),
    FieldRule::required(DocumentsData, "visaDocument", "Visa", File).when(INTERNATIONAL),
    FieldRule::optional(DocumentsData, "cvDocument", "CV", File),
    // course & funding
    FieldRule::required(CourseDetailsData, "courseId", "Course", Text),
    FieldRule::required(CourseDetailsData, "intakeId", "Intake", Text),
    FieldRule::required(
        CourseDetailsData,
        "studyMode",
        "Study mode",
        OneOf(STUDY_MODES),
    ),
    FieldRule::required(
        FundingData,
        "fundingType",
        "Funding type",
        OneOf(FUNDING_TYPES),
    ),
    FieldRule::required(FundingData, "employerName", "Sponsoring employer", Text)
        .when(Condition::equals(FundingData, "fundingType", "Employer")),
    FieldRule::required(
        FundingData,
        "employerContactEmail",
        "Sponsor contact email",
        Email,
    )
    .when(Condition::equals(FundingData, "fundingType", "Employer")),
    // terms
    FieldRule::required(TermsData, "acceptTerms", "Terms and conditions", MustAccept),
    FieldRule::required(TermsData, "acceptPrivacyPolicy", "Privacy policy", MustAccept),
    FieldRule::optional(TermsData, "marketingOptIn", "Marketing preferences", Flag),
];

/// The one declarative table every step, sub-step and resume check draws from.
#[derive(Debug, Clone, Copy)]
pub struct RuleTable {
    rules: &'static [FieldRule],
}

impl RuleTable {
    pub fn standard() -> Self {
        Self {
            rules: STANDARD_RULES,
        }
    }

    pub fn rules(&self) -> &'static [FieldRule] {
        self.rules
    }

    pub fn lookup(&self, section: SectionKey, field: &str) -> Option<&'static FieldRule> {
        self.rules
            .iter()
            .find(|rule| rule.section == section && rule.field == field)
    }

    /// Rules owned by `sections` and tagged with `sub_step`.
    pub fn rule_set(&self, sections: &[SectionKey], sub_step: SubStepId) -> FieldRuleSet<'static> {
        FieldRuleSet::new(
            self.rules
                .iter()
                .filter(|rule| sections.contains(&rule.section) && rule.sub_step == sub_step)
                .collect(),
        )
    }
}
