use super::domain::{ApplicationRecord, Position, SectionKey, StepId, SubStepId};
use super::rules::{Condition, FieldRuleSet, RuleTable};

/// Internal stage of a partitioned step, optionally gated on a discriminator.
#[derive(Debug, Clone, Copy)]
pub struct SubStepSchema {
    pub id: SubStepId,
    pub when: Option<Condition>,
}

#[derive(Debug, Clone)]
pub struct StepSchema {
    pub id: StepId,
    pub sections: &'static [SectionKey],
    /// Empty for steps with a single implicit sub-step.
    pub sub_steps: &'static [SubStepSchema],
}

impl StepSchema {
    pub fn owns(&self, section: SectionKey) -> bool {
        self.sections.contains(&section)
    }
}

/// Fixed step order plus the rule table the steps are validated with.
#[derive(Debug, Clone)]
pub struct WizardBlueprint {
    steps: Vec<StepSchema>,
    rules: RuleTable,
}

impl Default for WizardBlueprint {
    fn default() -> Self {
        Self::standard()
    }
}

impl WizardBlueprint {
    pub fn standard() -> Self {
        Self {
            steps: standard_steps(),
            rules: RuleTable::standard(),
        }
    }

    pub fn steps(&self) -> &[StepSchema] {
        &self.steps
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn step(&self, id: StepId) -> Option<&StepSchema> {
        self.steps.iter().find(|step| step.id == id)
    }

    pub fn sections_of(&self, id: StepId) -> &'static [SectionKey] {
        self.step(id).map(|step| step.sections).unwrap_or(&[])
    }

    /// Sub-steps presented for `step` given the record's discriminators.
    pub fn active_sub_steps(&self, step: StepId, record: &ApplicationRecord) -> Vec<SubStepId> {
        let Some(schema) = self.step(step) else {
            return Vec::new();
        };
        if schema.sub_steps.is_empty() {
            return vec![SubStepId::Whole];
        }
        schema
            .sub_steps
            .iter()
            .filter(|sub_step| {
                sub_step
                    .when
                    .map(|condition| condition.holds(record))
                    .unwrap_or(true)
            })
            .map(|sub_step| sub_step.id)
            .collect()
    }

    /// Rules that must pass before leaving `position`.
    pub fn rule_set(&self, position: Position) -> FieldRuleSet<'static> {
        self.rules
            .rule_set(self.sections_of(position.step), position.sub_step)
    }

    pub fn contains(&self, position: Position, record: &ApplicationRecord) -> bool {
        self.active_sub_steps(position.step, record)
            .contains(&position.sub_step)
    }

    pub fn first_position_of(&self, step: StepId, record: &ApplicationRecord) -> Position {
        let sub_step = self
            .active_sub_steps(step, record)
            .first()
            .copied()
            .unwrap_or(SubStepId::Whole);
        Position::new(step, sub_step)
    }

    pub fn last_position_of(&self, step: StepId, record: &ApplicationRecord) -> Position {
        let sub_step = self
            .active_sub_steps(step, record)
            .last()
            .copied()
            .unwrap_or(SubStepId::Whole);
        Position::new(step, sub_step)
    }

    pub fn first_position(&self, record: &ApplicationRecord) -> Position {
        self.first_position_of(StepId::PersonalDetails, record)
    }

    pub fn last_position(&self, record: &ApplicationRecord) -> Position {
        self.last_position_of(StepId::Terms, record)
    }

    /// Map a position whose sub-step is no longer active onto the step's first active sub-step.
    pub fn normalize(&self, position: Position, record: &ApplicationRecord) -> Position {
        if self.contains(position, record) {
            position
        } else {
            self.first_position_of(position.step, record)
        }
    }

    /// Next sub-step of the current step, else the first sub-step of the next step.
    pub fn following(&self, position: Position, record: &ApplicationRecord) -> Option<Position> {
        let active = self.active_sub_steps(position.step, record);
        if let Some(index) = active.iter().position(|id| *id == position.sub_step) {
            if let Some(next) = active.get(index + 1) {
                return Some(Position::new(position.step, *next));
            }
        }
        self.neighbour_step(position.step, 1)
            .map(|step| self.first_position_of(step, record))
    }

    /// Previous sub-step of the current step, else the last sub-step of the previous step.
    pub fn preceding(&self, position: Position, record: &ApplicationRecord) -> Option<Position> {
        let active = self.active_sub_steps(position.step, record);
        if let Some(index) = active.iter().position(|id| *id == position.sub_step) {
            if index > 0 {
                return Some(Position::new(position.step, active[index - 1]));
            }
        }
        self.neighbour_step(position.step, -1)
            .map(|step| self.last_position_of(step, record))
    }

    fn neighbour_step(&self, step: StepId, offset: isize) -> Option<StepId> {
        let index = self.steps.iter().position(|schema| schema.id == step)?;
        let target = index.checked_add_signed(offset)?;
        self.steps.get(target).map(|schema| schema.id)
    }
}

const EDUCATION_SUB_STEPS: &[SubStepSchema] = &[
    SubStepSchema {
        id: SubStepId::LanguageQualification,
        when: Some(Condition::equals(
            SectionKey::PersonalDetails,
            "studentType",
            "international",
        )),
    },
    SubStepSchema {
        id: SubStepId::AcademicQualifications,
        when: None,
    },
];

fn standard_steps() -> Vec<StepSchema> {
    vec![
        StepSchema {
            id: StepId::PersonalDetails,
            sections: &[SectionKey::PersonalDetails],
            sub_steps: &[],
        },
        StepSchema {
            id: StepId::AddressAndContact,
            sections: &[
                SectionKey::AddressData,
                SectionKey::ContactData,
                SectionKey::EmergencyContactData,
            ],
            sub_steps: &[],
        },
        StepSchema {
            id: StepId::Compliance,
            sections: &[SectionKey::ComplianceData],
            sub_steps: &[],
        },
        StepSchema {
            id: StepId::Education,
            sections: &[SectionKey::EducationData],
            sub_steps: EDUCATION_SUB_STEPS,
        },
        StepSchema {
            id: StepId::Employment,
            sections: &[SectionKey::EmploymentData],
            sub_steps: &[],
        },
        StepSchema {
            id: StepId::Documents,
            sections: &[SectionKey::DocumentsData],
            sub_steps: &[],
        },
        StepSchema {
            id: StepId::CourseAndFunding,
            sections: &[SectionKey::CourseDetailsData, SectionKey::FundingData],
            sub_steps: &[],
        },
        StepSchema {
            id: StepId::Terms,
            sections: &[SectionKey::TermsData],
            sub_steps: &[],
        },
    ]
}
