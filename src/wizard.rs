// 🧭 Profile Completion Wizard - six sequential steps, one section each
//
// Each "Next" saves the current step on the server before moving on. There
// is no rollback: if step 4 fails, steps 1-3 stay saved and the user simply
// retries step 4.

use crate::api::{Payload, ProfileApi};
use crate::draft::{DraftEffect, ProfileDraft, Section};
use crate::dropdown::DropdownResolver;
use crate::entries::{EntryList, EntryRecord};
use crate::error::ApiError;
use crate::submission;
use tracing::{info, warn};

// ============================================================================
// STEPS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Basic = 1,
    Physical = 2,
    Education = 3,
    Career = 4,
    Family = 5,
    PartnerPreference = 6,
}

impl Step {
    pub const COUNT: u8 = 6;

    pub fn from_index(index: u8) -> Option<Step> {
        match index {
            1 => Some(Step::Basic),
            2 => Some(Step::Physical),
            3 => Some(Step::Education),
            4 => Some(Step::Career),
            5 => Some(Step::Family),
            6 => Some(Step::PartnerPreference),
            _ => None,
        }
    }

    pub fn index(&self) -> u8 {
        *self as u8
    }

    pub fn section(&self) -> Section {
        match self {
            Step::Basic => Section::Basic,
            Step::Physical => Section::Physical,
            Step::Education => Section::Education,
            Step::Career => Section::Career,
            Step::Family => Section::Family,
            Step::PartnerPreference => Section::PartnerPreference,
        }
    }

    pub fn for_section(section: Section) -> Option<Step> {
        (1..=Self::COUNT)
            .filter_map(Step::from_index)
            .find(|step| step.section() == section)
    }

    /// UI fields that must be filled before the step can be saved
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Step::Basic => &["firstName", "lastName", "gender", "dateOfBirth", "maritalStatus", "religion"],
            Step::Physical => &["height"],
            Step::Education => &["institute", "degree"],
            Step::Career => &["designation", "company"],
            Step::Family | Step::PartnerPreference => &[],
        }
    }

    /// Client-side check of the required fields for this step
    pub fn validate(&self, draft: &ProfileDraft) -> Result<(), ApiError> {
        match self {
            Step::Education => validate_rows(&draft.education, self.required_fields()),
            Step::Career => validate_rows(&draft.career, self.required_fields()),
            _ => {
                let section = self.section();
                for field in self.required_fields() {
                    if draft.get(section, field).map_or(true, |v| v.trim().is_empty()) {
                        return Err(ApiError::validation(field));
                    }
                }
                Ok(())
            }
        }
    }
}

fn validate_rows<T: EntryRecord>(list: &EntryList<T>, required: &[&str]) -> Result<(), ApiError> {
    for row in list.rows() {
        for field in required {
            if row.get(field).map_or(true, |v| v.trim().is_empty()) {
                return Err(ApiError::validation(field));
            }
        }
    }
    Ok(())
}

// ============================================================================
// STEP SEQUENCER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAdvance {
    /// Moved to this step
    Advanced(u8),
    /// Already on the last step; the caller submits instead
    AtLast,
}

/// Integer step in the closed range `[1, last]`, no wraparound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSequencer {
    current: u8,
    last: u8,
}

impl StepSequencer {
    /// `last` below 1 is treated as 1
    pub fn new(last: u8) -> Self {
        StepSequencer {
            current: 1,
            last: last.max(1),
        }
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    pub fn last(&self) -> u8 {
        self.last
    }

    pub fn is_first(&self) -> bool {
        self.current == 1
    }

    pub fn is_last(&self) -> bool {
        self.current == self.last
    }

    pub fn next(&mut self) -> StepAdvance {
        if self.is_last() {
            return StepAdvance::AtLast;
        }
        self.current += 1;
        StepAdvance::Advanced(self.current)
    }

    /// False (and no change) at step 1
    pub fn previous(&mut self) -> bool {
        if self.is_first() {
            return false;
        }
        self.current -= 1;
        true
    }
}

// ============================================================================
// WIZARD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardProgress {
    /// Step saved, now showing this step
    Moved(Step),
    /// Last step saved, profile complete
    Finished,
}

pub struct ProfileWizard<'a, A: ProfileApi + ?Sized> {
    api: &'a A,
    pub draft: ProfileDraft,
    pub dropdowns: DropdownResolver,
    sequencer: StepSequencer,
    finished: bool,
}

impl<'a, A: ProfileApi + ?Sized> ProfileWizard<'a, A> {
    /// Wizard over an existing draft; no fetches
    pub fn new(api: &'a A, draft: ProfileDraft) -> Self {
        ProfileWizard {
            api,
            draft,
            dropdowns: DropdownResolver::new(),
            sequencer: StepSequencer::new(Step::COUNT),
            finished: false,
        }
    }

    /// Mount the wizard: load dropdowns, fetch the saved profile and merge it
    /// with the registration pre-fill (server values win).
    pub fn open(api: &'a A, prefill: Option<ProfileDraft>) -> Self {
        let mut dropdowns = DropdownResolver::new();
        dropdowns.load(api);

        let server = match api.user_info() {
            Ok(info) => Some(info.draft()),
            Err(e) => {
                warn!("Could not fetch saved profile: {}", e);
                None
            }
        };

        let draft = ProfileDraft::resolve(prefill.as_ref(), server.as_ref());
        if !draft.basic.religion.is_empty() {
            dropdowns.load_castes(api, &draft.basic.religion);
        }

        ProfileWizard {
            api,
            draft,
            dropdowns,
            sequencer: StepSequencer::new(Step::COUNT),
            finished: false,
        }
    }

    pub fn step(&self) -> Step {
        Step::from_index(self.sequencer.current()).unwrap_or(Step::Basic)
    }

    pub fn sequencer(&self) -> &StepSequencer {
        &self.sequencer
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Change one scalar field; a religion change refetches the castes
    pub fn set_field(&mut self, section: Section, field: &str, value: impl Into<String>) -> Result<(), ApiError> {
        if let DraftEffect::LoadCastes(religion_id) = self.draft.set(section, field, value)? {
            self.dropdowns.load_castes(self.api, &religion_id);
        }
        Ok(())
    }

    /// Payload the current step would submit
    pub fn current_payload(&self) -> Payload {
        submission::section_payload(&self.draft, self.step().section())
    }

    /// Validate and save the current step, then advance.
    ///
    /// On any error the step stays where it is.
    pub fn next(&mut self) -> Result<WizardProgress, ApiError> {
        let step = self.step();
        step.validate(&self.draft)?;

        let payload = self.current_payload();
        self.api.submit_profile_step(step.index(), &payload)?;
        info!("Saved profile step {} ({})", step.index(), step.section().as_str());

        match self.sequencer.next() {
            StepAdvance::Advanced(index) => Ok(WizardProgress::Moved(Step::from_index(index).unwrap_or(step))),
            StepAdvance::AtLast => {
                self.finished = true;
                Ok(WizardProgress::Finished)
            }
        }
    }

    /// Back one step without saving; no-op at step 1
    pub fn previous(&mut self) -> bool {
        self.sequencer.previous()
    }

    /// Profile-settings save of any section (the only path for the address)
    pub fn save_section(&self, section: Section) -> Result<(), ApiError> {
        if let Some(step) = Step::for_section(section) {
            step.validate(&self.draft)?;
        }
        let payload = submission::section_payload(&self.draft, section);
        self.api.update_profile(section, &payload)?;
        info!("Saved profile section {}", section.as_str());
        Ok(())
    }
}
