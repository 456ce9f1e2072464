// 📝 Profile Draft - the in-memory, unsaved profile being edited
//
// Every scalar field is a String; empty means "unset". Fields are addressed
// by (section, camelCase UI name) so forms can drive them generically.

use crate::entries::{CareerRecord, EducationRecord, EntryList};
use crate::error::ApiError;
use serde::{Deserialize, Serialize};

// ============================================================================
// SECTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Basic,
    Physical,
    Education,
    Career,
    Family,
    PartnerPreference,
    Address,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Basic,
        Section::Physical,
        Section::Education,
        Section::Career,
        Section::Family,
        Section::PartnerPreference,
        Section::Address,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Basic => "basic",
            Section::Physical => "physical",
            Section::Education => "education",
            Section::Career => "career",
            Section::Family => "family",
            Section::PartnerPreference => "partner_preference",
            Section::Address => "address",
        }
    }

    pub fn parse(s: &str) -> Option<Section> {
        Section::ALL.iter().copied().find(|sec| sec.as_str() == s)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Section::Basic => "Basic Information",
            Section::Physical => "Physical Attributes",
            Section::Education => "Education",
            Section::Career => "Career",
            Section::Family => "Family",
            Section::PartnerPreference => "Partner Preference",
            Section::Address => "Address",
        }
    }

    /// Sections edited through an `EntryList` instead of scalar fields
    pub fn is_list(&self) -> bool {
        matches!(self, Section::Education | Section::Career)
    }
}

/// Declares a scalar section: a struct of String fields plus name-based access.
macro_rules! scalar_section {
    ($(#[$meta:meta])* $name:ident { $($field:ident => $ui:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $name {
            $(pub $field: String,)+
        }

        impl $name {
            pub const FIELDS: &'static [&'static str] = &[$($ui),+];

            pub fn get(&self, field: &str) -> Option<&str> {
                match field {
                    $($ui => Some(&self.$field),)+
                    _ => None,
                }
            }

            pub fn get_mut(&mut self, field: &str) -> Option<&mut String> {
                match field {
                    $($ui => Some(&mut self.$field),)+
                    _ => None,
                }
            }

            /// Copy every non-empty field of `other` over this one
            pub fn overlay(&mut self, other: &$name) {
                $(
                    if !other.$field.is_empty() {
                        self.$field = other.$field.clone();
                    }
                )+
            }

            pub fn is_blank(&self) -> bool {
                true $(&& self.$field.is_empty())+
            }
        }
    };
}

scalar_section!(
    /// Step 1
    BasicInfo {
        first_name => "firstName",
        last_name => "lastName",
        gender => "gender",
        date_of_birth => "dateOfBirth",
        on_behalf => "onBehalf",
        marital_status => "maritalStatus",
        children_count => "childrenCount",
        religion => "religion",
        caste => "caste",
        sub_caste => "subCaste",
        mother_tongue => "motherTongue",
        phone => "phone",
        introduction => "introduction",
    }
);

scalar_section!(
    /// Step 2
    PhysicalAttributes {
        height => "height",
        weight => "weight",
        eye_color => "eyeColor",
        hair_color => "hairColor",
        complexion => "complexion",
        blood_group => "bloodGroup",
        body_type => "bodyType",
        disability => "disability",
    }
);

scalar_section!(
    /// Step 5
    FamilyInfo {
        father_name => "fatherName",
        father_occupation => "fatherOccupation",
        mother_name => "motherName",
        mother_occupation => "motherOccupation",
        siblings => "siblings",
        family_type => "familyType",
        family_values => "familyValues",
        family_status => "familyStatus",
    }
);

scalar_section!(
    /// Step 6
    PartnerPreference {
        general => "general",
        partner_min_age => "partnerMinAge",
        partner_max_age => "partnerMaxAge",
        partner_min_height => "partnerMinHeight",
        partner_max_height => "partnerMaxHeight",
        partner_marital_status => "partnerMaritalStatus",
        partner_children_acceptable => "partnerChildrenAcceptable",
        partner_religion => "partnerReligion",
        partner_caste => "partnerCaste",
        partner_mother_tongue => "partnerMotherTongue",
        partner_country => "partnerCountry",
        partner_education => "partnerEducation",
        partner_profession => "partnerProfession",
        partner_complexion => "partnerComplexion",
        partner_body_type => "partnerBodyType",
        partner_family_values => "partnerFamilyValues",
    }
);

scalar_section!(
    /// Only reachable from the settings screen
    AddressInfo {
        present_country => "presentCountry",
        present_state => "presentState",
        present_city => "presentCity",
        present_postal_code => "presentPostalCode",
        permanent_country => "permanentCountry",
        permanent_state => "permanentState",
        permanent_city => "permanentCity",
        permanent_postal_code => "permanentPostalCode",
    }
);

// ============================================================================
// DRAFT
// ============================================================================

/// What the caller has to do after a field change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftEffect {
    None,
    /// Religion changed: caste was cleared and the caste list must be refetched
    LoadCastes(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDraft {
    pub basic: BasicInfo,
    pub physical: PhysicalAttributes,
    pub family: FamilyInfo,
    pub partner: PartnerPreference,
    pub address: AddressInfo,
    pub education: EntryList<EducationRecord>,
    pub career: EntryList<CareerRecord>,
}

impl Default for ProfileDraft {
    fn default() -> Self {
        ProfileDraft {
            basic: BasicInfo::default(),
            physical: PhysicalAttributes::default(),
            family: FamilyInfo::default(),
            partner: PartnerPreference::default(),
            address: AddressInfo::default(),
            education: EntryList::with_blank(),
            career: EntryList::with_blank(),
        }
    }
}

impl ProfileDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field names of a scalar section (empty for list sections)
    pub fn fields(section: Section) -> &'static [&'static str] {
        match section {
            Section::Basic => BasicInfo::FIELDS,
            Section::Physical => PhysicalAttributes::FIELDS,
            Section::Family => FamilyInfo::FIELDS,
            Section::PartnerPreference => PartnerPreference::FIELDS,
            Section::Address => AddressInfo::FIELDS,
            Section::Education | Section::Career => &[],
        }
    }

    pub fn get(&self, section: Section, field: &str) -> Option<&str> {
        match section {
            Section::Basic => self.basic.get(field),
            Section::Physical => self.physical.get(field),
            Section::Family => self.family.get(field),
            Section::PartnerPreference => self.partner.get(field),
            Section::Address => self.address.get(field),
            Section::Education | Section::Career => None,
        }
    }

    fn slot(&mut self, section: Section, field: &str) -> Option<&mut String> {
        match section {
            Section::Basic => self.basic.get_mut(field),
            Section::Physical => self.physical.get_mut(field),
            Section::Family => self.family.get_mut(field),
            Section::PartnerPreference => self.partner.get_mut(field),
            Section::Address => self.address.get_mut(field),
            Section::Education | Section::Career => None,
        }
    }

    /// Set one scalar field.
    ///
    /// Setting `basic.religion` always clears `basic.caste`, even when the
    /// religion did not change.
    pub fn set(&mut self, section: Section, field: &str, value: impl Into<String>) -> Result<DraftEffect, ApiError> {
        let value = value.into();
        let slot = self.slot(section, field).ok_or_else(|| {
            ApiError::Internal(format!("unknown field '{}' in section '{}'", field, section.as_str()))
        })?;
        *slot = value;

        if section == Section::Basic && field == "religion" {
            self.basic.caste.clear();
            return Ok(DraftEffect::LoadCastes(self.basic.religion.clone()));
        }

        Ok(DraftEffect::None)
    }

    /// Copy every non-empty value of `other` over this draft.
    /// Lists are replaced when `other` has anything in them.
    pub fn overlay(&mut self, other: &ProfileDraft) {
        self.basic.overlay(&other.basic);
        self.physical.overlay(&other.physical);
        self.family.overlay(&other.family);
        self.partner.overlay(&other.partner);
        self.address.overlay(&other.address);

        if !other.education.is_blank() {
            self.education = other.education.clone();
        }
        if !other.career.is_blank() {
            self.career = other.career.clone();
        }
    }

    /// Merge registration pre-fill with the fetched server profile.
    ///
    /// Server values win wherever they are non-empty; the pre-fill only
    /// fills the gaps. The result does not depend on which arrived first.
    pub fn resolve(prefill: Option<&ProfileDraft>, server: Option<&ProfileDraft>) -> ProfileDraft {
        let mut draft = prefill.cloned().unwrap_or_default();
        if let Some(server) = server {
            draft.overlay(server);
        }
        draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_religion_change_resets_caste() {
        let mut draft = ProfileDraft::new();
        draft.set(Section::Basic, "caste", "Something").unwrap();

        let effect = draft.set(Section::Basic, "religion", "5").unwrap();

        assert_eq!(draft.basic.religion, "5");
        assert_eq!(draft.basic.caste, "");
        assert_eq!(effect, DraftEffect::LoadCastes("5".to_string()));
    }

    #[test]
    fn test_same_religion_still_resets_caste() {
        let mut draft = ProfileDraft::new();
        draft.set(Section::Basic, "religion", "1").unwrap();
        draft.set(Section::Basic, "caste", "12").unwrap();

        draft.set(Section::Basic, "religion", "1").unwrap();

        assert_eq!(draft.basic.caste, "");
    }

    #[test]
    fn test_other_fields_have_no_effect() {
        let mut draft = ProfileDraft::new();
        let effect = draft.set(Section::PartnerPreference, "partnerReligion", "2").unwrap();
        assert_eq!(effect, DraftEffect::None);
        assert_eq!(draft.partner.partner_religion, "2");
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let mut draft = ProfileDraft::new();
        assert!(draft.set(Section::Physical, "shoeSize", "44").is_err());
        assert!(draft.set(Section::Education, "institute", "IIT").is_err());
    }

    #[test]
    fn test_field_count() {
        let total: usize = Section::ALL.iter().map(|s| ProfileDraft::fields(*s).len()).sum();
        assert_eq!(total, 53);
        use crate::entries::EntryRecord;
        assert_eq!(EducationRecord::FIELDS.len() + CareerRecord::FIELDS.len(), 9);
    }

    #[test]
    fn test_resolve_server_wins_regardless_of_order() {
        let mut prefill = ProfileDraft::new();
        prefill.basic.first_name = "Asha".to_string();
        prefill.basic.phone = "555-0101".to_string();

        let mut server = ProfileDraft::new();
        server.basic.first_name = "Asha Rani".to_string();
        server.physical.height = "165".to_string();

        let draft = ProfileDraft::resolve(Some(&prefill), Some(&server));

        assert_eq!(draft.basic.first_name, "Asha Rani");
        assert_eq!(draft.basic.phone, "555-0101");
        assert_eq!(draft.physical.height, "165");
    }

    #[test]
    fn test_resolve_keeps_blank_list_when_server_has_none() {
        let server = ProfileDraft::new();
        let draft = ProfileDraft::resolve(None, Some(&server));
        assert_eq!(draft.education.len(), 1);
    }

    #[test]
    fn test_section_parse_round_trip() {
        for section in Section::ALL {
            assert_eq!(Section::parse(section.as_str()), Some(section));
        }
        assert_eq!(Section::parse("hobbies"), None);
    }
}
