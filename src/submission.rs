// 📤 Submission Adapter - draft sections -> backend request bodies
//
// The backend is inconsistent about key names: some sections are
// snake_case, physical attributes stay camelCase, family uses alternate
// names, partner preference mixes both. The maps below are the external
// contract and must not be "tidied up".
//
// List sections (education, career) are sent as parallel arrays, one array
// per field, not as an array of objects.

use crate::api::Payload;
use crate::draft::{ProfileDraft, Section};
use crate::entries::{CareerRecord, EducationRecord, EntryList, EntryRecord};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

// ============================================================================
// KEY MAPS (ui field -> backend key)
// ============================================================================

const BASIC_KEYS: &[(&str, &str)] = &[
    ("firstName", "first_name"),
    ("lastName", "last_name"),
    ("gender", "gender"),
    ("dateOfBirth", "date_of_birth"),
    ("onBehalf", "on_behalf"),
    ("maritalStatus", "marital_status"),
    ("childrenCount", "no_of_children"),
    ("religion", "religion_id"),
    ("caste", "caste_id"),
    ("subCaste", "sub_caste"),
    ("motherTongue", "mother_tongue"),
    ("phone", "phone"),
    ("introduction", "introduction"),
];

const PHYSICAL_KEYS: &[(&str, &str)] = &[
    ("height", "height"),
    ("weight", "weight"),
    ("eyeColor", "eyeColor"),
    ("hairColor", "hairColor"),
    ("complexion", "complexion"),
    ("bloodGroup", "bloodGroup"),
    ("bodyType", "bodyType"),
    ("disability", "disability"),
];

const FAMILY_KEYS: &[(&str, &str)] = &[
    ("fatherName", "father"),
    ("fatherOccupation", "father_occupation"),
    ("motherName", "mother"),
    ("motherOccupation", "mother_occupation"),
    ("siblings", "sibling"),
    ("familyType", "family_type"),
    ("familyValues", "family_values"),
    ("familyStatus", "family_status"),
];

const PARTNER_KEYS: &[(&str, &str)] = &[
    ("general", "general"),
    ("partnerMinAge", "min_age"),
    ("partnerMaxAge", "max_age"),
    ("partnerMinHeight", "min_height"),
    ("partnerMaxHeight", "max_height"),
    ("partnerMaritalStatus", "partner_marital_status"),
    ("partnerChildrenAcceptable", "children_acceptable"),
    ("partnerReligion", "partner_religion_id"),
    ("partnerCaste", "partner_caste_id"),
    ("partnerMotherTongue", "partner_mother_tongue"),
    ("partnerCountry", "residenceCountry"),
    ("partnerEducation", "partner_education"),
    ("partnerProfession", "partner_profession"),
    ("partnerComplexion", "complexion"),
    ("partnerBodyType", "body_type"),
    ("partnerFamilyValues", "family_value"),
];

const ADDRESS_KEYS: &[(&str, &str)] = &[
    ("presentCountry", "present_country_id"),
    ("presentState", "present_state"),
    ("presentCity", "present_city"),
    ("presentPostalCode", "present_postal_code"),
    ("permanentCountry", "permanent_country_id"),
    ("permanentState", "permanent_state"),
    ("permanentCity", "permanent_city"),
    ("permanentPostalCode", "permanent_postal_code"),
];

const EDUCATION_KEYS: &[(&str, &str)] = &[
    ("institute", "institute"),
    ("degree", "degree"),
    ("fieldOfStudy", "field_of_study"),
    ("start", "start"),
    ("end", "end"),
];

const CAREER_KEYS: &[(&str, &str)] = &[
    ("designation", "designation"),
    ("company", "company"),
    ("start", "start"),
    ("end", "end"),
];

/// UI field -> backend key pairs for a section
pub fn key_map(section: Section) -> &'static [(&'static str, &'static str)] {
    match section {
        Section::Basic => BASIC_KEYS,
        Section::Physical => PHYSICAL_KEYS,
        Section::Education => EDUCATION_KEYS,
        Section::Career => CAREER_KEYS,
        Section::Family => FAMILY_KEYS,
        Section::PartnerPreference => PARTNER_KEYS,
        Section::Address => ADDRESS_KEYS,
    }
}

/// Backend key for a UI field
pub fn backend_key(section: Section, ui_field: &str) -> Option<&'static str> {
    key_map(section)
        .iter()
        .find(|(ui, _)| *ui == ui_field)
        .map(|(_, backend)| *backend)
}

// ============================================================================
// DRAFT -> PAYLOAD
// ============================================================================

/// Request body for one section of the draft
pub fn section_payload(draft: &ProfileDraft, section: Section) -> Payload {
    let payload = match section {
        Section::Education => list_payload(&draft.education, EDUCATION_KEYS),
        Section::Career => list_payload(&draft.career, CAREER_KEYS),
        scalar => scalar_payload(draft, scalar),
    };
    debug!("Built {} payload with {} keys", section.as_str(), payload.len());
    payload
}

/// Scalar sections: renamed keys, blank values dropped, the rest sent as typed
fn scalar_payload(draft: &ProfileDraft, section: Section) -> Payload {
    let mut payload = Payload::new();
    for (ui, backend) in key_map(section) {
        let value = draft.get(section, ui).unwrap_or_default();
        if value.trim().is_empty() {
            continue;
        }
        payload.insert(backend.to_string(), Value::String(value.to_string()));
    }
    payload
}

/// List sections: one array per field, empty cells kept so arrays stay aligned
fn list_payload<T: EntryRecord>(list: &EntryList<T>, keys: &[(&str, &str)]) -> Payload {
    let mut payload = Payload::new();
    for (ui, backend) in keys {
        let column = list.column(ui).into_iter().map(Value::String).collect();
        payload.insert(backend.to_string(), Value::Array(column));
    }
    payload
}

// ============================================================================
// PAYLOAD -> DRAFT
// ============================================================================

/// Copy a saved section payload back into the draft.
///
/// Unknown keys are ignored; numbers and booleans are stringified.
pub fn absorb(section: Section, payload: &Payload, draft: &mut ProfileDraft) {
    match section {
        Section::Education => draft.education = absorb_list::<EducationRecord>(payload, EDUCATION_KEYS),
        Section::Career => draft.career = absorb_list::<CareerRecord>(payload, CAREER_KEYS),
        scalar => {
            for (ui, backend) in key_map(scalar) {
                if let Some(value) = payload.get(*backend).and_then(as_text) {
                    // Key maps only name known fields, so this cannot fail.
                    let _ = draft.set(scalar, ui, value);
                }
            }
        }
    }
}

fn absorb_list<T: EntryRecord>(payload: &Payload, keys: &[(&str, &str)]) -> EntryList<T> {
    let columns: Vec<(&str, Vec<String>)> = keys
        .iter()
        .map(|(ui, backend)| {
            let cells = payload
                .get(*backend)
                .and_then(Value::as_array)
                .map(|arr| arr.iter().map(|v| as_text(v).unwrap_or_default()).collect())
                .unwrap_or_default();
            (*ui, cells)
        })
        .collect();

    let rows = columns.iter().map(|(_, cells)| cells.len()).max().unwrap_or(0);
    if rows == 0 {
        return EntryList::with_blank();
    }

    let mut list = EntryList::<T>::new();
    for index in 0..rows {
        list.append();
        for (ui, cells) in &columns {
            if let Some(cell) = cells.get(index) {
                let _ = list.update_field(index, ui, cell.clone());
            }
        }
    }
    list
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Rebuild a whole draft from saved sections keyed by section name
pub fn draft_from_sections(sections: &BTreeMap<String, Payload>) -> ProfileDraft {
    let mut draft = ProfileDraft::new();
    for (name, payload) in sections {
        match Section::parse(name) {
            Some(section) => absorb(section, payload, &mut draft),
            None => debug!("Ignoring unknown section '{}'", name),
        }
    }
    draft
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_education_parallel_arrays() {
        let mut draft = ProfileDraft::new();
        draft.education = EntryList::from_rows(vec![EducationRecord {
            institute: "X".to_string(),
            degree: "Y".to_string(),
            field_of_study: String::new(),
            start: "2016".to_string(),
            end: "2020".to_string(),
        }]);

        let payload = section_payload(&draft, Section::Education);

        assert_eq!(
            Value::Object(payload),
            json!({
                "institute": ["X"],
                "degree": ["Y"],
                "field_of_study": [""],
                "start": ["2016"],
                "end": ["2020"],
            })
        );
    }

    #[test]
    fn test_career_arrays_stay_aligned() {
        let mut draft = ProfileDraft::new();
        draft.career.update_field(0, "company", "Acme").unwrap();
        draft.career.append();
        draft.career.update_field(1, "designation", "Engineer").unwrap();

        let payload = section_payload(&draft, Section::Career);

        assert_eq!(payload["company"], json!(["Acme", ""]));
        assert_eq!(payload["designation"], json!(["", "Engineer"]));
        assert_eq!(payload["start"], json!(["", ""]));
    }

    #[test]
    fn test_scalar_keys_renamed_and_empties_stripped() {
        let mut draft = ProfileDraft::new();
        draft.basic.first_name = "Meera".to_string();
        draft.basic.religion = "1".to_string();
        draft.basic.caste = "  ".to_string();
        draft.physical.eye_color = "Brown".to_string();
        draft.family.father_name = "Suresh".to_string();

        let basic = section_payload(&draft, Section::Basic);
        assert_eq!(Value::Object(basic), json!({"first_name": "Meera", "religion_id": "1"}));

        let physical = section_payload(&draft, Section::Physical);
        assert_eq!(Value::Object(physical), json!({"eyeColor": "Brown"}));

        let family = section_payload(&draft, Section::Family);
        assert_eq!(Value::Object(family), json!({"father": "Suresh"}));
    }

    #[test]
    fn test_free_text_sent_unchanged() {
        let mut draft = ProfileDraft::new();
        draft.basic.introduction = "  Hello!\n\nI love music.  ".to_string();

        let basic = section_payload(&draft, Section::Basic);
        assert_eq!(basic["introduction"], json!("  Hello!\n\nI love music.  "));
    }

    #[test]
    fn test_emptied_lists_send_empty_arrays() {
        let mut draft = ProfileDraft::new();
        draft.education = EntryList::with_blank();
        draft.career = EntryList::with_blank();
        assert!(draft.education.remove(0).is_some());
        assert!(draft.career.remove(0).is_some());

        let education = section_payload(&draft, Section::Education);
        assert_eq!(
            Value::Object(education),
            json!({"institute": [], "degree": [], "field_of_study": [], "start": [], "end": []})
        );

        let career = section_payload(&draft, Section::Career);
        assert_eq!(
            Value::Object(career),
            json!({"designation": [], "company": [], "start": [], "end": []})
        );
    }

    #[test]
    fn test_partner_keys_mixed_case() {
        let mut draft = ProfileDraft::new();
        draft.partner.partner_country = "2".to_string();
        draft.partner.partner_min_age = "25".to_string();

        let payload = section_payload(&draft, Section::PartnerPreference);
        assert_eq!(Value::Object(payload), json!({"min_age": "25", "residenceCountry": "2"}));
    }

    #[test]
    fn test_absorb_scalar_and_list() {
        let mut sections = BTreeMap::new();
        sections.insert(
            "basic".to_string(),
            json!({"first_name": "Meera", "religion_id": 1, "caste_id": 12, "unknown": "x"})
                .as_object()
                .unwrap()
                .clone(),
        );
        sections.insert(
            "education".to_string(),
            json!({"institute": ["A", "B"], "degree": ["BSc"]}).as_object().unwrap().clone(),
        );

        let draft = draft_from_sections(&sections);

        assert_eq!(draft.basic.first_name, "Meera");
        assert_eq!(draft.basic.religion, "1");
        // caste_id comes after religion_id in the key map, so it survives the reset
        assert_eq!(draft.basic.caste, "12");
        assert_eq!(draft.education.len(), 2);
        assert_eq!(draft.education.get(1).unwrap().institute, "B");
        assert_eq!(draft.education.get(1).unwrap().degree, "");
        assert_eq!(draft.career.len(), 1);
    }

    #[test]
    fn test_payload_then_absorb_preserves_section() {
        let mut draft = ProfileDraft::new();
        draft.address.present_city = "Pune".to_string();
        draft.address.permanent_country = "1".to_string();

        let payload = section_payload(&draft, Section::Address);
        let mut restored = ProfileDraft::new();
        absorb(Section::Address, &payload, &mut restored);

        assert_eq!(restored.address, draft.address);
    }

    #[test]
    fn test_key_maps_cover_every_field() {
        for section in Section::ALL {
            if section.is_list() {
                continue;
            }
            for field in ProfileDraft::fields(section) {
                assert!(backend_key(section, field).is_some(), "{} has no backend key", field);
            }
        }
    }
}
