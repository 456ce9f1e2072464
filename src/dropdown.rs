// 🔽 Dropdown Resolver - reference lists and id <-> name mapping
//
// Forms display names but submit ids. Religions, countries and marital
// statuses are fetched once; castes are a secondary list that is replaced
// every time the selected religion changes.

use crate::api::ProfileApi;
use crate::draft::Section;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownOption {
    pub id: String,
    pub name: String,
}

impl DropdownOption {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        DropdownOption {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Payload of `getDropdownOptions()`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownOptions {
    #[serde(default)]
    pub religions: Vec<DropdownOption>,
    #[serde(default)]
    pub countries: Vec<DropdownOption>,
    #[serde(default)]
    pub marital_statuses: Vec<DropdownOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropdownKind {
    Religion,
    Caste,
    Country,
    MaritalStatus,
}

/// Which draft fields are backed by a dropdown
pub fn dropdown_for(section: Section, field: &str) -> Option<DropdownKind> {
    match (section, field) {
        (Section::Basic, "religion") | (Section::PartnerPreference, "partnerReligion") => Some(DropdownKind::Religion),
        (Section::Basic, "caste") => Some(DropdownKind::Caste),
        (Section::Basic, "maritalStatus") | (Section::PartnerPreference, "partnerMaritalStatus") => {
            Some(DropdownKind::MaritalStatus)
        }
        (Section::PartnerPreference, "partnerCountry")
        | (Section::Address, "presentCountry")
        | (Section::Address, "permanentCountry") => Some(DropdownKind::Country),
        _ => None,
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct DropdownResolver {
    options: DropdownOptions,
    castes: Vec<DropdownOption>,
    /// Religion the current caste list belongs to
    caste_religion: Option<String>,
}

impl DropdownResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch religions, countries and marital statuses.
    ///
    /// A failure leaves the lists empty and is only logged.
    pub fn load<A: ProfileApi + ?Sized>(&mut self, api: &A) {
        match api.dropdown_options() {
            Ok(options) => {
                debug!(
                    "Loaded dropdowns: {} religions, {} countries, {} marital statuses",
                    options.religions.len(),
                    options.countries.len(),
                    options.marital_statuses.len()
                );
                self.options = options;
            }
            Err(e) => {
                warn!("Failed to load dropdown options: {}", e);
                self.options = DropdownOptions::default();
            }
        }
    }

    /// Replace the caste list with the castes of `religion_id`.
    ///
    /// The previous list is dropped before the fetch, so a failure leaves it
    /// empty. An empty religion id clears the list without a fetch.
    pub fn load_castes<A: ProfileApi + ?Sized>(&mut self, api: &A, religion_id: &str) {
        self.castes.clear();
        self.caste_religion = None;

        if religion_id.is_empty() {
            return;
        }

        match api.castes_by_religion(religion_id) {
            Ok(castes) => {
                debug!("Loaded {} castes for religion {}", castes.len(), religion_id);
                self.castes = castes;
                self.caste_religion = Some(religion_id.to_string());
            }
            Err(e) => {
                warn!("Failed to load castes for religion {}: {}", religion_id, e);
            }
        }
    }

    pub fn options(&self, kind: DropdownKind) -> &[DropdownOption] {
        match kind {
            DropdownKind::Religion => &self.options.religions,
            DropdownKind::Caste => &self.castes,
            DropdownKind::Country => &self.options.countries,
            DropdownKind::MaritalStatus => &self.options.marital_statuses,
        }
    }

    pub fn caste_religion(&self) -> Option<&str> {
        self.caste_religion.as_deref()
    }

    /// Display name for a submitted id
    pub fn name_for(&self, kind: DropdownKind, id: &str) -> Option<&str> {
        self.options(kind)
            .iter()
            .find(|o| o.id == id)
            .map(|o| o.name.as_str())
    }

    /// Submission id for a displayed name (case-insensitive)
    pub fn id_for(&self, kind: DropdownKind, name: &str) -> Option<&str> {
        let needle = name.trim().to_lowercase();
        self.options(kind)
            .iter()
            .find(|o| o.name.to_lowercase() == needle)
            .map(|o| o.id.as_str())
    }

    /// Next option after `current_id` (wrapping), used by keyboard pickers
    pub fn cycle(&self, kind: DropdownKind, current_id: &str, forward: bool) -> Option<&DropdownOption> {
        let options = self.options(kind);
        if options.is_empty() {
            return None;
        }
        let len = options.len();
        let next = match options.iter().position(|o| o.id == current_id) {
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
            None if forward => 0,
            None => len - 1,
        };
        options.get(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeApi;

    fn fake() -> FakeApi {
        let api = FakeApi::new();
        api.castes.borrow_mut().insert(
            "5".to_string(),
            vec![DropdownOption::new("51", "Digambar"), DropdownOption::new("52", "Shwetambar")],
        );
        api
    }

    #[test]
    fn test_load_and_map() {
        let api = fake();
        let mut resolver = DropdownResolver::new();
        resolver.load(&api);

        assert_eq!(resolver.name_for(DropdownKind::Religion, "1"), Some("Hindu"));
        assert_eq!(resolver.id_for(DropdownKind::Religion, "hindu"), Some("1"));
        assert_eq!(resolver.name_for(DropdownKind::Religion, "99"), None);
    }

    #[test]
    fn test_load_failure_leaves_lists_empty() {
        let api = fake();
        api.fail_dropdowns.set(true);
        let mut resolver = DropdownResolver::new();
        resolver.load(&api);

        assert!(resolver.options(DropdownKind::Religion).is_empty());
        assert!(resolver.options(DropdownKind::Country).is_empty());
    }

    #[test]
    fn test_castes_replaced_per_religion() {
        let api = fake();
        let mut resolver = DropdownResolver::new();

        resolver.load_castes(&api, "5");
        assert_eq!(resolver.options(DropdownKind::Caste).len(), 2);
        assert_eq!(resolver.caste_religion(), Some("5"));

        resolver.load_castes(&api, "2");
        assert!(resolver.options(DropdownKind::Caste).is_empty());
        assert_eq!(resolver.caste_religion(), Some("2"));
        assert_eq!(api.caste_fetches.borrow().as_slice(), ["5", "2"]);
    }

    #[test]
    fn test_caste_failure_clears_previous_list() {
        let api = fake();
        let mut resolver = DropdownResolver::new();
        resolver.load_castes(&api, "5");

        api.fail_castes.set(true);
        resolver.load_castes(&api, "5");

        assert!(resolver.options(DropdownKind::Caste).is_empty());
        assert_eq!(resolver.caste_religion(), None);
    }

    #[test]
    fn test_empty_religion_skips_fetch() {
        let api = fake();
        let mut resolver = DropdownResolver::new();
        resolver.load_castes(&api, "");
        assert!(api.caste_fetches.borrow().is_empty());
    }

    #[test]
    fn test_cycle_wraps() {
        let api = fake();
        let mut resolver = DropdownResolver::new();
        resolver.load(&api);

        let first = resolver.cycle(DropdownKind::MaritalStatus, "", true).unwrap();
        assert_eq!(first.id, "1");
        let last = resolver.cycle(DropdownKind::MaritalStatus, "1", false).unwrap();
        assert_eq!(last.id, resolver.options(DropdownKind::MaritalStatus).last().unwrap().id);
    }

    #[test]
    fn test_dropdown_fields() {
        assert_eq!(dropdown_for(Section::Basic, "caste"), Some(DropdownKind::Caste));
        assert_eq!(dropdown_for(Section::Address, "presentCountry"), Some(DropdownKind::Country));
        assert_eq!(dropdown_for(Section::Basic, "firstName"), None);
    }
}
