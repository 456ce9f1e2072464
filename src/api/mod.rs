// 🌐 Profile API - the REST surface the wizard and screens talk to
//
// Every endpoint answers with the same envelope:
//   { "status": "success" | "error", "data": ..., "message": ... }
//
// `ProfileApi` is the seam between form logic and transport. `LocalApi` runs
// the backend operations in-process against SQLite (also used by the HTTP
// server per request); `HttpApi` talks to a remote server.

pub mod local;

#[cfg(feature = "client")]
pub mod http;

use crate::draft::{ProfileDraft, Section};
use crate::dropdown::{DropdownOption, DropdownOptions};
use crate::entities::{Limitation, Member, Plan, PlanType, SupportTicket};
use crate::error::ApiError;
use crate::submission;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub use local::LocalApi;

#[cfg(feature = "client")]
pub use http::HttpApi;

/// Plain key-value request body in backend key shape
pub type Payload = serde_json::Map<String, Value>;

// ============================================================================
// ENVELOPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Envelope {
            status: Status::Success,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Envelope {
            status: Status::Error,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Data of a successful envelope; anything else is an `ApiError`
    pub fn into_data(self) -> Result<T, ApiError> {
        match (self.status, self.data) {
            (Status::Success, Some(data)) => Ok(data),
            (Status::Success, None) => Err(ApiError::rejected(
                self.message.or_else(|| Some("Empty response".to_string())),
            )),
            (Status::Error, _) => Err(ApiError::rejected(self.message)),
        }
    }
}

impl Envelope<Value> {
    pub fn message(message: impl Into<String>) -> Self {
        Envelope {
            status: Status::Success,
            data: None,
            message: Some(message.into()),
        }
    }

    /// Success check for endpoints whose data is irrelevant
    pub fn into_unit(self) -> Result<(), ApiError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(ApiError::rejected(self.message))
        }
    }

    /// Decode the untyped data into `T`
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let value = self.into_data()?;
        Ok(serde_json::from_value(value)?)
    }
}

// ============================================================================
// RESPONSE TYPES
// ============================================================================

/// The signed-in member with every saved section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub member: Member,
    /// Section name -> payload in backend key shape
    #[serde(default)]
    pub sections: BTreeMap<String, Payload>,
}

impl UserInfo {
    /// Rebuild a draft from the saved sections
    pub fn draft(&self) -> ProfileDraft {
        submission::draft_from_sections(&self.sections)
    }
}

/// Another member's profile as seen by the signed-in member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileView {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<String>,
    pub age: Option<u32>,
    pub religion: Option<String>,
    pub caste: Option<String>,
    pub marital_status: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub photo: Option<String>,
    /// Public sections; contact fields are withheld
    #[serde(default)]
    pub sections: BTreeMap<String, Payload>,
    /// Whether the viewer already paid for this contact
    pub contact_unlocked: bool,
    pub interest_sent: bool,
    pub heart_sent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub member_id: i64,
    pub email: String,
    pub phone: Option<String>,
    /// Contact views left after this one
    pub remaining: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub plan_type: PlanType,
    pub completed_steps: u8,
    /// 0..=100
    pub profile_completion: u8,
    pub interests_sent: i64,
    pub interests_received: i64,
    pub hearts_received: i64,
    pub contacts_viewed: i64,
    pub remaining: Limitation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub id: i64,
    pub path: String,
    pub created_at: String,
}

/// Multipart form data for image uploads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// File extension to keep when storing, defaulting to `jpg`
    pub fn extension(&self) -> &str {
        let ext = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or("");
        match ext.to_lowercase().as_str() {
            "png" => "png",
            "gif" => "gif",
            "webp" => "webp",
            _ => "jpg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestKind {
    Heart,
    Interest,
}

impl InterestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterestKind::Heart => "heart",
            InterestKind::Interest => "interest",
        }
    }

    pub fn parse(s: &str) -> Option<InterestKind> {
        match s {
            "heart" => Some(InterestKind::Heart),
            "interest" => Some(InterestKind::Interest),
            _ => None,
        }
    }
}

// ============================================================================
// API TRAIT
// ============================================================================

pub trait ProfileApi {
    fn dropdown_options(&self) -> Result<DropdownOptions, ApiError>;

    fn castes_by_religion(&self, religion_id: &str) -> Result<Vec<DropdownOption>, ApiError>;

    fn user_info(&self) -> Result<UserInfo, ApiError>;

    /// Profile-settings save of one section
    fn update_profile(&self, section: Section, payload: &Payload) -> Result<(), ApiError>;

    /// Profile-completion save of one wizard step (1..=6)
    fn submit_profile_step(&self, step: u8, payload: &Payload) -> Result<(), ApiError>;

    fn profile(&self, member_id: i64) -> Result<ProfileView, ApiError>;

    fn express(&self, member_id: i64, kind: InterestKind) -> Result<(), ApiError>;

    /// Paid contact reveal
    fn view_contact(&self, member_id: i64) -> Result<ContactDetails, ApiError>;

    fn dashboard(&self) -> Result<Dashboard, ApiError>;

    fn gallery_images(&self) -> Result<Vec<GalleryImage>, ApiError>;

    fn upload_gallery_image(&self, upload: &ImageUpload) -> Result<GalleryImage, ApiError>;

    /// Returns the stored photo path
    fn upload_profile_image(&self, upload: &ImageUpload) -> Result<String, ApiError>;

    /// Purchasable packages, cheapest first
    fn plans(&self) -> Result<Vec<Plan>, ApiError>;

    fn support_tickets(&self) -> Result<Vec<SupportTicket>, ApiError>;

    fn open_support_ticket(&self, subject: &str, message: &str) -> Result<SupportTicket, ApiError>;

    fn express_heart(&self, member_id: i64) -> Result<(), ApiError> {
        self.express(member_id, InterestKind::Heart)
    }

    fn express_interest(&self, member_id: i64) -> Result<(), ApiError> {
        self.express(member_id, InterestKind::Interest)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory `ProfileApi` that records calls

    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    pub struct FakeApi {
        pub options: DropdownOptions,
        pub castes: RefCell<HashMap<String, Vec<DropdownOption>>>,
        pub caste_fetches: RefCell<Vec<String>>,
        pub submitted: RefCell<Vec<(u8, Payload)>>,
        pub updates: RefCell<Vec<(Section, Payload)>>,
        pub user: RefCell<Option<UserInfo>>,
        pub contact_views: Cell<usize>,
        /// `remaining` reported by `view_contact`
        pub contact_credits: Cell<i64>,
        pub fail_dropdowns: Cell<bool>,
        pub fail_castes: Cell<bool>,
        /// Step number whose submission is rejected
        pub reject_step: Cell<Option<u8>>,
    }

    impl FakeApi {
        pub fn new() -> Self {
            FakeApi {
                options: DropdownOptions {
                    religions: vec![
                        DropdownOption::new("1", "Hindu"),
                        DropdownOption::new("2", "Muslim"),
                        DropdownOption::new("5", "Jain"),
                    ],
                    countries: vec![DropdownOption::new("1", "India"), DropdownOption::new("2", "Nepal")],
                    marital_statuses: vec![
                        DropdownOption::new("1", "Never Married"),
                        DropdownOption::new("2", "Divorced"),
                        DropdownOption::new("3", "Widowed"),
                    ],
                },
                castes: RefCell::new(HashMap::new()),
                caste_fetches: RefCell::new(Vec::new()),
                submitted: RefCell::new(Vec::new()),
                updates: RefCell::new(Vec::new()),
                user: RefCell::new(None),
                contact_views: Cell::new(0),
                contact_credits: Cell::new(0),
                fail_dropdowns: Cell::new(false),
                fail_castes: Cell::new(false),
                reject_step: Cell::new(None),
            }
        }
    }

    impl ProfileApi for FakeApi {
        fn dropdown_options(&self) -> Result<DropdownOptions, ApiError> {
            if self.fail_dropdowns.get() {
                return Err(ApiError::Network("connection refused".to_string()));
            }
            Ok(self.options.clone())
        }

        fn castes_by_religion(&self, religion_id: &str) -> Result<Vec<DropdownOption>, ApiError> {
            self.caste_fetches.borrow_mut().push(religion_id.to_string());
            if self.fail_castes.get() {
                return Err(ApiError::Network("timeout".to_string()));
            }
            Ok(self.castes.borrow().get(religion_id).cloned().unwrap_or_default())
        }

        fn user_info(&self) -> Result<UserInfo, ApiError> {
            self.user
                .borrow()
                .clone()
                .ok_or_else(|| ApiError::NotFound("member".to_string()))
        }

        fn update_profile(&self, section: Section, payload: &Payload) -> Result<(), ApiError> {
            self.updates.borrow_mut().push((section, payload.clone()));
            Ok(())
        }

        fn submit_profile_step(&self, step: u8, payload: &Payload) -> Result<(), ApiError> {
            if self.reject_step.get() == Some(step) {
                return Err(ApiError::rejected(Some("Could not save".to_string())));
            }
            self.submitted.borrow_mut().push((step, payload.clone()));
            Ok(())
        }

        fn profile(&self, member_id: i64) -> Result<ProfileView, ApiError> {
            Err(ApiError::NotFound(format!("profile {}", member_id)))
        }

        fn express(&self, _member_id: i64, _kind: InterestKind) -> Result<(), ApiError> {
            Ok(())
        }

        fn view_contact(&self, member_id: i64) -> Result<ContactDetails, ApiError> {
            self.contact_views.set(self.contact_views.get() + 1);
            Ok(ContactDetails {
                member_id,
                email: format!("member{}@example.com", member_id),
                phone: None,
                remaining: self.contact_credits.get(),
            })
        }

        fn dashboard(&self) -> Result<Dashboard, ApiError> {
            Err(ApiError::Internal("not faked".to_string()))
        }

        fn gallery_images(&self) -> Result<Vec<GalleryImage>, ApiError> {
            Ok(Vec::new())
        }

        fn upload_gallery_image(&self, _upload: &ImageUpload) -> Result<GalleryImage, ApiError> {
            Err(ApiError::Internal("not faked".to_string()))
        }

        fn upload_profile_image(&self, _upload: &ImageUpload) -> Result<String, ApiError> {
            Err(ApiError::Internal("not faked".to_string()))
        }

        fn plans(&self) -> Result<Vec<Plan>, ApiError> {
            Ok(crate::entities::PlanRegistry::new().all())
        }

        fn support_tickets(&self) -> Result<Vec<SupportTicket>, ApiError> {
            Ok(Vec::new())
        }

        fn open_support_ticket(&self, _subject: &str, _message: &str) -> Result<SupportTicket, ApiError> {
            Err(ApiError::Internal("not faked".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_success_decodes() {
        let env: Envelope = serde_json::from_value(json!({
            "status": "success",
            "data": {"religions": [{"id": "1", "name": "Hindu"}]}
        }))
        .unwrap();

        let options: DropdownOptions = env.decode().unwrap();
        assert_eq!(options.religions.len(), 1);
        assert!(options.countries.is_empty());
    }

    #[test]
    fn test_envelope_error_carries_message() {
        let env: Envelope = serde_json::from_value(json!({
            "status": "error",
            "message": "Session expired"
        }))
        .unwrap();

        let err = env.into_unit().unwrap_err();
        assert_eq!(err.alert_message(), "Session expired");
    }

    #[test]
    fn test_envelope_serializes_without_empty_keys() {
        let value = serde_json::to_value(Envelope::success(json!([1, 2]))).unwrap();
        assert_eq!(value, json!({"status": "success", "data": [1, 2]}));

        let value = serde_json::to_value(Envelope::<Value>::error("nope")).unwrap();
        assert_eq!(value, json!({"status": "error", "message": "nope"}));
    }

    #[test]
    fn test_upload_extension() {
        let upload = |name: &str| ImageUpload {
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![],
        };
        assert_eq!(upload("me.PNG").extension(), "png");
        assert_eq!(upload("me").extension(), "jpg");
        assert_eq!(upload("archive.tar.exe").extension(), "jpg");
    }
}
