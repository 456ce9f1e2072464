// Remote `ProfileApi` over the REST endpoints (blocking reqwest client)

use std::time::Duration;

use reqwest::blocking::{multipart, Client, RequestBuilder};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    ContactDetails, Dashboard, Envelope, GalleryImage, ImageUpload, InterestKind, Payload, ProfileApi, ProfileView,
    UserInfo,
};
use crate::config::Config;
use crate::draft::Section;
use crate::dropdown::{DropdownOption, DropdownOptions};
use crate::entities::{Plan, SupportTicket};
use crate::error::ApiError;

pub struct HttpApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpApi {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(HttpApi {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Client for `MATCHMAKER_API_URL`, if one is configured
    pub fn from_config(config: &Config) -> Result<Option<Self>, ApiError> {
        match &config.api_url {
            Some(url) => Ok(Some(Self::new(url, config.token.clone(), config.http_timeout)?)),
            None => Ok(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<Envelope, ApiError> {
        let response = self
            .authorized(request)
            .send()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status();
        let body = response.text().map_err(|e| ApiError::Network(e.to_string()))?;
        debug!("HTTP {} ({} bytes)", status, body.len());
        envelope_from(status, &body)
    }

    fn get(&self, path: &str) -> Result<Envelope, ApiError> {
        self.send(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str, payload: &Payload) -> Result<Envelope, ApiError> {
        self.send(self.client.post(self.url(path)).json(payload))
    }

    fn post_empty(&self, path: &str) -> Result<Envelope, ApiError> {
        self.send(self.client.post(self.url(path)))
    }

    fn post_image(&self, path: &str, upload: &ImageUpload) -> Result<Envelope, ApiError> {
        let part = multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)
            .map_err(|_| ApiError::validation("image"))?;
        let form = multipart::Form::new().part("image", part);
        self.send(self.client.post(self.url(path)).multipart(form))
    }
}

/// Turn a raw response into an envelope.
///
/// A well-formed envelope is returned whatever the HTTP status, so the
/// server's message reaches the alert. Bodies that are not envelopes become
/// transport errors.
fn envelope_from(status: StatusCode, body: &str) -> Result<Envelope, ApiError> {
    match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) => Ok(envelope),
        Err(_) if status == StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
        Err(e) => {
            warn!("Unreadable response (HTTP {}): {}", status, e);
            Err(ApiError::Network(format!("HTTP {}", status)))
        }
    }
}

impl ProfileApi for HttpApi {
    fn dropdown_options(&self) -> Result<DropdownOptions, ApiError> {
        self.get("dropdown-options")?.decode()
    }

    fn castes_by_religion(&self, religion_id: &str) -> Result<Vec<DropdownOption>, ApiError> {
        self.get(&format!("castes/{}", urlencoding::encode(religion_id)))?.decode()
    }

    fn user_info(&self) -> Result<UserInfo, ApiError> {
        self.get("user-info")?.decode()
    }

    fn update_profile(&self, section: Section, payload: &Payload) -> Result<(), ApiError> {
        self.post(&format!("profile/update/{}", section.as_str()), payload)?.into_unit()
    }

    fn submit_profile_step(&self, step: u8, payload: &Payload) -> Result<(), ApiError> {
        self.post(&format!("profile/step/{}", step), payload)?.into_unit()
    }

    fn profile(&self, member_id: i64) -> Result<ProfileView, ApiError> {
        self.get(&format!("profile/{}", member_id))?.decode()
    }

    fn express(&self, member_id: i64, kind: InterestKind) -> Result<(), ApiError> {
        self.post_empty(&format!("profile/{}/{}", member_id, kind.as_str()))?.into_unit()
    }

    fn view_contact(&self, member_id: i64) -> Result<ContactDetails, ApiError> {
        self.post_empty(&format!("profile/{}/contact", member_id))?.decode()
    }

    fn dashboard(&self) -> Result<Dashboard, ApiError> {
        self.get("dashboard")?.decode()
    }

    fn gallery_images(&self) -> Result<Vec<GalleryImage>, ApiError> {
        self.get("gallery")?.decode()
    }

    fn upload_gallery_image(&self, upload: &ImageUpload) -> Result<GalleryImage, ApiError> {
        self.post_image("gallery", upload)?.decode()
    }

    fn upload_profile_image(&self, upload: &ImageUpload) -> Result<String, ApiError> {
        match self.post_image("profile-image", upload)?.into_data()? {
            Value::String(path) => Ok(path),
            other => Err(ApiError::Internal(format!("unexpected photo path: {}", other))),
        }
    }

    fn plans(&self) -> Result<Vec<Plan>, ApiError> {
        self.get("plans")?.decode()
    }

    fn support_tickets(&self) -> Result<Vec<SupportTicket>, ApiError> {
        self.get("support-tickets")?.decode()
    }

    fn open_support_ticket(&self, subject: &str, message: &str) -> Result<SupportTicket, ApiError> {
        let mut body = Payload::new();
        body.insert("subject".to_string(), subject.into());
        body.insert("message".to_string(), message.into());
        self.post("support-tickets", &body)?.decode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let api = HttpApi::new("http://localhost:3000/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(api.url("dashboard"), "http://localhost:3000/api/dashboard");
        assert_eq!(api.url("/profile/step/3"), "http://localhost:3000/api/profile/step/3");
    }

    #[test]
    fn test_error_envelope_keeps_server_message() {
        let env = envelope_from(StatusCode::PAYMENT_REQUIRED, r#"{"status":"error","message":"Upgrade"}"#).unwrap();
        assert_eq!(env.into_unit().unwrap_err().alert_message(), "Upgrade");
    }

    #[test]
    fn test_non_envelope_bodies() {
        assert!(matches!(
            envelope_from(StatusCode::UNAUTHORIZED, "nope"),
            Err(ApiError::Unauthorized)
        ));
        let err = envelope_from(StatusCode::BAD_GATEWAY, "<html>").unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }
}
