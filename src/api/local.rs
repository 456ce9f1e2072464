// In-process `ProfileApi`: runs the backend operations directly on SQLite

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use super::{ContactDetails, Dashboard, GalleryImage, ImageUpload, InterestKind, Payload, ProfileApi, ProfileView, UserInfo};
use crate::draft::Section;
use crate::dropdown::{DropdownOption, DropdownOptions};
use crate::entities::{Plan, PlanRegistry, SupportTicket};
use crate::error::ApiError;
use crate::{profiles, support};

/// Acts as one signed-in member against a shared connection
#[derive(Clone)]
pub struct LocalApi {
    db: Arc<Mutex<Connection>>,
    member_id: i64,
    upload_dir: PathBuf,
}

impl LocalApi {
    pub fn new(db: Arc<Mutex<Connection>>, member_id: i64, upload_dir: impl Into<PathBuf>) -> Self {
        LocalApi {
            db,
            member_id,
            upload_dir: upload_dir.into(),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".to_string()))
    }
}

impl ProfileApi for LocalApi {
    fn dropdown_options(&self) -> Result<DropdownOptions, ApiError> {
        profiles::dropdown_options(&*self.conn()?)
    }

    fn castes_by_religion(&self, religion_id: &str) -> Result<Vec<DropdownOption>, ApiError> {
        profiles::castes_by_religion(&*self.conn()?, religion_id)
    }

    fn user_info(&self) -> Result<UserInfo, ApiError> {
        profiles::user_info(&*self.conn()?, self.member_id)
    }

    fn update_profile(&self, section: Section, payload: &Payload) -> Result<(), ApiError> {
        profiles::update_section(&*self.conn()?, self.member_id, section, payload)
    }

    fn submit_profile_step(&self, step: u8, payload: &Payload) -> Result<(), ApiError> {
        profiles::save_profile_step(&*self.conn()?, self.member_id, step, payload)
    }

    fn profile(&self, member_id: i64) -> Result<ProfileView, ApiError> {
        profiles::profile_view(&*self.conn()?, self.member_id, member_id)
    }

    fn express(&self, member_id: i64, kind: InterestKind) -> Result<(), ApiError> {
        profiles::express(&*self.conn()?, self.member_id, member_id, kind)
    }

    fn view_contact(&self, member_id: i64) -> Result<ContactDetails, ApiError> {
        profiles::view_contact(&*self.conn()?, self.member_id, member_id)
    }

    fn dashboard(&self) -> Result<Dashboard, ApiError> {
        profiles::dashboard(&*self.conn()?, self.member_id)
    }

    fn gallery_images(&self) -> Result<Vec<GalleryImage>, ApiError> {
        profiles::gallery_images(&*self.conn()?, self.member_id)
    }

    fn upload_gallery_image(&self, upload: &ImageUpload) -> Result<GalleryImage, ApiError> {
        profiles::upload_gallery_image(&*self.conn()?, self.member_id, &self.upload_dir, upload)
    }

    fn upload_profile_image(&self, upload: &ImageUpload) -> Result<String, ApiError> {
        profiles::upload_profile_image(&*self.conn()?, self.member_id, &self.upload_dir, upload)
    }

    fn plans(&self) -> Result<Vec<Plan>, ApiError> {
        Ok(PlanRegistry::new().all())
    }

    fn support_tickets(&self) -> Result<Vec<SupportTicket>, ApiError> {
        support::member_tickets(&*self.conn()?, self.member_id)
    }

    fn open_support_ticket(&self, subject: &str, message: &str) -> Result<SupportTicket, ApiError> {
        support::open_ticket(&*self.conn()?, self.member_id, subject, message)
    }
}
