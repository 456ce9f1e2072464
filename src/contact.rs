// 📇 Contact Unlocking - paid contact reveal with a local credit counter
//
// The server is the authority on what was paid for. Locally we keep a flag
// per profile (so the UI can show "unlocked" without a round-trip) and a
// credit counter seeded from the dashboard. Both are corrected whenever a
// profile fetch tells us otherwise.

use crate::api::{ContactDetails, ProfileApi, ProfileView};
use crate::error::ApiError;
use crate::storage::{contact_unlock_key, DeviceStorage};
use tracing::{info, warn};

pub struct ContactUnlocker<'a, A: ProfileApi + ?Sized, S: DeviceStorage + ?Sized> {
    api: &'a A,
    storage: &'a S,
    credits: i64,
}

impl<'a, A: ProfileApi + ?Sized, S: DeviceStorage + ?Sized> ContactUnlocker<'a, A, S> {
    pub fn new(api: &'a A, storage: &'a S, credits: i64) -> Self {
        ContactUnlocker { api, storage, credits }
    }

    /// Remaining contact views as far as this device knows
    pub fn credits(&self) -> i64 {
        self.credits
    }

    /// Replace the counter with the server's figure
    pub fn sync_credits(&mut self, remaining: i64) {
        self.credits = remaining;
    }

    pub fn is_unlocked(&self, profile_id: i64) -> bool {
        match self.storage.get(&contact_unlock_key(profile_id)) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                warn!("Could not read unlock flag for {}: {}", profile_id, e);
                false
            }
        }
    }

    /// Reveal a contact.
    ///
    /// Already-unlocked profiles skip the local credit check. Otherwise the
    /// call is refused locally when no credits are left. On success the flag
    /// is stored and the counter takes the server's remaining figure.
    pub fn unlock(&mut self, profile_id: i64) -> Result<ContactDetails, ApiError> {
        let already = self.is_unlocked(profile_id);
        if !already && self.credits <= 0 {
            return Err(ApiError::LimitExhausted("contact view".to_string()));
        }

        let details = self.api.view_contact(profile_id)?;

        if !already {
            self.storage.set(&contact_unlock_key(profile_id), "true")?;
            info!("Unlocked contact {}, {} credits left", profile_id, details.remaining);
        }
        self.sync_credits(details.remaining);

        Ok(details)
    }

    /// Align the local flag with what a profile fetch reported
    pub fn sync_from_profile(&self, profile: &ProfileView) -> Result<(), ApiError> {
        let key = contact_unlock_key(profile.id);
        match (profile.contact_unlocked, self.is_unlocked(profile.id)) {
            (true, false) => self.storage.set(&key, "true"),
            (false, true) => self.storage.remove(&key),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeApi;
    use crate::storage::MemoryStorage;
    use std::collections::BTreeMap;

    fn view(id: i64, unlocked: bool) -> ProfileView {
        ProfileView {
            id,
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            gender: None,
            age: None,
            religion: None,
            caste: None,
            marital_status: None,
            country: None,
            city: None,
            photo: None,
            sections: BTreeMap::new(),
            contact_unlocked: unlocked,
            interest_sent: false,
            heart_sent: false,
        }
    }

    #[test]
    fn test_unlock_sets_flag() {
        let api = FakeApi::new();
        api.contact_credits.set(2);
        let storage = MemoryStorage::new();
        let mut unlocker = ContactUnlocker::new(&api, &storage, 3);

        let details = unlocker.unlock(9).unwrap();

        assert_eq!(details.email, "member9@example.com");
        assert!(unlocker.is_unlocked(9));
        assert_eq!(storage.get("contact_unlocked_9").unwrap().as_deref(), Some("true"));
        assert_eq!(api.contact_views.get(), 1);
        assert_eq!(unlocker.credits(), 2);

        // Second reveal of the same profile is free
        unlocker.unlock(9).unwrap();
        assert_eq!(unlocker.credits(), 2);
        assert_eq!(api.contact_views.get(), 2);
    }

    #[test]
    fn test_server_remaining_replaces_stale_counter() {
        let api = FakeApi::new();
        api.contact_credits.set(1);
        let storage = MemoryStorage::new();
        let mut unlocker = ContactUnlocker::new(&api, &storage, 5);

        unlocker.unlock(3).unwrap();
        assert_eq!(unlocker.credits(), 1);

        // Paid elsewhere: the server's figure wins even for a known profile
        api.contact_credits.set(0);
        unlocker.unlock(3).unwrap();
        assert_eq!(unlocker.credits(), 0);
        assert!(matches!(unlocker.unlock(4), Err(ApiError::LimitExhausted(_))));
    }

    #[test]
    fn test_no_credits_refused_without_server_call() {
        let api = FakeApi::new();
        let storage = MemoryStorage::new();
        let mut unlocker = ContactUnlocker::new(&api, &storage, 0);

        let err = unlocker.unlock(9).unwrap_err();

        assert!(matches!(err, ApiError::LimitExhausted(_)));
        assert_eq!(api.contact_views.get(), 0);
        assert!(!unlocker.is_unlocked(9));
    }

    #[test]
    fn test_already_unlocked_ignores_credit_check() {
        let api = FakeApi::new();
        let storage = MemoryStorage::new();
        storage.set("contact_unlocked_9", "true").unwrap();
        let mut unlocker = ContactUnlocker::new(&api, &storage, 0);

        assert!(unlocker.unlock(9).is_ok());
        assert_eq!(api.contact_views.get(), 1);
    }

    #[test]
    fn test_sync_from_profile() {
        let api = FakeApi::new();
        let storage = MemoryStorage::new();
        let unlocker = ContactUnlocker::new(&api, &storage, 1);

        unlocker.sync_from_profile(&view(4, true)).unwrap();
        assert!(unlocker.is_unlocked(4));

        unlocker.sync_from_profile(&view(4, false)).unwrap();
        assert!(!unlocker.is_unlocked(4));
    }
}
