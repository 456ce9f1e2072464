// 👤 Member Entity - a registered profile on the platform
//
// The profile sections themselves live as JSON payloads (see profiles.rs);
// the member row carries only the columns the admin list filters and sorts on.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::plan::PlanType;

// ============================================================================
// MEMBER STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    /// Visible and allowed to log in
    Active,

    /// Deactivated by an admin or by the member
    Inactive,

    /// Registered, email not confirmed yet
    Pending,

    /// Blocked by an admin
    Blocked,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Inactive => "inactive",
            MemberStatus::Pending => "pending",
            MemberStatus::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Option<MemberStatus> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(MemberStatus::Active),
            "inactive" | "deactivated" => Some(MemberStatus::Inactive),
            "pending" => Some(MemberStatus::Pending),
            "blocked" => Some(MemberStatus::Blocked),
            _ => None,
        }
    }
}

// ============================================================================
// GENDER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Gender> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" | "1" => Some(Gender::Male),
            "female" | "f" | "2" => Some(Gender::Female),
            "other" | "3" => Some(Gender::Other),
            _ => None,
        }
    }
}

// ============================================================================
// MEMBER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub email_verified: bool,
    pub gender: Option<Gender>,

    /// `YYYY-MM-DD`
    pub date_of_birth: Option<String>,
    pub religion_id: Option<i64>,
    pub caste_id: Option<i64>,
    pub marital_status: Option<String>,

    // Present address, denormalized from the address section
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,

    pub status: MemberStatus,
    pub plan_type: PlanType,

    /// Relative path under the upload directory
    pub photo: Option<String>,

    pub created_at: NaiveDateTime,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Age in whole years on `today`, if the birth date parses
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let dob = NaiveDate::parse_from_str(self.date_of_birth.as_deref()?, "%Y-%m-%d").ok()?;
        age_between(dob, today)
    }
}

/// Whole years from `dob` to `today`; `None` when `dob` is in the future
pub fn age_between(dob: NaiveDate, today: NaiveDate) -> Option<u32> {
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(dob: Option<&str>) -> Member {
        Member {
            id: 1,
            first_name: "Ravi".to_string(),
            last_name: "Kumar".to_string(),
            email: "ravi@example.com".to_string(),
            email_verified: false,
            gender: Some(Gender::Male),
            date_of_birth: dob.map(str::to_string),
            religion_id: None,
            caste_id: None,
            marital_status: None,
            country: None,
            state: None,
            city: None,
            status: MemberStatus::Pending,
            plan_type: PlanType::Free,
            photo: None,
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_age_before_and_after_birthday() {
        let m = member(Some("1995-06-15"));
        let before = NaiveDate::from_ymd_opt(2025, 6, 14).unwrap();
        let on = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();

        assert_eq!(m.age_on(before), Some(29));
        assert_eq!(m.age_on(on), Some(30));
    }

    #[test]
    fn test_age_unknown_or_future() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(member(None).age_on(today), None);
        assert_eq!(member(Some("not a date")).age_on(today), None);
        assert_eq!(member(Some("2030-01-01")).age_on(today), None);
    }

    #[test]
    fn test_status_and_gender_parse() {
        assert_eq!(MemberStatus::parse("Deactivated"), Some(MemberStatus::Inactive));
        assert_eq!(MemberStatus::parse("gone"), None);
        assert_eq!(Gender::parse("F"), Some(Gender::Female));
        assert_eq!(Gender::parse(""), None);
    }

    #[test]
    fn test_full_name() {
        let mut m = member(None);
        assert_eq!(m.full_name(), "Ravi Kumar");
        m.last_name.clear();
        assert_eq!(m.full_name(), "Ravi");
    }
}
