// 🗂️ Member Profiles - backend side of the member REST endpoints
//
// Every function takes the connection and the id of the signed-in member.
// Sections are stored as the exact payload the client sent (backend key
// shape); the few columns the admin list filters on are copied onto the
// member row when the basic or address section is saved.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::api::{ContactDetails, Dashboard, GalleryImage, ImageUpload, InterestKind, Payload, ProfileView, UserInfo};
use crate::db::{self, Event};
use crate::draft::Section;
use crate::dropdown::{DropdownOption, DropdownOptions};
use crate::entities::{Gender, LimitKind, Member, MemberStatus};
use crate::error::ApiError;
use crate::wizard::Step;

/// Backend keys that must be present before step 1 is accepted
const STEP_ONE_REQUIRED: &[&str] = &["first_name", "last_name", "gender", "date_of_birth"];

/// Basic-section keys never shown to other members
const PRIVATE_BASIC_KEYS: &[&str] = &["phone"];

fn actor(member_id: i64) -> String {
    format!("member:{}", member_id)
}

fn text<'a>(payload: &'a Payload, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn number(payload: &Payload, key: &str) -> Option<i64> {
    match payload.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ============================================================================
// REFERENCE DATA
// ============================================================================

pub fn dropdown_options(conn: &Connection) -> Result<DropdownOptions, ApiError> {
    Ok(db::get_dropdown_options(conn)?)
}

/// Castes for a religion; an empty id yields an empty list
pub fn castes_by_religion(conn: &Connection, religion_id: &str) -> Result<Vec<DropdownOption>, ApiError> {
    let religion_id = religion_id.trim();
    if religion_id.is_empty() {
        return Ok(Vec::new());
    }
    let id: i64 = religion_id.parse().map_err(|_| ApiError::validation("religion_id"))?;
    Ok(db::get_castes_by_religion(conn, id)?)
}

// ============================================================================
// SECTIONS
// ============================================================================

pub fn load_sections(conn: &Connection, member_id: i64) -> Result<BTreeMap<String, Payload>, ApiError> {
    let mut stmt = conn.prepare("SELECT section, payload FROM profile_sections WHERE member_id = ?1")?;
    let rows = stmt
        .query_map(params![member_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut sections = BTreeMap::new();
    for (section, raw) in rows {
        let payload: Payload = serde_json::from_str(&raw)?;
        sections.insert(section, payload);
    }
    Ok(sections)
}

pub fn user_info(conn: &Connection, member_id: i64) -> Result<UserInfo, ApiError> {
    Ok(UserInfo {
        member: db::get_member(conn, member_id)?,
        sections: load_sections(conn, member_id)?,
    })
}

fn store_section(conn: &Connection, member_id: i64, section: Section, payload: &Payload) -> Result<(), ApiError> {
    let mut member = db::get_member(conn, member_id)?;

    conn.execute(
        "INSERT INTO profile_sections (member_id, section, payload, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(member_id, section) DO UPDATE SET
            payload = excluded.payload,
            updated_at = excluded.updated_at",
        params![
            member_id,
            section.as_str(),
            Value::Object(payload.clone()).to_string(),
            db::now_timestamp()
        ],
    )?;

    match section {
        Section::Basic => denormalize_basic(conn, &mut member, payload)?,
        Section::Address => denormalize_address(conn, &mut member, payload)?,
        _ => return Ok(()),
    }
    db::save_member(conn, &member)
}

fn denormalize_basic(conn: &Connection, member: &mut Member, payload: &Payload) -> Result<(), ApiError> {
    if let Some(first) = text(payload, "first_name") {
        member.first_name = first.to_string();
    }
    if let Some(last) = text(payload, "last_name") {
        member.last_name = last.to_string();
    }
    if let Some(gender) = text(payload, "gender") {
        member.gender = Gender::parse(gender);
    }
    if let Some(dob) = text(payload, "date_of_birth") {
        member.date_of_birth = Some(dob.to_string());
    }
    member.religion_id = number(payload, "religion_id");
    member.caste_id = number(payload, "caste_id");
    member.marital_status = match number(payload, "marital_status") {
        Some(id) => db::reference_name(conn, "marital_statuses", id)?,
        None => text(payload, "marital_status").map(str::to_string),
    };
    Ok(())
}

fn denormalize_address(conn: &Connection, member: &mut Member, payload: &Payload) -> Result<(), ApiError> {
    member.country = match number(payload, "present_country_id") {
        Some(id) => db::reference_name(conn, "countries", id)?,
        None => None,
    };
    member.state = text(payload, "present_state").map(str::to_string);
    member.city = text(payload, "present_city").map(str::to_string);
    Ok(())
}

/// Save one wizard step (1..=6)
pub fn save_profile_step(conn: &Connection, member_id: i64, step: u8, payload: &Payload) -> Result<(), ApiError> {
    let step = Step::from_index(step).ok_or_else(|| ApiError::validation("step"))?;

    if step == Step::Basic {
        if let Some(missing) = STEP_ONE_REQUIRED.iter().find(|key| text(payload, key).is_none()) {
            return Err(ApiError::validation(missing));
        }
    }

    store_section(conn, member_id, step.section(), payload)?;
    db::insert_event(
        conn,
        &Event::new(
            "profile_step_saved",
            "member",
            &member_id.to_string(),
            json!({ "step": step.index(), "section": step.section().as_str() }),
            &actor(member_id),
        ),
    )?;

    info!("Member {} saved step {} ({})", member_id, step.index(), step.section().as_str());
    Ok(())
}

/// Profile-settings save of any section, address included
pub fn update_section(conn: &Connection, member_id: i64, section: Section, payload: &Payload) -> Result<(), ApiError> {
    store_section(conn, member_id, section, payload)?;
    db::insert_event(
        conn,
        &Event::new(
            "profile_section_updated",
            "member",
            &member_id.to_string(),
            json!({ "section": section.as_str() }),
            &actor(member_id),
        ),
    )?;

    info!("Member {} updated section {}", member_id, section.as_str());
    Ok(())
}

// ============================================================================
// PROFILE VIEW
// ============================================================================

fn has_interest(conn: &Connection, sender: i64, receiver: i64, kind: InterestKind) -> Result<bool, ApiError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM interests WHERE sender_id = ?1 AND receiver_id = ?2 AND kind = ?3",
            params![sender, receiver, kind.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn has_viewed_contact(conn: &Connection, viewer: i64, viewed: i64) -> Result<bool, ApiError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT viewed_id FROM contact_views WHERE viewer_id = ?1 AND viewed_id = ?2",
            params![viewer, viewed],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Another member as the viewer may see it; only active profiles are visible
fn visible_member(conn: &Connection, viewer_id: i64, member_id: i64) -> Result<Member, ApiError> {
    let member = db::get_member(conn, member_id)?;
    if member.id != viewer_id && member.status != MemberStatus::Active {
        return Err(ApiError::NotFound(format!("Profile {}", member_id)));
    }
    Ok(member)
}

pub fn profile_view(conn: &Connection, viewer_id: i64, member_id: i64) -> Result<ProfileView, ApiError> {
    let member = visible_member(conn, viewer_id, member_id)?;

    let mut sections = load_sections(conn, member_id)?;
    sections.remove(Section::Address.as_str());
    if let Some(basic) = sections.get_mut(Section::Basic.as_str()) {
        for key in PRIVATE_BASIC_KEYS {
            basic.remove(*key);
        }
    }

    let religion = match member.religion_id {
        Some(id) => db::reference_name(conn, "religions", id)?,
        None => None,
    };
    let caste = match member.caste_id {
        Some(id) => db::reference_name(conn, "castes", id)?,
        None => None,
    };

    debug!("Member {} viewed profile {}", viewer_id, member_id);
    Ok(ProfileView {
        id: member.id,
        first_name: member.first_name.clone(),
        last_name: member.last_name.clone(),
        gender: member.gender.map(|g| g.as_str().to_string()),
        age: member.age_on(Utc::now().date_naive()),
        religion,
        caste,
        marital_status: member.marital_status.clone(),
        country: member.country.clone(),
        city: member.city.clone(),
        photo: member.photo.clone(),
        sections,
        contact_unlocked: has_viewed_contact(conn, viewer_id, member_id)?,
        interest_sent: has_interest(conn, viewer_id, member_id, InterestKind::Interest)?,
        heart_sent: has_interest(conn, viewer_id, member_id, InterestKind::Heart)?,
    })
}

// ============================================================================
// INTERESTS & CONTACTS
// ============================================================================

/// Heart (free) or interest (uses one express-interest credit)
pub fn express(conn: &Connection, sender_id: i64, receiver_id: i64, kind: InterestKind) -> Result<(), ApiError> {
    if sender_id == receiver_id {
        return Err(ApiError::Conflict("You cannot do that on your own profile".to_string()));
    }
    visible_member(conn, sender_id, receiver_id)?;
    if has_interest(conn, sender_id, receiver_id, kind)? {
        return Err(ApiError::Conflict(format!("You already sent a {} to this member", kind.as_str())));
    }

    let tx = conn.unchecked_transaction()?;
    if kind == InterestKind::Interest {
        db::consume_limitation(&tx, sender_id, LimitKind::ExpressInterests)?;
    }
    tx.execute(
        "INSERT INTO interests (sender_id, receiver_id, kind, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![sender_id, receiver_id, kind.as_str(), db::now_timestamp()],
    )?;
    tx.commit()?;

    info!("Member {} sent {} to {}", sender_id, kind.as_str(), receiver_id);
    Ok(())
}

/// Paid contact reveal; repeat views of the same member are free
pub fn view_contact(conn: &Connection, viewer_id: i64, member_id: i64) -> Result<ContactDetails, ApiError> {
    let member = visible_member(conn, viewer_id, member_id)?;
    let phone = load_sections(conn, member_id)?
        .get(Section::Basic.as_str())
        .and_then(|basic| text(basic, "phone").map(str::to_string));

    let free = viewer_id == member_id || has_viewed_contact(conn, viewer_id, member_id)?;
    let remaining = if free {
        db::get_limitation(conn, viewer_id)?
    } else {
        let tx = conn.unchecked_transaction()?;
        let left = db::consume_limitation(&tx, viewer_id, LimitKind::ContactViews)?;
        tx.execute(
            "INSERT INTO contact_views (viewer_id, viewed_id, created_at) VALUES (?1, ?2, ?3)",
            params![viewer_id, member_id, db::now_timestamp()],
        )?;
        tx.commit()?;
        info!("Member {} unlocked contact of {}", viewer_id, member_id);
        left
    };

    Ok(ContactDetails {
        member_id,
        email: member.email,
        phone,
        remaining: remaining.contact_views,
    })
}

// ============================================================================
// DASHBOARD
// ============================================================================

fn count(conn: &Connection, sql: &str, member_id: i64) -> Result<i64, ApiError> {
    Ok(conn.query_row(sql, params![member_id], |row| row.get(0))?)
}

pub fn dashboard(conn: &Connection, member_id: i64) -> Result<Dashboard, ApiError> {
    let member = db::get_member(conn, member_id)?;
    let sections = load_sections(conn, member_id)?;

    let completed_steps = (1..=Step::COUNT)
        .filter_map(Step::from_index)
        .filter(|step| sections.contains_key(step.section().as_str()))
        .count() as u8;

    Ok(Dashboard {
        plan_type: member.plan_type,
        completed_steps,
        profile_completion: (u16::from(completed_steps) * 100 / u16::from(Step::COUNT)) as u8,
        interests_sent: count(
            conn,
            "SELECT COUNT(*) FROM interests WHERE sender_id = ?1 AND kind = 'interest'",
            member_id,
        )?,
        interests_received: count(
            conn,
            "SELECT COUNT(*) FROM interests WHERE receiver_id = ?1 AND kind = 'interest'",
            member_id,
        )?,
        hearts_received: count(
            conn,
            "SELECT COUNT(*) FROM interests WHERE receiver_id = ?1 AND kind = 'heart'",
            member_id,
        )?,
        contacts_viewed: count(conn, "SELECT COUNT(*) FROM contact_views WHERE viewer_id = ?1", member_id)?,
        remaining: db::get_limitation(conn, member_id)?,
    })
}

// ============================================================================
// IMAGES
// ============================================================================

fn check_image(upload: &ImageUpload) -> Result<(), ApiError> {
    if upload.bytes.is_empty() || !upload.content_type.starts_with("image/") {
        return Err(ApiError::validation("image"));
    }
    Ok(())
}

/// Fresh `<folder>/<uuid>.<ext>` path relative to the upload directory
fn image_path(folder: &str, upload: &ImageUpload) -> String {
    format!("{}/{}.{}", folder, uuid::Uuid::new_v4(), upload.extension())
}

fn write_image(upload_dir: &Path, relative: &str, upload: &ImageUpload) -> Result<PathBuf, ApiError> {
    let target = upload_dir.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, &upload.bytes)?;
    debug!("Stored {} bytes at {}", upload.bytes.len(), target.display());
    Ok(target)
}

/// Remove a stored file whose database record was never saved
fn discard_image(target: &Path) {
    if let Err(e) = fs::remove_file(target) {
        warn!("Could not remove orphaned image {}: {}", target.display(), e);
    }
}

pub fn gallery_images(conn: &Connection, member_id: i64) -> Result<Vec<GalleryImage>, ApiError> {
    let mut stmt =
        conn.prepare("SELECT id, path, created_at FROM gallery_images WHERE member_id = ?1 ORDER BY id")?;
    let images = stmt
        .query_map(params![member_id], |row| {
            Ok(GalleryImage {
                id: row.get(0)?,
                path: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(images)
}

/// Add a gallery image; uses one gallery-upload credit
pub fn upload_gallery_image(
    conn: &Connection,
    member_id: i64,
    upload_dir: &Path,
    upload: &ImageUpload,
) -> Result<GalleryImage, ApiError> {
    check_image(upload)?;

    let tx = conn.unchecked_transaction()?;
    db::consume_limitation(&tx, member_id, LimitKind::GalleryUploads)?;
    let path = image_path("gallery", upload);
    let created_at = db::now_timestamp();
    tx.execute(
        "INSERT INTO gallery_images (member_id, path, created_at) VALUES (?1, ?2, ?3)",
        params![member_id, path, created_at],
    )?;
    let id = tx.last_insert_rowid();

    // Dropping `tx` on a failed write rolls the record and the credit back
    let target = write_image(upload_dir, &path, upload)?;
    if let Err(e) = tx.commit() {
        discard_image(&target);
        return Err(e.into());
    }

    info!("Member {} uploaded gallery image {}", member_id, id);
    Ok(GalleryImage { id, path, created_at })
}

/// Replace the profile photo; returns its stored path
pub fn upload_profile_image(
    conn: &Connection,
    member_id: i64,
    upload_dir: &Path,
    upload: &ImageUpload,
) -> Result<String, ApiError> {
    check_image(upload)?;
    let mut member = db::get_member(conn, member_id)?;

    let path = image_path("profile", upload);
    let target = write_image(upload_dir, &path, upload)?;
    member.photo = Some(path.clone());
    if let Err(e) = db::save_member(conn, &member) {
        discard_image(&target);
        return Err(e);
    }

    info!("Member {} changed profile photo", member_id);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{insert_member, test_db};
    use crate::entities::Limitation;

    fn payload(value: Value) -> Payload {
        value.as_object().unwrap().clone()
    }

    fn png(bytes: &[u8]) -> ImageUpload {
        ImageUpload {
            file_name: "me.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: bytes.to_vec(),
        }
    }

    fn give(conn: &Connection, member_id: i64, contact_views: i64, express_interests: i64, gallery_uploads: i64) {
        db::set_limitation(
            conn,
            member_id,
            &Limitation {
                contact_views,
                express_interests,
                gallery_uploads,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_castes_by_religion() {
        let conn = test_db();
        assert_eq!(castes_by_religion(&conn, "2").unwrap().len(), 2);
        assert!(castes_by_religion(&conn, "").unwrap().is_empty());
        assert!(matches!(castes_by_religion(&conn, "abc"), Err(ApiError::Validation { .. })));
    }

    #[test]
    fn test_step_out_of_range() {
        let conn = test_db();
        let id = insert_member(&conn, "a@example.com");

        for step in [0, 7] {
            let err = save_profile_step(&conn, id, step, &Payload::new()).unwrap_err();
            assert!(matches!(err, ApiError::Validation { ref field } if field == "step"));
        }
    }

    #[test]
    fn test_step_one_requires_identity() {
        let conn = test_db();
        let id = insert_member(&conn, "a@example.com");

        let err = save_profile_step(
            &conn,
            id,
            1,
            &payload(json!({"first_name": "Meera", "last_name": "Shah", "gender": "female"})),
        )
        .unwrap_err();

        assert!(matches!(err, ApiError::Validation { ref field } if field == "date_of_birth"));
        assert!(load_sections(&conn, id).unwrap().is_empty());
    }

    #[test]
    fn test_basic_step_updates_member_columns() {
        let conn = test_db();
        let id = insert_member(&conn, "a@example.com");

        save_profile_step(
            &conn,
            id,
            1,
            &payload(json!({
                "first_name": "Meera",
                "last_name": "Shah",
                "gender": "female",
                "date_of_birth": "1996-02-10",
                "marital_status": "2",
                "religion_id": "5",
                "caste_id": "51",
                "phone": "9999",
            })),
        )
        .unwrap();

        let member = db::get_member(&conn, id).unwrap();
        assert_eq!(member.full_name(), "Meera Shah");
        assert_eq!(member.gender, Some(Gender::Female));
        assert_eq!(member.religion_id, Some(5));
        assert_eq!(member.caste_id, Some(51));
        assert_eq!(member.marital_status.as_deref(), Some("Divorced"));

        let info = user_info(&conn, id).unwrap();
        assert_eq!(info.draft().basic.religion, "5");
        assert_eq!(info.draft().basic.phone, "9999");

        let events = db::get_events_for_entity(&conn, "member", &id.to_string()).unwrap();
        assert_eq!(events[0].event_type, "profile_step_saved");
    }

    #[test]
    fn test_address_update_sets_location() {
        let conn = test_db();
        let id = insert_member(&conn, "a@example.com");

        update_section(
            &conn,
            id,
            Section::Address,
            &payload(json!({"present_country_id": "2", "present_state": "Bagmati", "present_city": "Kathmandu"})),
        )
        .unwrap();

        let member = db::get_member(&conn, id).unwrap();
        assert_eq!(member.country.as_deref(), Some("Nepal"));
        assert_eq!(member.city.as_deref(), Some("Kathmandu"));
    }

    #[test]
    fn test_profile_view_hides_private_data() {
        let conn = test_db();
        let viewer = insert_member(&conn, "v@example.com");
        let other = insert_member(&conn, "o@example.com");
        update_section(&conn, other, Section::Basic, &payload(json!({"first_name": "Asha", "phone": "123"}))).unwrap();
        update_section(&conn, other, Section::Address, &payload(json!({"present_city": "Pune"}))).unwrap();

        let view = profile_view(&conn, viewer, other).unwrap();

        assert_eq!(view.first_name, "Asha");
        assert_eq!(view.city.as_deref(), Some("Pune"));
        assert!(!view.sections["basic"].contains_key("phone"));
        assert!(!view.sections.contains_key("address"));
        assert!(!view.contact_unlocked);
    }

    #[test]
    fn test_inactive_profile_hidden_from_others() {
        let conn = test_db();
        let viewer = insert_member(&conn, "v@example.com");
        let other = insert_member(&conn, "o@example.com");
        conn.execute("UPDATE members SET status = 'inactive' WHERE id = ?1", params![other]).unwrap();

        assert!(matches!(profile_view(&conn, viewer, other), Err(ApiError::NotFound(_))));
        assert!(profile_view(&conn, other, other).is_ok());
    }

    #[test]
    fn test_interest_uses_credit_heart_does_not() {
        let conn = test_db();
        let me = insert_member(&conn, "me@example.com");
        let them = insert_member(&conn, "them@example.com");
        give(&conn, me, 0, 1, 0);

        express(&conn, me, them, InterestKind::Heart).unwrap();
        express(&conn, me, them, InterestKind::Interest).unwrap();

        assert_eq!(db::get_limitation(&conn, me).unwrap().express_interests, 0);
        let view = profile_view(&conn, me, them).unwrap();
        assert!(view.heart_sent && view.interest_sent);

        assert!(matches!(express(&conn, me, them, InterestKind::Heart), Err(ApiError::Conflict(_))));
        assert!(matches!(express(&conn, me, me, InterestKind::Heart), Err(ApiError::Conflict(_))));
    }

    #[test]
    fn test_interest_without_credit_is_not_recorded() {
        let conn = test_db();
        let me = insert_member(&conn, "me@example.com");
        let them = insert_member(&conn, "them@example.com");

        let err = express(&conn, me, them, InterestKind::Interest).unwrap_err();

        assert!(matches!(err, ApiError::LimitExhausted(_)));
        assert!(!profile_view(&conn, me, them).unwrap().interest_sent);
    }

    #[test]
    fn test_contact_view_charged_once() {
        let conn = test_db();
        let me = insert_member(&conn, "me@example.com");
        let them = insert_member(&conn, "them@example.com");
        update_section(&conn, them, Section::Basic, &payload(json!({"phone": "555"}))).unwrap();
        give(&conn, me, 1, 0, 0);

        let first = view_contact(&conn, me, them).unwrap();
        assert_eq!(first.email, "them@example.com");
        assert_eq!(first.phone.as_deref(), Some("555"));
        assert_eq!(first.remaining, 0);

        let again = view_contact(&conn, me, them).unwrap();
        assert_eq!(again.remaining, 0);
        assert!(profile_view(&conn, me, them).unwrap().contact_unlocked);
    }

    #[test]
    fn test_contact_view_exhausted() {
        let conn = test_db();
        let me = insert_member(&conn, "me@example.com");
        let them = insert_member(&conn, "them@example.com");

        let err = view_contact(&conn, me, them).unwrap_err();

        assert!(err.alert_message().contains("upgrade your package"));
        assert!(!has_viewed_contact(&conn, me, them).unwrap());
    }

    #[test]
    fn test_dashboard_completion() {
        let conn = test_db();
        let me = insert_member(&conn, "me@example.com");
        let them = insert_member(&conn, "them@example.com");
        update_section(&conn, me, Section::Physical, &payload(json!({"height": "170"}))).unwrap();
        update_section(&conn, me, Section::Family, &payload(json!({"father": "R"}))).unwrap();
        update_section(&conn, me, Section::Address, &payload(json!({"present_city": "Pune"}))).unwrap();
        express(&conn, them, me, InterestKind::Heart).unwrap();

        let dash = dashboard(&conn, me).unwrap();

        assert_eq!(dash.completed_steps, 2);
        assert_eq!(dash.profile_completion, 33);
        assert_eq!(dash.hearts_received, 1);
        assert_eq!(dash.interests_received, 0);
    }

    #[test]
    fn test_gallery_upload_writes_file_and_uses_credit() {
        let conn = test_db();
        let dir = tempfile::tempdir().unwrap();
        let me = insert_member(&conn, "me@example.com");
        give(&conn, me, 0, 0, 1);

        let image = upload_gallery_image(&conn, me, dir.path(), &png(b"\x89PNG")).unwrap();

        assert!(image.path.starts_with("gallery/") && image.path.ends_with(".png"));
        assert_eq!(fs::read(dir.path().join(&image.path)).unwrap(), b"\x89PNG");
        assert_eq!(gallery_images(&conn, me).unwrap(), vec![image]);

        let err = upload_gallery_image(&conn, me, dir.path(), &png(b"x")).unwrap_err();
        assert!(matches!(err, ApiError::LimitExhausted(_)));
        assert_eq!(gallery_images(&conn, me).unwrap().len(), 1);
    }

    fn stored_files(dir: &Path, folder: &str) -> usize {
        fs::read_dir(dir.join(folder)).map(|entries| entries.count()).unwrap_or(0)
    }

    #[test]
    fn test_failed_gallery_insert_leaves_no_file() {
        let conn = test_db();
        let dir = tempfile::tempdir().unwrap();
        let me = insert_member(&conn, "me@example.com");
        give(&conn, me, 0, 0, 1);
        conn.execute_batch(
            "CREATE TRIGGER refuse_gallery BEFORE INSERT ON gallery_images
             BEGIN SELECT RAISE(ABORT, 'gallery full'); END;",
        )
        .unwrap();

        assert!(upload_gallery_image(&conn, me, dir.path(), &png(b"\x89PNG")).is_err());

        assert_eq!(stored_files(dir.path(), "gallery"), 0);
        assert_eq!(db::get_limitation(&conn, me).unwrap().gallery_uploads, 1);
    }

    #[test]
    fn test_failed_photo_save_removes_file() {
        let conn = test_db();
        let dir = tempfile::tempdir().unwrap();
        let me = insert_member(&conn, "me@example.com");
        conn.execute_batch(
            "CREATE TRIGGER freeze_members BEFORE UPDATE ON members
             BEGIN SELECT RAISE(ABORT, 'read only'); END;",
        )
        .unwrap();

        assert!(upload_profile_image(&conn, me, dir.path(), &png(b"img")).is_err());

        assert_eq!(stored_files(dir.path(), "profile"), 0);
        assert_eq!(db::get_member(&conn, me).unwrap().photo, None);
    }

    #[test]
    fn test_upload_rejects_non_image() {
        let conn = test_db();
        let dir = tempfile::tempdir().unwrap();
        let me = insert_member(&conn, "me@example.com");
        let mut upload = png(b"text");
        upload.content_type = "text/plain".to_string();

        assert!(matches!(
            upload_profile_image(&conn, me, dir.path(), &upload),
            Err(ApiError::Validation { .. })
        ));
    }

    #[test]
    fn test_profile_image_sets_photo() {
        let conn = test_db();
        let dir = tempfile::tempdir().unwrap();
        let me = insert_member(&conn, "me@example.com");

        let path = upload_profile_image(&conn, me, dir.path(), &png(b"img")).unwrap();

        assert!(path.starts_with("profile/"));
        assert_eq!(db::get_member(&conn, me).unwrap().photo, Some(path));
    }
}
