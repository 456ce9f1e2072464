// 🛡️ Admin Members - listing, editing and moderating member accounts
//
// Listing filters map one-to-one onto query-string parameters. Blank values
// mean "no filter" because HTML forms submit every field. Every mutation
// here appends an audit event with the admin as actor.

use chrono::{Months, NaiveDate};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::info;

use crate::api::Payload;
use crate::db::{self, Event};
use crate::entities::{Gender, Limitation, Member, MemberStatus, PlanRegistry, PlanType};
use crate::error::ApiError;
use crate::profiles;

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const MAX_PER_PAGE: u32 = 100;

// ============================================================================
// LISTING
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberSort {
    #[default]
    Newest,
    Oldest,
    NameAsc,
    NameDesc,
}

impl MemberSort {
    pub fn parse(s: &str) -> Option<MemberSort> {
        match s.trim() {
            "newest" => Some(MemberSort::Newest),
            "oldest" => Some(MemberSort::Oldest),
            "name_asc" => Some(MemberSort::NameAsc),
            "name_desc" => Some(MemberSort::NameDesc),
            _ => None,
        }
    }

    fn order_by(&self) -> &'static str {
        match self {
            MemberSort::Newest => "created_at DESC, id DESC",
            MemberSort::Oldest => "created_at ASC, id ASC",
            MemberSort::NameAsc => "first_name COLLATE NOCASE ASC, last_name COLLATE NOCASE ASC, id ASC",
            MemberSort::NameDesc => "first_name COLLATE NOCASE DESC, last_name COLLATE NOCASE DESC, id DESC",
        }
    }
}

/// Query parameters of `GET /admin/members`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberFilter {
    pub status: Option<String>,
    pub gender: Option<String>,
    pub religion: Option<String>,
    pub caste: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub age_from: Option<String>,
    pub age_to: Option<String>,
    /// `YYYY-MM-DD`, inclusive
    pub reg_from: Option<String>,
    /// `YYYY-MM-DD`, inclusive
    pub reg_to: Option<String>,
    pub plan_type: Option<String>,
    pub per_page: Option<String>,
    pub page: Option<String>,
    pub sort: Option<String>,
}

fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_with<T>(value: &Option<String>, field: &str, parse: impl Fn(&str) -> Option<T>) -> Result<Option<T>, ApiError> {
    match given(value) {
        Some(raw) => parse(raw).map(Some).ok_or_else(|| ApiError::validation(field)),
        None => Ok(None),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// `today` shifted back by whole years (Feb 29 clamps to Feb 28)
fn years_before(today: NaiveDate, years: u32) -> Option<NaiveDate> {
    today.checked_sub_months(Months::new(years.checked_mul(12)?))
}

impl MemberFilter {
    pub fn per_page(&self) -> Result<u32, ApiError> {
        let per_page = parse_with(&self.per_page, "per_page", |s| s.parse::<u32>().ok())?;
        Ok(per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE))
    }

    pub fn page(&self) -> Result<u32, ApiError> {
        Ok(parse_with(&self.page, "page", |s| s.parse::<u32>().ok())?.unwrap_or(1).max(1))
    }

    pub fn sort(&self) -> Result<MemberSort, ApiError> {
        Ok(parse_with(&self.sort, "sort", MemberSort::parse)?.unwrap_or_default())
    }

    /// `WHERE` clause and its bound values
    fn where_clause(&self, today: NaiveDate) -> Result<(String, Vec<SqlValue>), ApiError> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        if let Some(status) = parse_with(&self.status, "status", MemberStatus::parse)? {
            conditions.push("status = ?");
            values.push(SqlValue::Text(status.as_str().to_string()));
        }
        if let Some(gender) = parse_with(&self.gender, "gender", Gender::parse)? {
            conditions.push("gender = ?");
            values.push(SqlValue::Text(gender.as_str().to_string()));
        }
        if let Some(religion) = parse_with(&self.religion, "religion", |s| s.parse::<i64>().ok())? {
            conditions.push("religion_id = ?");
            values.push(SqlValue::Integer(religion));
        }
        if let Some(caste) = parse_with(&self.caste, "caste", |s| s.parse::<i64>().ok())? {
            conditions.push("caste_id = ?");
            values.push(SqlValue::Integer(caste));
        }
        for (condition, value) in [
            ("country = ? COLLATE NOCASE", &self.country),
            ("state = ? COLLATE NOCASE", &self.state),
            ("city = ? COLLATE NOCASE", &self.city),
        ] {
            if let Some(value) = given(value) {
                conditions.push(condition);
                values.push(SqlValue::Text(value.to_string()));
            }
        }
        if let Some(min_age) = parse_with(&self.age_from, "age_from", |s| s.parse::<u32>().ok())? {
            let latest_dob = years_before(today, min_age).ok_or_else(|| ApiError::validation("age_from"))?;
            conditions.push("date_of_birth <= ?");
            values.push(SqlValue::Text(latest_dob.format("%Y-%m-%d").to_string()));
        }
        if let Some(max_age) = parse_with(&self.age_to, "age_to", |s| s.parse::<u32>().ok())? {
            let earliest_dob = max_age
                .checked_add(1)
                .and_then(|years| years_before(today, years))
                .ok_or_else(|| ApiError::validation("age_to"))?;
            conditions.push("date_of_birth > ?");
            values.push(SqlValue::Text(earliest_dob.format("%Y-%m-%d").to_string()));
        }
        if let Some(from) = parse_with(&self.reg_from, "reg_from", parse_date)? {
            conditions.push("created_at >= ?");
            values.push(SqlValue::Text(format!("{} 00:00:00", from.format("%Y-%m-%d"))));
        }
        if let Some(to) = parse_with(&self.reg_to, "reg_to", parse_date)? {
            conditions.push("created_at <= ?");
            values.push(SqlValue::Text(format!("{} 23:59:59", to.format("%Y-%m-%d"))));
        }
        if let Some(plan) = parse_with(&self.plan_type, "plan_type", PlanType::parse)? {
            conditions.push("plan_type = ?");
            values.push(SqlValue::Text(plan.as_str().to_string()));
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        Ok((clause, values))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberPage {
    pub members: Vec<Member>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub last_page: u32,
}

/// Filtered, sorted and paginated member list
pub fn list_members(conn: &Connection, filter: &MemberFilter, today: NaiveDate) -> Result<MemberPage, ApiError> {
    let (clause, values) = filter.where_clause(today)?;
    let per_page = filter.per_page()?;
    let page = filter.page()?;

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM members {}", clause),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT {} FROM members {} ORDER BY {} LIMIT {} OFFSET {}",
        db::MEMBER_COLUMNS,
        clause,
        filter.sort()?.order_by(),
        per_page,
        u64::from(page - 1) * u64::from(per_page)
    );
    let mut stmt = conn.prepare(&sql)?;
    let members = stmt
        .query_map(params_from_iter(values.iter()), db::member_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let last_page = ((total.max(0) as u64).div_ceil(u64::from(per_page))).max(1) as u32;
    Ok(MemberPage {
        members,
        total,
        page,
        per_page,
        last_page,
    })
}

// ============================================================================
// STORE / UPDATE
// ============================================================================

/// Body of `POST /admin/members` (also used by `matchmaker member-add`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMember {
    pub email: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub plan_type: Option<String>,
    pub status: Option<String>,
}

/// Body of `POST /admin/members/:id`; absent fields stay unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub status: Option<String>,
    /// Changing the plan resets the remaining quota to the plan's
    pub plan_type: Option<String>,
}

fn check_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((user, host)) if !user.is_empty() && host.contains('.') => Ok(email),
        _ => Err(ApiError::validation("email")),
    }
}

fn email_taken(conn: &Connection, email: &str, except: Option<i64>) -> Result<bool, ApiError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM members WHERE email = ?1 AND id != ?2",
        params![email, except.unwrap_or(-1)],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn check_dob(raw: &str) -> Result<String, ApiError> {
    parse_date(raw.trim())
        .map(|d| d.format("%Y-%m-%d").to_string())
        .ok_or_else(|| ApiError::validation("date_of_birth"))
}

fn record(conn: &Connection, event_type: &str, member_id: i64, data: serde_json::Value, actor: &str) -> Result<(), ApiError> {
    db::insert_event(conn, &Event::new(event_type, "member", &member_id.to_string(), data, actor))?;
    Ok(())
}

pub fn create_member(conn: &Connection, new: &NewMember, plans: &PlanRegistry, actor: &str) -> Result<Member, ApiError> {
    let email = check_email(&new.email)?;
    let first_name = new.first_name.trim();
    if first_name.is_empty() {
        return Err(ApiError::validation("first_name"));
    }
    if email_taken(conn, &email, None)? {
        return Err(ApiError::Conflict(format!("{} is already registered", email)));
    }

    let gender = parse_with(&new.gender, "gender", Gender::parse)?;
    let status = parse_with(&new.status, "status", MemberStatus::parse)?.unwrap_or(MemberStatus::Pending);
    let plan_type = parse_with(&new.plan_type, "plan_type", PlanType::parse)?.unwrap_or(PlanType::Free);
    let date_of_birth = given(&new.date_of_birth).map(check_dob).transpose()?;

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO members (first_name, last_name, email, gender, date_of_birth, status, plan_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            first_name,
            new.last_name.trim(),
            email,
            gender.map(|g| g.as_str()),
            date_of_birth,
            status.as_str(),
            plan_type.as_str(),
            db::now_timestamp()
        ],
    )?;
    let id = tx.last_insert_rowid();
    db::set_limitation(&tx, id, &plans.limitation_for(plan_type))?;
    record(&tx, "member_created", id, json!({ "email": email, "plan_type": plan_type.as_str() }), actor)?;
    tx.commit()?;

    info!("Admin {} created member {} ({})", actor, id, email);
    db::get_member(conn, id)
}

pub fn update_member(
    conn: &Connection,
    member_id: i64,
    update: &MemberUpdate,
    plans: &PlanRegistry,
    actor: &str,
) -> Result<Member, ApiError> {
    let mut member = db::get_member(conn, member_id)?;

    if let Some(first) = given(&update.first_name) {
        member.first_name = first.to_string();
    }
    if let Some(last) = &update.last_name {
        member.last_name = last.trim().to_string();
    }
    if let Some(raw) = given(&update.email) {
        let email = check_email(raw)?;
        if email != member.email {
            if email_taken(conn, &email, Some(member_id))? {
                return Err(ApiError::Conflict(format!("{} is already registered", email)));
            }
            member.email = email;
            member.email_verified = false;
        }
    }
    if let Some(gender) = parse_with(&update.gender, "gender", Gender::parse)? {
        member.gender = Some(gender);
    }
    if let Some(raw) = given(&update.date_of_birth) {
        member.date_of_birth = Some(check_dob(raw)?);
    }
    for (slot, value) in [
        (&mut member.country, &update.country),
        (&mut member.state, &update.state),
        (&mut member.city, &update.city),
    ] {
        if value.is_some() {
            *slot = given(value).map(str::to_string);
        }
    }
    if let Some(status) = parse_with(&update.status, "status", MemberStatus::parse)? {
        member.status = status;
    }
    let new_plan = parse_with(&update.plan_type, "plan_type", PlanType::parse)?.filter(|p| *p != member.plan_type);

    let tx = conn.unchecked_transaction()?;
    if let Some(plan) = new_plan {
        member.plan_type = plan;
        db::set_limitation(&tx, member_id, &plans.limitation_for(plan))?;
    }
    db::save_member(&tx, &member)?;
    record(&tx, "member_updated", member_id, serde_json::to_value(update)?, actor)?;
    tx.commit()?;

    info!("Admin {} updated member {}", actor, member_id);
    Ok(member)
}

// ============================================================================
// BULK ACTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Activate,
    Deactivate,
    Block,
    Delete,
}

impl BulkAction {
    fn event_type(&self) -> &'static str {
        match self {
            BulkAction::Activate => "member_activated",
            BulkAction::Deactivate => "member_deactivated",
            BulkAction::Block => "member_blocked",
            BulkAction::Delete => "member_deleted",
        }
    }

    fn target_status(&self) -> Option<MemberStatus> {
        match self {
            BulkAction::Activate => Some(MemberStatus::Active),
            BulkAction::Deactivate => Some(MemberStatus::Inactive),
            BulkAction::Block => Some(MemberStatus::Blocked),
            BulkAction::Delete => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkRequest {
    pub action: BulkAction,
    pub ids: Vec<i64>,
}

/// Apply one action to many members; returns how many rows changed.
/// Unknown ids are skipped.
pub fn bulk_action(conn: &Connection, request: &BulkRequest, actor: &str) -> Result<usize, ApiError> {
    if request.ids.is_empty() {
        return Err(ApiError::validation("ids"));
    }

    let tx = conn.unchecked_transaction()?;
    let mut affected = 0;
    for id in &request.ids {
        let changed = match request.action.target_status() {
            Some(status) => tx.execute("UPDATE members SET status = ?1 WHERE id = ?2", params![status.as_str(), id])?,
            None => tx.execute("DELETE FROM members WHERE id = ?1", params![id])?,
        };
        if changed > 0 {
            record(&tx, request.action.event_type(), *id, json!({}), actor)?;
            affected += changed;
        }
    }
    tx.commit()?;

    info!("Admin {} applied {:?} to {} member(s)", actor, request.action, affected);
    Ok(affected)
}

// ============================================================================
// COMMENTS / PROFILE / EMAIL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberComment {
    pub id: i64,
    pub member_id: i64,
    pub author: String,
    pub body: String,
    pub created_at: String,
}

pub fn add_comment(conn: &Connection, member_id: i64, body: &str, actor: &str) -> Result<MemberComment, ApiError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ApiError::validation("comment"));
    }
    db::get_member(conn, member_id)?;

    let created_at = db::now_timestamp();
    conn.execute(
        "INSERT INTO member_comments (member_id, author, body, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![member_id, actor, body, created_at],
    )?;
    let id = conn.last_insert_rowid();
    record(conn, "member_commented", member_id, json!({ "comment_id": id }), actor)?;

    Ok(MemberComment {
        id,
        member_id,
        author: actor.to_string(),
        body: body.to_string(),
        created_at,
    })
}

/// Newest first
pub fn comments(conn: &Connection, member_id: i64) -> Result<Vec<MemberComment>, ApiError> {
    db::get_member(conn, member_id)?;
    let mut stmt = conn.prepare(
        "SELECT id, member_id, author, body, created_at FROM member_comments
         WHERE member_id = ?1 ORDER BY id DESC",
    )?;
    let comments = stmt
        .query_map(params![member_id], |row| {
            Ok(MemberComment {
                id: row.get(0)?,
                member_id: row.get(1)?,
                author: row.get(2)?,
                body: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

/// Everything the admin profile page shows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminProfile {
    pub member: Member,
    pub sections: BTreeMap<String, Payload>,
    pub remaining: Limitation,
    pub comments: Vec<MemberComment>,
    pub history: Vec<Event>,
}

pub fn view_profile(conn: &Connection, member_id: i64) -> Result<AdminProfile, ApiError> {
    Ok(AdminProfile {
        member: db::get_member(conn, member_id)?,
        sections: profiles::load_sections(conn, member_id)?,
        remaining: db::get_limitation(conn, member_id)?,
        comments: comments(conn, member_id)?,
        history: db::get_events_for_entity(conn, "member", &member_id.to_string())?,
    })
}

/// Mark the email verified; a pending account becomes active
pub fn confirm_email(conn: &Connection, member_id: i64, actor: &str) -> Result<Member, ApiError> {
    let mut member = db::get_member(conn, member_id)?;
    if member.email_verified {
        return Err(ApiError::Conflict("Email already confirmed".to_string()));
    }
    member.email_verified = true;
    if member.status == MemberStatus::Pending {
        member.status = MemberStatus::Active;
    }
    db::save_member(conn, &member)?;
    record(conn, "member_email_confirmed", member_id, json!({ "email": member.email }), actor)?;

    info!("Admin {} confirmed email of member {}", actor, member_id);
    Ok(member)
}

// ============================================================================
// EXPORT
// ============================================================================

const EXPORT_HEADERS: &[&str] = &[
    "id",
    "first_name",
    "last_name",
    "email",
    "email_verified",
    "gender",
    "age",
    "religion",
    "marital_status",
    "country",
    "state",
    "city",
    "status",
    "plan_type",
    "registered_at",
];

/// Write every member matching the filter (pagination ignored) as CSV.
/// Returns the number of data rows.
pub fn export_members_csv<W: Write>(
    conn: &Connection,
    filter: &MemberFilter,
    today: NaiveDate,
    writer: W,
) -> Result<usize, ApiError> {
    let (clause, values) = filter.where_clause(today)?;
    let sql = format!(
        "SELECT {} FROM members {} ORDER BY {}",
        db::MEMBER_COLUMNS,
        clause,
        filter.sort()?.order_by()
    );
    let mut stmt = conn.prepare(&sql)?;
    let members = stmt
        .query_map(params_from_iter(values.iter()), db::member_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(EXPORT_HEADERS).map_err(csv_error)?;
    for member in &members {
        let religion = match member.religion_id {
            Some(id) => db::reference_name(conn, "religions", id)?,
            None => None,
        };
        csv.write_record([
            member.id.to_string(),
            member.first_name.clone(),
            member.last_name.clone(),
            member.email.clone(),
            member.email_verified.to_string(),
            member.gender.map(|g| g.as_str().to_string()).unwrap_or_default(),
            member.age_on(today).map(|a| a.to_string()).unwrap_or_default(),
            religion.unwrap_or_default(),
            member.marital_status.clone().unwrap_or_default(),
            member.country.clone().unwrap_or_default(),
            member.state.clone().unwrap_or_default(),
            member.city.clone().unwrap_or_default(),
            member.status.as_str().to_string(),
            member.plan_type.as_str().to_string(),
            member.created_at.format(db::TIMESTAMP_FORMAT).to_string(),
        ])
        .map_err(csv_error)?;
    }
    csv.flush()?;

    info!("Exported {} member(s)", members.len());
    Ok(members.len())
}

fn csv_error(err: csv::Error) -> ApiError {
    ApiError::Io(err.into())
}
