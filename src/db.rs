use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

use crate::dropdown::{DropdownOption, DropdownOptions};
use crate::entities::{Gender, LimitKind, Limitation, Member, MemberStatus, PlanType};
use crate::error::ApiError;

/// Format used for every stored timestamp
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn now_timestamp() -> String {
    Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

/// Event for the audit trail ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Open (or create) the backend database and make sure the schema exists
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases silently stay in "memory" mode
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Members + quotas + sessions
    // ==========================================================================
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL DEFAULT '',
            email TEXT UNIQUE NOT NULL,
            email_verified INTEGER NOT NULL DEFAULT 0,
            gender TEXT,
            date_of_birth TEXT,
            religion_id INTEGER,
            caste_id INTEGER,
            marital_status TEXT,
            country TEXT,
            state TEXT,
            city TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            plan_type TEXT NOT NULL DEFAULT 'free',
            photo TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS limitations (
            member_id INTEGER PRIMARY KEY REFERENCES members(id) ON DELETE CASCADE,
            contact_views INTEGER NOT NULL DEFAULT 0,
            express_interests INTEGER NOT NULL DEFAULT 0,
            gallery_uploads INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            member_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL
        );",
    )?;

    // ==========================================================================
    // Profile data (one JSON payload per member and section)
    // ==========================================================================
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS profile_sections (
            member_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
            section TEXT NOT NULL,
            payload TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (member_id, section)
        );

        CREATE TABLE IF NOT EXISTS interests (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
            receiver_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (sender_id, receiver_id, kind)
        );

        CREATE TABLE IF NOT EXISTS contact_views (
            viewer_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
            viewed_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            PRIMARY KEY (viewer_id, viewed_id)
        );

        CREATE TABLE IF NOT EXISTS gallery_images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
            path TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS member_comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
            author TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS support_tickets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
            subject TEXT NOT NULL,
            message TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'open',
            reply TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )?;

    // ==========================================================================
    // Reference data
    // ==========================================================================
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS religions (
            id INTEGER PRIMARY KEY,
            name TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS castes (
            id INTEGER PRIMARY KEY,
            religion_id INTEGER NOT NULL REFERENCES religions(id),
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS countries (
            id INTEGER PRIMARY KEY,
            name TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS marital_statuses (
            id INTEGER PRIMARY KEY,
            name TEXT UNIQUE NOT NULL
        );",
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_members_status ON members(status);
        CREATE INDEX IF NOT EXISTS idx_members_created ON members(created_at);
        CREATE INDEX IF NOT EXISTS idx_castes_religion ON castes(religion_id);
        CREATE INDEX IF NOT EXISTS idx_interests_receiver ON interests(receiver_id);
        CREATE INDEX IF NOT EXISTS idx_tickets_member ON support_tickets(member_id);
        CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
        CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);",
    )?;

    Ok(())
}

// ============================================================================
// REFERENCE DATA
// ============================================================================

const RELIGIONS: &[(i64, &str)] = &[
    (1, "Hindu"),
    (2, "Muslim"),
    (3, "Christian"),
    (4, "Sikh"),
    (5, "Jain"),
    (6, "Buddhist"),
    (7, "Parsi"),
];

const CASTES: &[(i64, i64, &str)] = &[
    (11, 1, "Brahmin"),
    (12, 1, "Kshatriya"),
    (13, 1, "Vaishya"),
    (14, 1, "Nair"),
    (15, 1, "Reddy"),
    (21, 2, "Sunni"),
    (22, 2, "Shia"),
    (31, 3, "Catholic"),
    (32, 3, "Protestant"),
    (41, 4, "Jat"),
    (42, 4, "Ramgarhia"),
    (51, 5, "Digambar"),
    (52, 5, "Shwetambar"),
];

const COUNTRIES: &[(i64, &str)] = &[
    (1, "India"),
    (2, "Nepal"),
    (3, "Bangladesh"),
    (4, "Sri Lanka"),
    (5, "United Arab Emirates"),
    (6, "United Kingdom"),
    (7, "United States"),
    (8, "Canada"),
];

const MARITAL_STATUSES: &[(i64, &str)] = &[
    (1, "Never Married"),
    (2, "Divorced"),
    (3, "Widowed"),
    (4, "Awaiting Divorce"),
    (5, "Annulled"),
];

/// Insert the built-in reference lists; existing rows are left alone
pub fn seed_reference_data(conn: &Connection) -> Result<usize> {
    let mut inserted = 0;

    for (id, name) in RELIGIONS {
        inserted += conn.execute("INSERT OR IGNORE INTO religions (id, name) VALUES (?1, ?2)", params![id, name])?;
    }
    for (id, religion_id, name) in CASTES {
        inserted += conn.execute(
            "INSERT OR IGNORE INTO castes (id, religion_id, name) VALUES (?1, ?2, ?3)",
            params![id, religion_id, name],
        )?;
    }
    for (id, name) in COUNTRIES {
        inserted += conn.execute("INSERT OR IGNORE INTO countries (id, name) VALUES (?1, ?2)", params![id, name])?;
    }
    for (id, name) in MARITAL_STATUSES {
        inserted += conn.execute(
            "INSERT OR IGNORE INTO marital_statuses (id, name) VALUES (?1, ?2)",
            params![id, name],
        )?;
    }

    info!("Seeded {} reference rows", inserted);
    Ok(inserted)
}

fn options_from(conn: &Connection, sql: &str, args: impl rusqlite::Params) -> rusqlite::Result<Vec<DropdownOption>> {
    let mut stmt = conn.prepare(sql)?;
    let options = stmt
        .query_map(args, |row| {
            let id: i64 = row.get(0)?;
            Ok(DropdownOption::new(id.to_string(), row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(options)
}

pub fn get_dropdown_options(conn: &Connection) -> rusqlite::Result<DropdownOptions> {
    Ok(DropdownOptions {
        religions: options_from(conn, "SELECT id, name FROM religions ORDER BY id", [])?,
        countries: options_from(conn, "SELECT id, name FROM countries ORDER BY name", [])?,
        marital_statuses: options_from(conn, "SELECT id, name FROM marital_statuses ORDER BY id", [])?,
    })
}

pub fn get_castes_by_religion(conn: &Connection, religion_id: i64) -> rusqlite::Result<Vec<DropdownOption>> {
    options_from(
        conn,
        "SELECT id, name FROM castes WHERE religion_id = ?1 ORDER BY name",
        params![religion_id],
    )
}

/// Display name of a reference row (`table` is one of the reference tables)
pub fn reference_name(conn: &Connection, table: &str, id: i64) -> rusqlite::Result<Option<String>> {
    let sql = match table {
        "religions" => "SELECT name FROM religions WHERE id = ?1",
        "castes" => "SELECT name FROM castes WHERE id = ?1",
        "countries" => "SELECT name FROM countries WHERE id = ?1",
        "marital_statuses" => "SELECT name FROM marital_statuses WHERE id = ?1",
        _ => return Ok(None),
    };
    conn.query_row(sql, params![id], |row| row.get(0)).optional()
}

// ============================================================================
// MEMBERS
// ============================================================================

pub const MEMBER_COLUMNS: &str = "id, first_name, last_name, email, email_verified, gender, date_of_birth,
    religion_id, caste_id, marital_status, country, state, city, status, plan_type, photo, created_at";

pub fn member_from_row(row: &Row) -> rusqlite::Result<Member> {
    let gender: Option<String> = row.get(5)?;
    let status: String = row.get(13)?;
    let plan_type: String = row.get(14)?;
    let created_at: String = row.get(16)?;

    Ok(Member {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        email_verified: row.get(4)?,
        gender: gender.as_deref().and_then(Gender::parse),
        date_of_birth: row.get(6)?,
        religion_id: row.get(7)?,
        caste_id: row.get(8)?,
        marital_status: row.get(9)?,
        country: row.get(10)?,
        state: row.get(11)?,
        city: row.get(12)?,
        status: MemberStatus::parse(&status).unwrap_or(MemberStatus::Pending),
        plan_type: PlanType::parse(&plan_type).unwrap_or(PlanType::Free),
        photo: row.get(15)?,
        created_at: NaiveDateTime::parse_from_str(&created_at, TIMESTAMP_FORMAT)
            .unwrap_or_else(|_| Utc::now().naive_utc()),
    })
}

pub fn get_member(conn: &Connection, member_id: i64) -> Result<Member, ApiError> {
    let sql = format!("SELECT {} FROM members WHERE id = ?1", MEMBER_COLUMNS);
    conn.query_row(&sql, params![member_id], member_from_row)
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("Member {}", member_id)))
}

/// Write every mutable column of a member back to its row
pub fn save_member(conn: &Connection, member: &Member) -> Result<(), ApiError> {
    let updated = conn.execute(
        "UPDATE members SET
            first_name = ?1, last_name = ?2, email = ?3, email_verified = ?4, gender = ?5,
            date_of_birth = ?6, religion_id = ?7, caste_id = ?8, marital_status = ?9,
            country = ?10, state = ?11, city = ?12, status = ?13, plan_type = ?14, photo = ?15
         WHERE id = ?16",
        params![
            member.first_name,
            member.last_name,
            member.email,
            member.email_verified,
            member.gender.map(|g| g.as_str()),
            member.date_of_birth,
            member.religion_id,
            member.caste_id,
            member.marital_status,
            member.country,
            member.state,
            member.city,
            member.status.as_str(),
            member.plan_type.as_str(),
            member.photo,
            member.id,
        ],
    )?;
    if updated == 0 {
        return Err(ApiError::NotFound(format!("Member {}", member.id)));
    }
    Ok(())
}

// ============================================================================
// LIMITATIONS
// ============================================================================

pub fn get_limitation(conn: &Connection, member_id: i64) -> rusqlite::Result<Limitation> {
    let limitation = conn
        .query_row(
            "SELECT contact_views, express_interests, gallery_uploads FROM limitations WHERE member_id = ?1",
            params![member_id],
            |row| {
                Ok(Limitation {
                    contact_views: row.get(0)?,
                    express_interests: row.get(1)?,
                    gallery_uploads: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(limitation.unwrap_or_default())
}

pub fn set_limitation(conn: &Connection, member_id: i64, limitation: &Limitation) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO limitations (member_id, contact_views, express_interests, gallery_uploads)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(member_id) DO UPDATE SET
            contact_views = excluded.contact_views,
            express_interests = excluded.express_interests,
            gallery_uploads = excluded.gallery_uploads",
        params![
            member_id,
            limitation.contact_views,
            limitation.express_interests,
            limitation.gallery_uploads
        ],
    )?;
    Ok(())
}

/// Take one unit of quota, failing when nothing is left
pub fn consume_limitation(conn: &Connection, member_id: i64, kind: LimitKind) -> Result<Limitation, ApiError> {
    let mut limitation = get_limitation(conn, member_id)?;
    if !limitation.consume(kind) {
        return Err(ApiError::LimitExhausted(kind.label().to_string()));
    }
    set_limitation(conn, member_id, &limitation)?;
    debug!("Member {} used one {}, {} left", member_id, kind.label(), limitation.remaining(kind));
    Ok(limitation)
}

// ============================================================================
// SESSIONS
// ============================================================================

/// Tokens are stored hashed; only the caller ever sees the raw value
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Issue a new bearer token for a member
pub fn create_session(conn: &Connection, member_id: i64) -> Result<String, ApiError> {
    get_member(conn, member_id)?;
    let token = uuid::Uuid::new_v4().simple().to_string();
    conn.execute(
        "INSERT INTO sessions (token_hash, member_id, created_at) VALUES (?1, ?2, ?3)",
        params![hash_token(&token), member_id, now_timestamp()],
    )?;
    info!("Issued session for member {}", member_id);
    Ok(token)
}

/// Member behind a bearer token; blocked members are refused
pub fn member_for_token(conn: &Connection, token: &str) -> Result<i64, ApiError> {
    let row: Option<(i64, String)> = conn
        .query_row(
            "SELECT m.id, m.status FROM sessions s JOIN members m ON m.id = s.member_id
             WHERE s.token_hash = ?1",
            params![hash_token(token)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        Some((id, status)) if MemberStatus::parse(&status) != Some(MemberStatus::Blocked) => Ok(id),
        _ => Err(ApiError::Unauthorized),
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> rusqlite::Result<()> {
    let data_json = event.data.to_string();

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> rusqlite::Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).unwrap_or(serde_json::Value::Null),
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Fresh in-memory database with schema and reference data
    pub(crate) fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        seed_reference_data(&conn).unwrap();
        conn
    }

    /// Insert a bare member row and return its id
    pub(crate) fn insert_member(conn: &Connection, email: &str) -> i64 {
        conn.execute(
            "INSERT INTO members (first_name, email, status, created_at) VALUES ('Test', ?1, 'active', ?2)",
            params![email, now_timestamp()],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn test_setup_is_idempotent() {
        let conn = test_db();
        setup_database(&conn).unwrap();
        assert_eq!(seed_reference_data(&conn).unwrap(), 0);
    }

    #[test]
    fn test_dropdowns_and_castes() {
        let conn = test_db();
        let options = get_dropdown_options(&conn).unwrap();

        assert_eq!(options.religions.len(), 7);
        assert_eq!(options.religions[0], DropdownOption::new("1", "Hindu"));
        assert_eq!(options.marital_statuses[0].name, "Never Married");

        let jain = get_castes_by_religion(&conn, 5).unwrap();
        assert_eq!(jain.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(), ["Digambar", "Shwetambar"]);
        assert!(get_castes_by_religion(&conn, 99).unwrap().is_empty());
    }

    #[test]
    fn test_reference_name() {
        let conn = test_db();
        assert_eq!(reference_name(&conn, "religions", 4).unwrap().as_deref(), Some("Sikh"));
        assert_eq!(reference_name(&conn, "castes", 999).unwrap(), None);
        assert_eq!(reference_name(&conn, "members", 1).unwrap(), None);
    }

    #[test]
    fn test_session_round_trip() {
        let conn = test_db();
        let id = insert_member(&conn, "a@example.com");

        let token = create_session(&conn, id).unwrap();

        assert_eq!(member_for_token(&conn, &token).unwrap(), id);
        assert!(matches!(member_for_token(&conn, "bogus"), Err(ApiError::Unauthorized)));

        conn.execute("UPDATE members SET status = 'blocked' WHERE id = ?1", params![id]).unwrap();
        assert!(matches!(member_for_token(&conn, &token), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn test_session_for_unknown_member() {
        let conn = test_db();
        assert!(matches!(create_session(&conn, 404), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_consume_limitation() {
        let conn = test_db();
        let id = insert_member(&conn, "q@example.com");
        set_limitation(
            &conn,
            id,
            &Limitation {
                contact_views: 1,
                express_interests: 0,
                gallery_uploads: 0,
            },
        )
        .unwrap();

        let left = consume_limitation(&conn, id, LimitKind::ContactViews).unwrap();
        assert_eq!(left.contact_views, 0);

        let err = consume_limitation(&conn, id, LimitKind::ContactViews).unwrap_err();
        assert!(matches!(err, ApiError::LimitExhausted(_)));
        assert_eq!(get_limitation(&conn, id).unwrap().contact_views, 0);
    }

    #[test]
    fn test_events_newest_first() {
        let conn = test_db();
        insert_event(&conn, &Event::new("member_created", "member", "1", serde_json::json!({}), "admin")).unwrap();
        insert_event(&conn, &Event::new("member_updated", "member", "1", serde_json::json!({"x": 1}), "admin")).unwrap();
        insert_event(&conn, &Event::new("member_created", "member", "2", serde_json::json!({}), "admin")).unwrap();

        let events = get_events_for_entity(&conn, "member", "1").unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "member_updated");
        assert_eq!(events[0].data["x"], 1);
    }

    #[test]
    fn test_get_member_not_found() {
        let conn = test_db();
        assert!(matches!(get_member(&conn, 1), Err(ApiError::NotFound(_))));
        let id = insert_member(&conn, "m@example.com");
        let mut member = get_member(&conn, id).unwrap();
        assert_eq!(member.status, MemberStatus::Active);
        assert_eq!(member.plan_type, PlanType::Free);

        member.city = Some("Pune".to_string());
        member.gender = Some(Gender::Female);
        save_member(&conn, &member).unwrap();
        assert_eq!(get_member(&conn, id).unwrap(), member);
    }
}
