// 🎫 Support Desk - member tickets and admin replies
//
// Members open tickets; an admin answers each one exactly once, which
// closes it. Both sides leave an event on the member's history.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::json;
use tracing::info;

use crate::db::{self, Event};
use crate::entities::{SupportTicket, TicketStatus};
use crate::error::ApiError;

const TICKET_COLUMNS: &str = "id, member_id, subject, message, status, reply, created_at, updated_at";

fn ticket_from_row(row: &Row) -> rusqlite::Result<SupportTicket> {
    let status: String = row.get(4)?;
    Ok(SupportTicket {
        id: row.get(0)?,
        member_id: row.get(1)?,
        subject: row.get(2)?,
        message: row.get(3)?,
        status: TicketStatus::parse(&status).unwrap_or(TicketStatus::Open),
        reply: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::validation(field));
    }
    Ok(value)
}

fn record(conn: &Connection, event_type: &str, ticket: &SupportTicket, actor: &str) -> Result<(), ApiError> {
    let data = json!({ "ticket_id": ticket.id, "subject": ticket.subject });
    db::insert_event(conn, &Event::new(event_type, "member", &ticket.member_id.to_string(), data, actor))?;
    Ok(())
}

pub fn get_ticket(conn: &Connection, ticket_id: i64) -> Result<SupportTicket, ApiError> {
    let sql = format!("SELECT {} FROM support_tickets WHERE id = ?1", TICKET_COLUMNS);
    conn.query_row(&sql, params![ticket_id], ticket_from_row)
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("Ticket {}", ticket_id)))
}

pub fn open_ticket(conn: &Connection, member_id: i64, subject: &str, message: &str) -> Result<SupportTicket, ApiError> {
    let subject = required(subject, "subject")?;
    let message = required(message, "message")?;
    db::get_member(conn, member_id)?;

    let now = db::now_timestamp();
    conn.execute(
        "INSERT INTO support_tickets (member_id, subject, message, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![member_id, subject, message, TicketStatus::Open.as_str(), now],
    )?;
    let ticket = get_ticket(conn, conn.last_insert_rowid())?;
    record(conn, "support_ticket_opened", &ticket, &format!("member:{}", member_id))?;

    info!(member_id, ticket_id = ticket.id, "support ticket opened");
    Ok(ticket)
}

/// A member's own tickets, newest first
pub fn member_tickets(conn: &Connection, member_id: i64) -> Result<Vec<SupportTicket>, ApiError> {
    let sql = format!(
        "SELECT {} FROM support_tickets WHERE member_id = ?1 ORDER BY id DESC",
        TICKET_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let tickets = stmt
        .query_map(params![member_id], ticket_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tickets)
}

/// Admin queue. A blank status lists everything; open tickets come first.
pub fn list_tickets(conn: &Connection, status: Option<&str>) -> Result<Vec<SupportTicket>, ApiError> {
    let status = match status.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(TicketStatus::parse(raw).ok_or_else(|| ApiError::validation("status"))?),
        None => None,
    };

    let sql = format!(
        "SELECT {} FROM support_tickets WHERE (?1 IS NULL OR status = ?1)
         ORDER BY CASE status WHEN 'open' THEN 0 ELSE 1 END, id DESC",
        TICKET_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let tickets = stmt
        .query_map(params![status.map(|s| s.as_str())], ticket_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tickets)
}

pub fn reply_ticket(conn: &Connection, ticket_id: i64, reply: &str, actor: &str) -> Result<SupportTicket, ApiError> {
    let reply = required(reply, "reply")?;
    let ticket = get_ticket(conn, ticket_id)?;
    if ticket.status == TicketStatus::Closed {
        return Err(ApiError::Conflict("Ticket already answered".to_string()));
    }

    conn.execute(
        "UPDATE support_tickets SET reply = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
        params![reply, TicketStatus::Closed.as_str(), db::now_timestamp(), ticket_id],
    )?;
    let ticket = get_ticket(conn, ticket_id)?;
    record(conn, "support_ticket_answered", &ticket, actor)?;

    info!(ticket_id, actor, "support ticket answered");
    Ok(ticket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{insert_member, test_db};

    const ADMIN: &str = "admin";

    #[test]
    fn test_open_ticket_requires_subject_and_message() {
        let conn = test_db();
        let member = insert_member(&conn, "asha@example.com");

        let err = open_ticket(&conn, member, "  ", "hello").unwrap_err();
        assert!(matches!(err, ApiError::Validation { ref field } if field == "subject"));
        let err = open_ticket(&conn, member, "Billing", "").unwrap_err();
        assert!(matches!(err, ApiError::Validation { ref field } if field == "message"));
        assert!(matches!(open_ticket(&conn, 999, "a", "b"), Err(ApiError::NotFound(_))));
        assert!(member_tickets(&conn, member).unwrap().is_empty());
    }

    #[test]
    fn test_member_sees_only_own_tickets() {
        let conn = test_db();
        let asha = insert_member(&conn, "asha@example.com");
        let ravi = insert_member(&conn, "ravi@example.com");

        open_ticket(&conn, asha, "Photo", "My photo is not showing").unwrap();
        open_ticket(&conn, asha, " Billing ", "Charged twice").unwrap();
        open_ticket(&conn, ravi, "Login", "Cannot sign in").unwrap();

        let tickets = member_tickets(&conn, asha).unwrap();
        assert_eq!(tickets.iter().map(|t| t.subject.as_str()).collect::<Vec<_>>(), ["Billing", "Photo"]);
        assert!(tickets.iter().all(|t| t.status == TicketStatus::Open && t.reply.is_none()));

        let history = db::get_events_for_entity(&conn, "member", &asha.to_string()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].event_type, "support_ticket_opened");
    }

    #[test]
    fn test_reply_closes_ticket_once() {
        let conn = test_db();
        let member = insert_member(&conn, "asha@example.com");
        let ticket = open_ticket(&conn, member, "Photo", "My photo is not showing").unwrap();

        assert!(matches!(reply_ticket(&conn, ticket.id, " ", ADMIN), Err(ApiError::Validation { .. })));

        let answered = reply_ticket(&conn, ticket.id, "Fixed, please refresh", ADMIN).unwrap();
        assert_eq!(answered.status, TicketStatus::Closed);
        assert_eq!(answered.reply.as_deref(), Some("Fixed, please refresh"));

        assert!(matches!(reply_ticket(&conn, ticket.id, "again", ADMIN), Err(ApiError::Conflict(_))));
        assert!(matches!(reply_ticket(&conn, 999, "hi", ADMIN), Err(ApiError::NotFound(_))));

        let events = db::get_events_for_entity(&conn, "member", &member.to_string()).unwrap();
        assert!(events.iter().any(|e| e.event_type == "support_ticket_answered" && e.actor == ADMIN));
    }

    #[test]
    fn test_admin_queue_filters_by_status() {
        let conn = test_db();
        let member = insert_member(&conn, "asha@example.com");
        let first = open_ticket(&conn, member, "First", "one").unwrap();
        let second = open_ticket(&conn, member, "Second", "two").unwrap();
        reply_ticket(&conn, second.id, "done", ADMIN).unwrap();

        let all = list_tickets(&conn, None).unwrap();
        assert_eq!(all.iter().map(|t| t.id).collect::<Vec<_>>(), [first.id, second.id]);
        assert_eq!(list_tickets(&conn, Some("")).unwrap().len(), 2);

        let open = list_tickets(&conn, Some("open")).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, first.id);
        assert_eq!(list_tickets(&conn, Some("closed")).unwrap()[0].id, second.id);

        let err = list_tickets(&conn, Some("pending")).unwrap_err();
        assert!(matches!(err, ApiError::Validation { ref field } if field == "status"));
    }
}
