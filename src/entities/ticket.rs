// 🎫 Support Ticket Entity - a member's question to the support desk
//
// A ticket is opened by the member and closed by the admin's reply.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<TicketStatus> {
        match s.trim().to_lowercase().as_str() {
            "open" => Some(TicketStatus::Open),
            "closed" | "answered" => Some(TicketStatus::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportTicket {
    pub id: i64,
    pub member_id: i64,
    pub subject: String,
    pub message: String,
    pub status: TicketStatus,
    /// Admin's answer, set when the ticket is closed
    pub reply: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!(TicketStatus::parse(" Open "), Some(TicketStatus::Open));
        assert_eq!(TicketStatus::parse("answered"), Some(TicketStatus::Closed));
        assert_eq!(TicketStatus::parse("pending"), None);
        assert_eq!(TicketStatus::Closed.as_str(), "closed");
    }
}
