// Entity Models
//
// Backend records shared by the member API and the admin surface:
// - Member: identity, status and the denormalized columns admins filter on
// - Plan: packages and the usage quota ("limitation") they grant
// - SupportTicket: member questions answered by the admin

pub mod member;
pub mod plan;
pub mod ticket;

pub use member::{age_between, Gender, Member, MemberStatus};
pub use plan::{LimitKind, Limitation, Plan, PlanRegistry, PlanType};
pub use ticket::{SupportTicket, TicketStatus};
