// Matchmaker - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod error;

// Client side: the profile completion wizard
pub mod draft;       // Profile draft: section values being edited
pub mod entries;     // Multi-entry lists (education, career)
pub mod dropdown;    // Dropdown options + caste cascade
pub mod submission;  // Draft -> backend key shape
pub mod wizard;      // Step sequencer + wizard orchestration
pub mod storage;     // Device key-value store
pub mod contact;     // Paid contact unlock
pub mod api;         // ProfileApi trait, envelope, local/http transports

// Backend
pub mod db;
pub mod entities;
pub mod profiles;    // Member-side operations
pub mod admin;       // Admin member management
pub mod support;     // Support tickets

// Re-export commonly used types
pub use config::Config;
pub use error::{ApiError, FALLBACK_MESSAGE};
pub use draft::{DraftEffect, ProfileDraft, Section};
pub use entries::{CareerRecord, EducationRecord, EntryList, EntryRecord};
pub use dropdown::{DropdownKind, DropdownOption, DropdownOptions, DropdownResolver};
pub use submission::{absorb, section_payload};
pub use wizard::{ProfileWizard, Step, StepAdvance, StepSequencer, WizardProgress};
pub use storage::{contact_unlock_key, DeviceStorage, MemoryStorage, SqliteStorage};
pub use contact::ContactUnlocker;
pub use api::{Envelope, LocalApi, Payload, ProfileApi, Status};
#[cfg(feature = "client")]
pub use api::HttpApi;
pub use db::{
    Event,
    open_database, setup_database, seed_reference_data,
    create_session, member_for_token,
    insert_event, get_events_for_entity,
};
pub use entities::{
    Gender, Member, MemberStatus,
    LimitKind, Limitation, Plan, PlanRegistry, PlanType,
};
pub use admin::{BulkAction, BulkRequest, MemberFilter, MemberPage, MemberUpdate, NewMember};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
