//! Data models for Rolodex

mod contact;
mod sync_run;

pub use contact::{Contact, ContactDraft, ContactId, ContactPhone};
pub use sync_run::{SyncRun, SyncRunStatus, SyncStrategy};
