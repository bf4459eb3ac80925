pub mod common;
pub mod completions;
pub mod list;
pub mod search;
pub mod show;
pub mod status;
pub mod sync;
