pub mod accounts;
pub mod autosave;
