pub mod goals;
pub mod profiles;
pub mod progress_entries;
pub mod subscriptions;
pub mod tasks;
