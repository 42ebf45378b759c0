pub mod models;

pub use models::{AdminLog, Collection, HelpRequest, RequestStatus, Role, User};
