pub mod collections;

pub use collections::{router, AppState, AppStateInner};
