pub mod api;
pub mod session_store;
