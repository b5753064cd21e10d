pub mod comments;
pub mod engagement;
pub mod feed;
pub mod lifecycle;
pub mod screen;
pub mod search;
pub mod session;
