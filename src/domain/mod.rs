pub mod engagement;
pub mod gallery;
pub mod media;
pub mod user;
