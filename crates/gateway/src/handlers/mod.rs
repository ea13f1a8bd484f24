//! API handlers module

pub mod badge;
pub mod bookmarks;
pub mod health;
pub mod redirect;
pub mod submissions;
pub mod uploads;
