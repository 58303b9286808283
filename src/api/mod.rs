pub mod handlers;
pub mod router;
pub mod user;
