pub mod admin;
mod extract;
pub mod health;
pub mod unauthorized;
pub mod users;
