pub mod admin;
pub mod answer;
pub mod auth;
pub mod category;
pub mod mistake;
pub mod question;
pub mod statistics;
pub mod user;
