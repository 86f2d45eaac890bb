pub mod ai;
pub mod app;
pub mod error;
pub mod models;
pub mod query;
pub mod recommend;
pub mod search;
pub mod tmdb;
