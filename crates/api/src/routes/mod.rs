//! HTTP Route Handlers

pub mod health;
pub mod index;
pub mod readings;
