//! Rsvply - a self-hosted wedding RSVP and guest management system
//!
//! This library provides the core functionality for the Rsvply service:
//! the public RSVP endpoint, the admin API, email campaigns, page content
//! and survey management.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod render;
pub mod services;
