pub mod auth;
pub mod bookings;
pub mod config;
pub mod domain;
pub mod error;
pub mod listings;
pub mod memory;
pub mod notifications;
pub mod payments;
pub mod repository;
pub mod reviews;
pub mod telemetry;
