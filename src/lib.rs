//! Immob: a real-estate listing platform backend.
//!
//! Layered as domain (entities, validation), application (services and
//! repository traits), cache (response cache), infra (Postgres, HTTP,
//! media storage, telemetry), and presentation (template views).

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
