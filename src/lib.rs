//! Airwatch - a personal air-quality monitoring service.
//!
//! # Overview
//!
//! Airwatch resolves where you are, fetches the nearest air-quality reading,
//! keeps a short history, and raises deduplicated alerts when the index
//! crosses your threshold. Location falls back from a live position watch to
//! IP geolocation to a manually entered city, so a reading is almost always
//! one request away.
//!
//! # API Endpoints
//!
//! - `POST /check` - Run one reading cycle manually
//! - `GET /status` - Current location, latest reading and settings
//! - `GET /history` - Recent readings, newest first
//! - `GET /history/stored` - Persisted readings across restarts
//! - `GET /alerts` - Delivered alerts
//! - `POST /settings` - Alert threshold and notification permission
//! - `POST /refresh` / `GET /refresh` - Periodic automatic refresh
//! - `GET /ranking` - Reference cities ranked cleanest first
//! - `GET /health` - Health check
//!
//! # Modules
//!
//! - [`model`]: Core data types (coordinates, advisory tiers, readings)
//! - [`config`]: Runtime tunables
//! - [`providers`]: HTTP clients for the AQI, IP-geolocation and
//!   reverse-geocoding collaborators
//! - [`location`]: Location-resolution state machine
//! - [`geocache`]: Single-entry reverse-geocode cache
//! - [`alert`]: Threshold alerts with dedup and cooldown
//! - [`notify`]: Notification channel abstraction
//! - [`orchestrator`]: The reading pipeline tying it all together
//! - [`scheduler`]: Periodic automatic refresh
//! - [`ranking`]: Reference-city ranking
//! - [`storage`]: SQLite reading log
//! - [`api`]: HTTP API handlers

pub mod alert;
pub mod api;
pub mod config;
pub mod error;
pub mod geocache;
pub mod location;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod providers;
pub mod ranking;
pub mod scheduler;
pub mod storage;
