//! # commoniot-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Carry the bus message surface over HTTP (`POST /api/bus` accepts any
//!   request message and returns its `.response`)
//! - Expose resource-style shortcuts for devices and dashboard models
//! - Stream every bus message to clients as Server-Sent Events
//!   (`GET /api/events`)
//!
//! ## Routes
//!
//! | Method | Path | Answer |
//! |--------|------|--------|
//! | `GET` | `/health` | `OK` |
//! | `POST` | `/api/bus` | response message |
//! | `GET` | `/api/devices` | display models |
//! | `GET` | `/api/devices/{device}` | one display model |
//! | `POST` | `/api/devices/{device}/call` | `{"ok": true, "result": …}` |
//! | `GET` | `/api/devices/{device}/picture` | raw camera frame |
//! | `GET` | `/api/dashboard` | display groups |
//! | `GET` | `/api/dashboard/types/{device_type}` | display models |
//! | `GET` | `/api/dashboard/areas/{area}` | display models |
//! | `PUT` | `/api/dashboard/group_display` | current setting |
//! | `GET` | `/api/events` | SSE stream |
//!
//! `{device}` is a device identifier or an exact device name.
//!
//! ## Dependency rule
//! Depends on `commoniot-app` (services, bus) and `commoniot-domain` (types
//! used in request/response mapping). Never leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
