//! HTTP inspection/control surface over a live [`ecs_runtime::Repository`]
//! and recorded flight-recorder files.
//!
//! Read-only against the live repository (`GET /stats`, `GET /types`,
//! `GET /query`); the one mutating endpoint, `POST /recorder/seek`, only
//! ever touches a separate replica repository supplied for that purpose,
//! never the live one a simulation is advancing.

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use config::ApiConfig;
pub use router::{AppState, Router};
pub use server::Server;
