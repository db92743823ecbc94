//! BioFace: a small web gateway that lets known users sign in a limited
//! number of times per week and relays uploaded face images to a detector.

pub mod auth;
pub mod config;
pub mod detect;
pub mod error;
pub mod gateway;
