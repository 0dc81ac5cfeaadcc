//! Backend for a meeting-minutes assistant: authenticated CRUD over users,
//! meeting records and transcripts, with uploads handed off to an external
//! transcription script.

pub mod app;
pub mod auth;
pub mod config;
pub mod csrf;
pub mod error;
pub mod limits;
pub mod minutes;
pub mod state;
pub mod transcribe;
pub mod upload;
