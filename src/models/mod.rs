//! Core data models for the ephemeral file-sharing service.
//!
//! A stored file carries its own metadata in its on-disk name, so these
//! types describe the decoded view of that name plus the derived upload
//! and listing shapes the handlers serialize via `serde`.

pub mod file;
pub mod upload;
