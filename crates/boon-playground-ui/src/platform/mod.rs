//! Host integrations for the in-memory document.

pub mod browser;
