//! Tauri command handlers
//!
//! IPC command handlers the frontend calls via Tauri's invoke system.

pub mod recording;
