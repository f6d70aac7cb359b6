// Copyright 2026 Forage Contributors
// SPDX-License-Identifier: Apache-2.0

//! Forage runtime library — resilient descriptive-content acquisition.
//!
//! Searches the open web for a topic, extracts and aggregates relevant
//! prose, and degrades through knowledge, curated, and synthetic fallback
//! tiers so that every valid query is answered with something.
//!
//! This library crate exposes the core modules for integration testing.

#![allow(clippy::new_without_default)]

pub mod aggregate;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod fallback;
pub mod fetch;
pub mod maintenance;
pub mod orchestrator;
pub mod renderer;
pub mod rest;
pub mod service;
pub mod session;
pub mod snapshot;
pub mod sources;
