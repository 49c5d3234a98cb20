//! Syncward Core - Domain types, ports and configuration
//!
//! This crate holds everything the orchestration engine and its hosts agree on:
//! - **Domain entities** - `SyncOperation`, `SyncKind`, `Priority`, `OrchestratorState`
//! - **Errors** - `ExecutorError` with an explicit `ErrorKind`, `DomainError`
//! - **Port definitions** - `SyncExecutor` (the unit of work) and `ISyncGate`
//!   (the "is synchronization enabled" switch)
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module is plain data with no runtime dependencies. Ports are
//! traits supplied by the embedding application; the `syncward-sync` crate
//! drives them.

pub mod config;
pub mod domain;
pub mod ports;
