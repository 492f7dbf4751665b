//! Hoopsync Core - basketball data synchronization.
//!
//! This crate provides:
//! - Provider clients for the ESPN Site, ESPN Core and sportsdata.io APIs
//! - Transforms from provider payloads to local records
//! - Field-level reconciliation by provider precedence
//! - Canonical identity resolution and legacy game id migration
//! - Per-entity sync jobs driven by `SyncOrchestrator`
//! - A PostgreSQL store plus an in-memory one for tests and dry runs

pub mod cancel;
pub mod circuit_breaker;
pub mod clients;
pub mod db;
pub mod error;
pub mod identity;
pub mod models;
pub mod reconcile;
pub mod retry;
pub mod sync;
pub mod transform;

pub use cancel::CancelToken;
pub use db::{MemoryStore, PgSyncStore, SyncStore, UpsertKind};
pub use error::{FetchError, StoreError, SyncError, TransformError};
pub use identity::migration::{IdentityMigrator, MigrationReport, MigrationScope};
pub use identity::{CanonicalIdResolver, IdScheme, IdSchemeRule};
pub use models::{EntityKind, GameStatus, LocalRecord, Provider, SeasonType, StatOwner};
pub use retry::RetryPolicy;
pub use sync::orchestrator::SyncOrchestrator;
pub use sync::{EntitySync, SyncReport, SyncScope, SyncStats};
