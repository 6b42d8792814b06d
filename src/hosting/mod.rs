//! Publishing to object-store websites.
//!
//! | Step | Function |
//! |---|---|
//! | **Existence check** | [`Website::status`] (website / not found / forbidden) |
//! | **Create** | [`Website::create_website`], [`Website::create_www_website`] |
//! | **Manifest resync** | [`Website::rebuild_manifest_from_bucket`] |
//! | **Purge** | [`Website::purge`], batches of [`PURGE_BATCH_SIZE`] |
//! | **Upload** | [`Website::upload`], bounded rayon pool + completion barrier |
//! | **DNS** | [`setup_dns`] |
//!
//! The module is split into:
//! - **Backend**: [`ObjectStore`] and [`DnsProvider`] traits +
//!   [`DirectoryStore`] and [`MemoryStore`]
//! - **Content types**: extension table with a binary fallback
//! - **Manifest**: comma-joined key list stored in the bucket
//! - **Website**: the publish state machine

pub mod backend;
pub mod directory;
pub mod dns;
pub mod manifest;
pub mod memory;
pub mod mime;
pub mod website;

pub use backend::{AliasRecord, DnsProvider, HostedZone, ObjectStore, StoreError, WebsiteConfig};
pub use directory::DirectoryStore;
pub use dns::{DnsSetup, setup_dns};
pub use manifest::{MANIFEST_KEY, Manifest};
pub use memory::MemoryStore;
pub use mime::mime_type;
pub use website::{
    BucketStatus, PURGE_BATCH_SIZE, PublishError, PurgeReport, UploadEvent, UploadFailure,
    UploadReport, Website,
};
