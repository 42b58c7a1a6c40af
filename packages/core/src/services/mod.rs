//! Service Layer
//!
//! The engines that sit on top of the storage adapter:
//!
//! - [`migrations`] - versioned, transactional schema evolution
//! - [`link_parser`] / [`link_resolver`] - pure `[[...]]` reference
//!   extraction and candidate matching
//! - [`link_index`] - the derived `note_links` backlink table
//! - [`link_scheduler`] - per-note debounced index maintenance
//! - [`item_service`] - CRUD and list views over the unified `items` table
//! - [`area_service`] / [`tag_service`] - grouping items by life area
//!   and free-form tags
//! - [`reminder_service`] - reminder CRUD and lifecycle transitions

pub mod area_service;
pub mod error;
pub mod item_service;
pub mod link_index;
pub mod link_parser;
pub mod link_resolver;
pub mod link_scheduler;
pub mod migrations;
pub mod reminder_service;
pub mod tag_service;

pub use area_service::AreaService;
pub use error::{ItemServiceError, LinkIndexError, MigrationError, ReminderError};
pub use item_service::{ItemService, NoteSnapshotProvider};
pub use link_index::{LinkIndexService, LinkIndexUpdater};
pub use link_scheduler::LinkIndexScheduler;
pub use migrations::{Migration, MigrationRunner, SCHEMA_VERSION};
pub use reminder_service::ReminderService;
pub use tag_service::TagService;
