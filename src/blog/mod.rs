//! Per-account blog storage: the entity model, the actor-owned collection
//! and the lazily populated engine registry.

pub mod book;
pub mod engine;
pub mod manager;
pub mod model;

pub use book::BlogBook;
pub use engine::BlogEngine;
pub use manager::BlogManager;
pub use model::{AuthFlags, Blog, BlogUpdate, UploadedBlog};
