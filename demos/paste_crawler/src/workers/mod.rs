// demos/paste_crawler/src/workers/mod.rs

pub mod archive;
pub mod cache;
pub mod paste;
pub mod request;
pub mod saver;

pub use archive::ArchiveWorker;
pub use cache::{paste_cache, PersistedIds};
pub use paste::PasteWorker;
pub use request::{FetchError, PageClient};
pub use saver::JsonSaver;
