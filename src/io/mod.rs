//! Result persistence: JSON document and CSV state export.

pub mod document;
pub mod export;

pub use document::{InstalledCapacities, ResultDocument, read_document, write_document};
pub use export::export_csv;
