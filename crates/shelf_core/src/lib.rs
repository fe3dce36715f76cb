pub mod domain;
pub mod importer;
pub mod library;
pub mod paging;
pub mod ports;

pub use domain::{
    Annotation, AnnotationGroups, Book, ImportReport, LearnedImport, NormalizedDataset, Page,
    Record, RecordBody, Source, Theme, Word,
};
pub use library::{DatasetKind, InitOutcome, Library, OpenOutcome, SeedDataset, SettingKey};
pub use ports::{DatasetFetcher, PortError, PortResult, SettingsStore, TableStore};
