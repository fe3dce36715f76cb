//! crates/shelf_core/src/library.rs
//!
//! The `Library` composes the three ports into the operations a browsing UI
//! needs: importing datasets, choosing the active source, and paging through it.

use crate::domain::{
    Annotation, ImportReport, LearnedImport, Page, Record, Source, Theme,
};
use crate::importer;
use crate::paging;
use crate::ports::{DatasetFetcher, PortError, PortResult, SettingsStore, TableStore};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Metadata key holding the RFC 3339 time of the last successful import.
pub const LAST_FETCHED: &str = "lastFetched";

//=========================================================================================
// Settings Keys
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    CurrentIndex,
    Theme,
    ActiveSource,
    DataUrl,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::CurrentIndex => "current-index",
            SettingKey::Theme => "theme",
            SettingKey::ActiveSource => "active-source",
            SettingKey::DataUrl => "data-url",
        }
    }
}

//=========================================================================================
// Init and Import Outcomes
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Books,
    Words,
}

/// A dataset imported on first run when the store has never been filled.
#[derive(Debug, Clone)]
pub struct SeedDataset {
    pub url: String,
    pub kind: DatasetKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// Nothing had been fetched before, so the seed dataset was imported.
    Seeded(ImportReport),
    /// The store already held data (or no seed was configured).
    Loaded { last_fetched: Option<String> },
    /// `init` had already completed in this process.
    AlreadyInitialized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The URL was already registered; its stored records are reused.
    Reused(Source),
    Imported(ImportReport),
}

//=========================================================================================
// The Library Facade
//=========================================================================================

pub struct Library {
    store: Arc<dyn TableStore>,
    settings: Arc<dyn SettingsStore>,
    fetcher: Arc<dyn DatasetFetcher>,
    page_size: usize,
    initialized: OnceCell<InitOutcome>,
}

impl Library {
    pub fn new(
        store: Arc<dyn TableStore>,
        settings: Arc<dyn SettingsStore>,
        fetcher: Arc<dyn DatasetFetcher>,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            settings,
            fetcher,
            page_size: page_size.max(1),
            initialized: OnceCell::new(),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Loads the store and, on a first run, imports the seed dataset.
    ///
    /// Only the first successful call does any work; later calls return
    /// `InitOutcome::AlreadyInitialized`.
    pub async fn init(&self, seed: Option<&SeedDataset>) -> PortResult<InitOutcome> {
        if self.initialized.initialized() {
            return Ok(InitOutcome::AlreadyInitialized);
        }
        let outcome = self
            .initialized
            .get_or_try_init(|| self.run_init(seed))
            .await?;
        Ok(outcome.clone())
    }

    async fn run_init(&self, seed: Option<&SeedDataset>) -> PortResult<InitOutcome> {
        let last_fetched = self.store.get_metadata(LAST_FETCHED).await?;
        match (last_fetched, seed) {
            (None, Some(seed)) => {
                info!(url = %seed.url, kind = ?seed.kind, "No data stored yet, importing seed dataset");
                let report = match seed.kind {
                    DatasetKind::Books => self.import_books(&seed.url, None).await?,
                    DatasetKind::Words => self.import_words(&seed.url, None).await?,
                };
                Ok(InitOutcome::Seeded(report))
            }
            (last_fetched, _) => {
                debug!(?last_fetched, "Loading library from store");
                Ok(InitOutcome::Loaded { last_fetched })
            }
        }
    }

    // --- Imports ---

    /// Imports a `{books, annotations}` export and makes it the active source.
    pub async fn import_books(&self, url: &str, name: Option<&str>) -> PortResult<ImportReport> {
        let document = self.fetcher.fetch_json(url).await?;
        let dataset = importer::parse_books(document)?;
        let total = dataset.records.len();

        let source_id = self.register_source(url, name).await?;
        self.store
            .replace_records_for_source(source_id, &dataset.records, &dataset.annotations)
            .await?;
        self.touch_last_fetched().await?;
        self.activate(source_id);

        info!(url, source_id, books = total, "Imported book annotations");
        Ok(ImportReport {
            source_id,
            total,
            inserted: total,
        })
    }

    /// Imports a word dictionary, leaving out words already in the learned set,
    /// and makes it the active source.
    pub async fn import_words(&self, url: &str, name: Option<&str>) -> PortResult<ImportReport> {
        let document = self.fetcher.fetch_json(url).await?;
        let words = importer::parse_words(document)?;
        let total = words.len();

        let learned: HashSet<String> = self.store.learned_words().await?.into_iter().collect();
        let records = importer::prepare_words(words, &learned);

        let source_id = self.register_source(url, name).await?;
        self.store
            .replace_records_for_source(source_id, &records, &Default::default())
            .await?;
        self.touch_last_fetched().await?;
        self.activate(source_id);

        info!(url, source_id, total_words = total, new_words_inserted = records.len(), "Imported dictionary");
        Ok(ImportReport {
            source_id,
            total,
            inserted: records.len(),
        })
    }

    /// Activates an already registered dictionary, or imports it when the URL
    /// is unknown or `refresh` is set.
    pub async fn open_dictionary(
        &self,
        url: &str,
        name: Option<&str>,
        refresh: bool,
    ) -> PortResult<OpenOutcome> {
        if !refresh {
            if let Some(source) = self.store.find_source_by_url(url).await? {
                debug!(url, source_id = source.id, "Dictionary already stored, reusing it");
                self.activate(source.id);
                return Ok(OpenOutcome::Reused(source));
            }
        }
        self.import_words(url, name).await.map(OpenOutcome::Imported)
    }

    /// Merges a list of learned words into the learned set.
    ///
    /// Already-stored dictionaries are not re-filtered; only later imports see
    /// the new words.
    pub async fn import_learned(&self, url: &str) -> PortResult<LearnedImport> {
        let document = self.fetcher.fetch_json(url).await?;
        let words = importer::parse_learned(document)?;
        let total = words.len();
        let added = self.store.add_learned_words(&words).await?;
        info!(url, total, added, "Imported learned words");
        Ok(LearnedImport { total, added })
    }

    pub async fn learned_words(&self) -> PortResult<Vec<String>> {
        self.store.learned_words().await
    }

    async fn register_source(&self, url: &str, name: Option<&str>) -> PortResult<i64> {
        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => importer::default_source_name(url),
        };
        self.store.upsert_source(&name, url).await
    }

    async fn touch_last_fetched(&self) -> PortResult<()> {
        self.store
            .set_metadata(LAST_FETCHED, &Utc::now().to_rfc3339())
            .await
    }

    pub async fn last_fetched(&self) -> PortResult<Option<String>> {
        self.store.get_metadata(LAST_FETCHED).await
    }

    // --- Sources ---

    pub async fn sources(&self) -> PortResult<Vec<Source>> {
        self.store.list_sources().await
    }

    /// Makes `source_id` the active source.
    pub async fn select_source(&self, source_id: i64) -> PortResult<Source> {
        let source = self.store.get_source(source_id).await?;
        self.activate(source.id);
        Ok(source)
    }

    pub fn active_source(&self) -> Option<i64> {
        self.settings
            .get(SettingKey::ActiveSource.as_str())
            .and_then(|v| v.parse().ok())
    }

    /// Switching to a different source starts it from the first page.
    fn activate(&self, source_id: i64) {
        if self.active_source() != Some(source_id) {
            self.settings
                .set(SettingKey::ActiveSource.as_str(), &source_id.to_string());
            self.store_offset(0);
        }
    }

    // --- Reads ---

    /// Records of the active source, or every stored record when no source
    /// has been chosen yet.
    pub async fn active_records(&self) -> PortResult<Vec<Record>> {
        match self.active_source() {
            Some(source_id) => self.store.query_by_source(source_id).await,
            None => self.store.query_all().await,
        }
    }

    /// Books of the active source that carry at least one annotation.
    pub async fn book_listing(&self) -> PortResult<Vec<Record>> {
        let mut records = self.active_records().await?;
        records.retain(|r| r.notes_count > 0);
        Ok(records)
    }

    pub async fn annotations(&self, record_key: &str) -> PortResult<Vec<Annotation>> {
        let source_id = self
            .active_source()
            .ok_or_else(|| PortError::NotFound("no active source".to_string()))?;
        self.store.annotations_for(source_id, record_key).await
    }

    pub async fn search(&self, term: &str) -> PortResult<Vec<Record>> {
        let records = self.active_records().await?;
        Ok(paging::search(&records, term).into_iter().cloned().collect())
    }

    // --- Pagination ---

    fn stored_offset(&self) -> usize {
        self.settings
            .get(SettingKey::CurrentIndex.as_str())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    fn store_offset(&self, offset: usize) {
        self.settings
            .set(SettingKey::CurrentIndex.as_str(), &offset.to_string());
    }

    /// The page at the persisted offset. An offset the dataset no longer
    /// supports is reset to `0` and persisted.
    pub async fn current_page(&self) -> PortResult<Page<Record>> {
        let records = self.active_records().await?;
        let stored = self.stored_offset();
        let offset = paging::restore_offset(stored, records.len(), self.page_size);
        if offset != stored {
            debug!(stored, offset, "Resetting stale pagination offset");
            self.store_offset(offset);
        }
        Ok(paging::get_page(&records, offset, self.page_size))
    }

    pub async fn next_page(&self) -> PortResult<Page<Record>> {
        let page = self.current_page().await?;
        if !page.has_next {
            return Ok(page);
        }
        self.move_to(page.offset + self.page_size).await
    }

    pub async fn prev_page(&self) -> PortResult<Page<Record>> {
        let page = self.current_page().await?;
        if !page.has_prev {
            return Ok(page);
        }
        self.move_to(page.offset - self.page_size).await
    }

    /// Moves to the 1-based `page_number`. Returns `None` and leaves the
    /// offset untouched when that page does not exist.
    pub async fn jump_to_page(&self, page_number: usize) -> PortResult<Option<Page<Record>>> {
        let records = self.active_records().await?;
        match paging::jump_to_page(page_number, self.page_size, records.len()) {
            Some(offset) => {
                self.store_offset(offset);
                Ok(Some(paging::get_page(&records, offset, self.page_size)))
            }
            None => {
                debug!(page_number, total = records.len(), "Ignoring jump to a missing page");
                Ok(None)
            }
        }
    }

    async fn move_to(&self, offset: usize) -> PortResult<Page<Record>> {
        let records = self.active_records().await?;
        let page = paging::get_page(&records, offset, self.page_size);
        self.store_offset(page.offset);
        Ok(page)
    }

    // --- Preferences ---

    pub fn theme(&self) -> Theme {
        self.settings
            .get(SettingKey::Theme.as_str())
            .and_then(|v| Theme::parse(&v))
            .unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) {
        self.settings.set(SettingKey::Theme.as_str(), theme.as_str());
    }

    /// The URL last entered in the import dialog.
    pub fn data_url(&self) -> Option<String> {
        self.settings.get(SettingKey::DataUrl.as_str())
    }

    pub fn set_data_url(&self, url: &str) {
        self.settings.set(SettingKey::DataUrl.as_str(), url);
    }
}
