//! In-memory MAAS used by acceptance tests and `maasform verify --simulate`
//!
//! Behaves like a region controller for the endpoints in [`MaasApi`]:
//! unknown IDs are 404, invalid input is 400, one selection per
//! (boot source, os, release), and deleting the default Ubuntu selection
//! resets it instead of removing it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use log::debug;
use tokio::sync::Mutex;

use crate::api::{DEFAULT_DISTRO_SERIES, MaasApi};
use crate::entity::{BootSource, BootSourceParams, BootSourceSelection, BootSourceSelectionParams};
use crate::error::{ClientError, ClientResult};

pub const DEFAULT_BOOT_SOURCE_URL: &str = "http://images.maas.io/ephemeral-v3/stable/";
pub const DEFAULT_KEYRING_FILENAME: &str = "/usr/share/keyrings/ubuntu-cloudimage-keyring.gpg";

#[derive(Default)]
struct Tables {
    last_boot_source_id: i64,
    last_selection_id: i64,
    boot_sources: BTreeMap<i64, BootSource>,
    selections: BTreeMap<i64, BootSourceSelection>,
}

impl Tables {
    fn boot_source(&self, id: i64) -> ClientResult<&BootSource> {
        self.boot_sources.get(&id).ok_or_else(|| {
            ClientError::NotFound(format!("No BootSource matches the given query: {}", id))
        })
    }

    fn selection(&self, boot_source: i64, id: i64) -> ClientResult<&BootSourceSelection> {
        self.boot_source(boot_source)?;
        self.selections
            .get(&id)
            .filter(|s| s.boot_source_id == boot_source)
            .ok_or_else(|| {
                ClientError::NotFound(format!(
                    "No BootSourceSelection matches the given query: {}",
                    id
                ))
            })
    }

    fn check_unique(
        &self,
        boot_source: i64,
        params: &BootSourceSelectionParams,
        except: Option<i64>,
    ) -> ClientResult<()> {
        let duplicate = self.selections.values().any(|s| {
            s.boot_source_id == boot_source
                && s.os == params.os
                && s.release == params.release
                && Some(s.id) != except
        });
        if duplicate {
            return Err(ClientError::rejected(
                400,
                "Boot source selection with this Boot source, Os and Release already exists.",
            ));
        }
        Ok(())
    }

    fn insert_selection(
        &mut self,
        boot_source: i64,
        params: &BootSourceSelectionParams,
    ) -> BootSourceSelection {
        self.last_selection_id += 1;
        let selection = BootSourceSelection {
            id: self.last_selection_id,
            boot_source_id: boot_source,
            os: params.os.clone(),
            release: params.release.clone(),
            arches: params.arches.clone(),
            subarches: or_wildcard(&params.subarches),
            labels: or_wildcard(&params.labels),
        };
        self.selections.insert(selection.id, selection.clone());
        selection
    }
}

fn or_wildcard(items: &[String]) -> Vec<String> {
    if items.is_empty() {
        vec!["*".to_string()]
    } else {
        items.to_vec()
    }
}

fn validate_selection(params: &BootSourceSelectionParams) -> ClientResult<()> {
    let mut missing = Vec::new();
    if params.os.trim().is_empty() {
        missing.push("os");
    }
    if params.release.trim().is_empty() {
        missing.push("release");
    }
    if params.arches.is_empty() {
        missing.push("arches");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ClientError::rejected(
            400,
            format!("This field is required: {}", missing.join(", ")),
        ))
    }
}

fn validate_boot_source(params: &BootSourceParams) -> ClientResult<()> {
    if !(params.url.starts_with("http://") || params.url.starts_with("https://")) {
        return Err(ClientError::rejected(400, format!("Enter a valid URL: {:?}", params.url)));
    }
    let has_filename = params.keyring_filename.as_deref().is_some_and(|s| !s.is_empty());
    let has_data = params.keyring_data.as_deref().is_some_and(|s| !s.is_empty());
    if has_filename && has_data {
        return Err(ClientError::rejected(
            400,
            "Only one of keyring_filename or keyring_data can be specified.",
        ));
    }
    Ok(())
}

/// Simulated MAAS region controller
pub struct SimulatedMaas {
    default_release: String,
    tables: Mutex<Tables>,
    requests: AtomicUsize,
}

impl SimulatedMaas {
    /// An empty server whose default Ubuntu release is `default_release`
    pub fn new(default_release: impl Into<String>) -> Self {
        Self {
            default_release: default_release.into(),
            tables: Mutex::new(Tables::default()),
            requests: AtomicUsize::new(0),
        }
    }

    /// A freshly installed server: boot source 1 pointing at the stable
    /// image stream, holding the default Ubuntu selection
    pub fn with_default_boot_source(default_release: impl Into<String>) -> Self {
        let mut sim = Self::new(default_release);
        let tables = sim.tables.get_mut();
        tables.last_boot_source_id = 1;
        tables.boot_sources.insert(
            1,
            BootSource {
                id: 1,
                url: DEFAULT_BOOT_SOURCE_URL.to_string(),
                keyring_filename: DEFAULT_KEYRING_FILENAME.to_string(),
                keyring_data: String::new(),
            },
        );
        let params = BootSourceSelectionParams {
            os: "ubuntu".to_string(),
            release: sim.default_release.clone(),
            arches: vec!["amd64".to_string()],
            ..Default::default()
        };
        tables.insert_selection(1, &params);
        sim
    }

    pub fn default_release(&self) -> &str {
        &self.default_release
    }

    /// Number of API calls served so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn record(&self, operation: &str) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        debug!("simulated maas: {}", operation);
    }

    fn is_default(&self, selection: &BootSourceSelection) -> bool {
        selection.os == "ubuntu" && selection.release == self.default_release
    }
}

#[async_trait]
impl MaasApi for SimulatedMaas {
    async fn boot_sources(&self) -> ClientResult<Vec<BootSource>> {
        self.record("list boot sources");
        Ok(self.tables.lock().await.boot_sources.values().cloned().collect())
    }

    async fn boot_source(&self, id: i64) -> ClientResult<BootSource> {
        self.record("get boot source");
        self.tables.lock().await.boot_source(id).cloned()
    }

    async fn create_boot_source(&self, params: &BootSourceParams) -> ClientResult<BootSource> {
        self.record("create boot source");
        validate_boot_source(params)?;

        let mut tables = self.tables.lock().await;
        tables.last_boot_source_id += 1;
        let source = BootSource {
            id: tables.last_boot_source_id,
            url: params.url.clone(),
            keyring_filename: params.keyring_filename.clone().unwrap_or_default(),
            keyring_data: params.keyring_data.clone().unwrap_or_default(),
        };
        tables.boot_sources.insert(source.id, source.clone());
        Ok(source)
    }

    async fn update_boot_source(
        &self,
        id: i64,
        params: &BootSourceParams,
    ) -> ClientResult<BootSource> {
        self.record("update boot source");
        let mut tables = self.tables.lock().await;
        tables.boot_source(id)?;
        validate_boot_source(params)?;

        let source = BootSource {
            id,
            url: params.url.clone(),
            keyring_filename: params.keyring_filename.clone().unwrap_or_default(),
            keyring_data: params.keyring_data.clone().unwrap_or_default(),
        };
        tables.boot_sources.insert(id, source.clone());
        Ok(source)
    }

    async fn delete_boot_source(&self, id: i64) -> ClientResult<()> {
        self.record("delete boot source");
        let mut tables = self.tables.lock().await;
        tables.boot_source(id)?;
        tables.boot_sources.remove(&id);
        tables.selections.retain(|_, s| s.boot_source_id != id);
        Ok(())
    }

    async fn boot_source_selections(
        &self,
        boot_source: i64,
    ) -> ClientResult<Vec<BootSourceSelection>> {
        self.record("list boot source selections");
        let tables = self.tables.lock().await;
        tables.boot_source(boot_source)?;
        Ok(tables
            .selections
            .values()
            .filter(|s| s.boot_source_id == boot_source)
            .cloned()
            .collect())
    }

    async fn boot_source_selection(
        &self,
        boot_source: i64,
        id: i64,
    ) -> ClientResult<BootSourceSelection> {
        self.record("get boot source selection");
        self.tables.lock().await.selection(boot_source, id).cloned()
    }

    async fn create_boot_source_selection(
        &self,
        boot_source: i64,
        params: &BootSourceSelectionParams,
    ) -> ClientResult<BootSourceSelection> {
        self.record("create boot source selection");
        let mut tables = self.tables.lock().await;
        tables.boot_source(boot_source)?;
        validate_selection(params)?;
        tables.check_unique(boot_source, params, None)?;
        Ok(tables.insert_selection(boot_source, params))
    }

    async fn update_boot_source_selection(
        &self,
        boot_source: i64,
        id: i64,
        params: &BootSourceSelectionParams,
    ) -> ClientResult<BootSourceSelection> {
        self.record("update boot source selection");
        let mut tables = self.tables.lock().await;
        let mut selection = tables.selection(boot_source, id)?.clone();
        validate_selection(params)?;
        tables.check_unique(boot_source, params, Some(id))?;

        selection.os = params.os.clone();
        selection.release = params.release.clone();
        selection.arches = params.arches.clone();
        if !params.subarches.is_empty() {
            selection.subarches = params.subarches.clone();
        }
        if !params.labels.is_empty() {
            selection.labels = params.labels.clone();
        }
        tables.selections.insert(id, selection.clone());
        Ok(selection)
    }

    async fn delete_boot_source_selection(&self, boot_source: i64, id: i64) -> ClientResult<()> {
        self.record("delete boot source selection");
        let mut tables = self.tables.lock().await;
        let selection = tables.selection(boot_source, id)?.clone();

        if self.is_default(&selection) {
            let reset = BootSourceSelection {
                arches: vec!["amd64".to_string()],
                subarches: vec!["*".to_string()],
                labels: vec!["*".to_string()],
                ..selection
            };
            tables.selections.insert(id, reset);
        } else {
            tables.selections.remove(&id);
        }
        Ok(())
    }

    async fn get_config(&self, name: &str) -> ClientResult<Vec<u8>> {
        self.record("get config");
        match name {
            DEFAULT_DISTRO_SERIES => Ok(serde_json::to_vec(&self.default_release)?),
            "maas_name" => Ok(serde_json::to_vec("maas-sim")?),
            other => Err(ClientError::rejected(
                400,
                format!("{} is not a valid config name", other),
            )),
        }
    }
}
