//! In-process store with optional JSON persistence.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::allocation::ResourceAllocation;
use crate::availability::WeekAvailability;
use crate::error::{ManegeError, Result, StorageError};
use crate::roster::{Person, Resource};
use crate::schedule::types::{RecurringTemplate, WeekRecord};
use crate::store::traits::{ScheduleStore, VersionedWeekRecord};

const STORE_FILE: &str = "schedule.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    persons: Vec<Person>,
    #[serde(default)]
    resources: Vec<Resource>,
    #[serde(default)]
    templates: Vec<RecurringTemplate>,
    #[serde(default)]
    allocations: Vec<ResourceAllocation>,
    #[serde(default)]
    availability: WeekAvailability,
    #[serde(default)]
    weeks: BTreeMap<String, VersionedWeekRecord>,
}

/// An embedded store holding everything behind one `RwLock`, optionally
/// persisted to a JSON file after each write.
///
/// A damaged or unreadable persistence file is not fatal: the store starts
/// empty and logs a warning, so one corrupt snapshot never bricks startup.
pub struct EmbeddedScheduleStore {
    data: RwLock<StoreData>,
    persistence_path: Option<PathBuf>,
    persist_lock: AsyncMutex<()>,
}

impl EmbeddedScheduleStore {
    /// Purely in-memory store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(StoreData::default()),
            persistence_path: None,
            persist_lock: AsyncMutex::new(()),
        }
    }

    /// Store persisted under `dir/schedule.json`, loading any existing
    /// snapshot.
    pub fn with_persistence(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(STORE_FILE);
        let data = if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(raw) => match serde_json::from_str::<StoreData>(&raw) {
                    Ok(data) => {
                        debug!(path = %path.display(), weeks = data.weeks.len(), "loaded snapshot");
                        data
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "unreadable snapshot, starting empty");
                        StoreData::default()
                    }
                },
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "cannot read snapshot, starting empty");
                    StoreData::default()
                }
            }
        } else {
            StoreData::default()
        };
        Ok(Self {
            data: RwLock::new(data),
            persistence_path: Some(path),
            persist_lock: AsyncMutex::new(()),
        })
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, StoreData>> {
        self.data
            .read()
            .map_err(|_| ManegeError::Storage(StorageError::Poisoned))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, StoreData>> {
        self.data
            .write()
            .map_err(|_| ManegeError::Storage(StorageError::Poisoned))
    }

    /// Write the current snapshot to disk, atomically via a temp file.
    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock().await;
        let json = {
            let data = self.read()?;
            serde_json::to_string_pretty(&*data)?
        };
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json.as_bytes()).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), "persisted snapshot");
        Ok(())
    }

    /// Insert or replace a person.
    pub async fn upsert_person(&self, person: Person) -> Result<()> {
        {
            let mut data = self.write()?;
            match data.persons.iter_mut().find(|p| p.id == person.id) {
                Some(existing) => *existing = person,
                None => data.persons.push(person),
            }
        }
        self.persist().await
    }

    /// Insert or replace a resource.
    pub async fn upsert_resource(&self, resource: Resource) -> Result<()> {
        resource.validate()?;
        {
            let mut data = self.write()?;
            match data.resources.iter_mut().find(|r| r.id == resource.id) {
                Some(existing) => *existing = resource,
                None => data.resources.push(resource),
            }
        }
        self.persist().await
    }

    /// Insert or replace a recurring template.
    pub async fn upsert_template(&self, template: RecurringTemplate) -> Result<()> {
        {
            let mut data = self.write()?;
            match data.templates.iter_mut().find(|t| t.id == template.id) {
                Some(existing) => *existing = template,
                None => data.templates.push(template),
            }
        }
        self.persist().await
    }

    /// Deactivate a template without removing it; already-stored
    /// modifications keep their target until the next merge drops them.
    pub async fn deactivate_template(&self, template_id: &str) -> Result<bool> {
        let found = {
            let mut data = self.write()?;
            match data.templates.iter_mut().find(|t| t.id == template_id) {
                Some(template) => {
                    template.active = false;
                    template.updated_at = chrono::Utc::now();
                    true
                }
                None => false,
            }
        };
        if found {
            self.persist().await?;
        }
        Ok(found)
    }
}

impl Default for EmbeddedScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScheduleStore for EmbeddedScheduleStore {
    async fn list_persons(&self) -> Result<Vec<Person>> {
        Ok(self.read()?.persons.clone())
    }

    async fn list_resources(&self) -> Result<Vec<Resource>> {
        Ok(self.read()?.resources.clone())
    }

    async fn list_templates(&self) -> Result<Vec<RecurringTemplate>> {
        Ok(self.read()?.templates.clone())
    }

    async fn get_allocations(&self) -> Result<Vec<ResourceAllocation>> {
        Ok(self.read()?.allocations.clone())
    }

    async fn save_allocations(&self, allocations: Vec<ResourceAllocation>) -> Result<()> {
        {
            let mut data = self.write()?;
            data.allocations = allocations;
        }
        self.persist().await
    }

    async fn get_availability(&self) -> Result<WeekAvailability> {
        Ok(self.read()?.availability.clone())
    }

    async fn save_availability(&self, availability: WeekAvailability) -> Result<()> {
        {
            let mut data = self.write()?;
            data.availability = availability;
        }
        self.persist().await
    }

    async fn get_week_record(&self, week_key: &str) -> Result<VersionedWeekRecord> {
        Ok(self
            .read()?
            .weeks
            .get(week_key)
            .cloned()
            .unwrap_or_default())
    }

    async fn compare_and_swap_week(
        &self,
        week_key: &str,
        expected_version: u64,
        record: WeekRecord,
    ) -> Result<u64> {
        let new_version = {
            let mut data = self.write()?;
            let current = data
                .weeks
                .get(week_key)
                .map(|v| v.version)
                .unwrap_or_default();
            if current != expected_version {
                return Err(StorageError::VersionConflict {
                    week_key: week_key.to_string(),
                    expected: expected_version,
                    found: current,
                }
                .into());
            }
            let new_version = current + 1;
            // An emptied record keeps its slot so the version history survives.
            data.weeks.insert(
                week_key.to_string(),
                VersionedWeekRecord {
                    version: new_version,
                    record,
                },
            );
            new_version
        };
        self.persist().await?;
        Ok(new_version)
    }
}
