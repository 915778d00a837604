//! Local cache of which messages this device posted or boosted, so the UI
//! can mark them without asking the server.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;
use crate::identity::IdentityManager;
use crate::store::KeyValueStore;

const OWN_MESSAGES_KEY: &str = "own_messages";
const BOOSTED_MESSAGES_KEY: &str = "boosted_messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRecord {
    pub id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl<S: KeyValueStore> IdentityManager<S> {
    /// Remember a message this device posted. Global messages also push the
    /// rotation clock out to their expiry; crowd messages were posted under a
    /// crowd token and leave it alone.
    pub fn record_own_message(
        &self,
        id: Uuid,
        expires_at: DateTime<Utc>,
        crowd_id: Option<Uuid>,
    ) -> Result<()> {
        let _guard = self.guard()?;
        self.push_record(OWN_MESSAGES_KEY, LocalRecord { id, expires_at })?;
        if crowd_id.is_none() {
            self.advance_clock_unlocked(expires_at)?;
        }
        Ok(())
    }

    /// Remember a boost, with the same clock rule as posting.
    pub fn record_boost(&self, id: Uuid, expires_at: DateTime<Utc>, crowd_id: Option<Uuid>) -> Result<()> {
        let _guard = self.guard()?;
        self.push_record(BOOSTED_MESSAGES_KEY, LocalRecord { id, expires_at })?;
        if crowd_id.is_none() {
            self.advance_clock_unlocked(expires_at)?;
        }
        Ok(())
    }

    pub fn owned_message_ids(&self) -> Result<HashSet<Uuid>> {
        self.record_ids(OWN_MESSAGES_KEY)
    }

    pub fn boosted_message_ids(&self) -> Result<HashSet<Uuid>> {
        self.record_ids(BOOSTED_MESSAGES_KEY)
    }

    /// Drop records whose message has expired. Returns how many were removed.
    pub fn prune_expired_records(&self, now: DateTime<Utc>) -> Result<usize> {
        let _guard = self.guard()?;

        let mut removed = 0;
        for key in [OWN_MESSAGES_KEY, BOOSTED_MESSAGES_KEY] {
            let records = self.records(key)?;
            let live: Vec<LocalRecord> = records.iter().copied().filter(|r| r.expires_at > now).collect();
            if live.len() != records.len() {
                removed += records.len() - live.len();
                self.save(key, &live)?;
            }
        }
        Ok(removed)
    }

    pub fn clear_records(&self) -> Result<()> {
        let _guard = self.guard()?;
        self.clear_records_unlocked()
    }

    pub(crate) fn clear_records_unlocked(&self) -> Result<()> {
        self.store().remove(OWN_MESSAGES_KEY)?;
        self.store().remove(BOOSTED_MESSAGES_KEY)
    }

    fn records(&self, key: &str) -> Result<Vec<LocalRecord>> {
        Ok(self.load(key)?.unwrap_or_default())
    }

    fn record_ids(&self, key: &str) -> Result<HashSet<Uuid>> {
        let _guard = self.guard()?;
        Ok(self.records(key)?.into_iter().map(|r| r.id).collect())
    }

    fn push_record(&self, key: &str, record: LocalRecord) -> Result<()> {
        let mut records = self.records(key)?;
        if !records.iter().any(|r| r.id == record.id) {
            records.push(record);
            self.save(key, &records)?;
        }
        Ok(())
    }
}
