use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::KeyValueStore;
use crate::{IdentityError, Result};

const IDENTITY_KEY: &str = "identity";
const CROWD_IDENTITIES_KEY: &str = "crowd_identities";

/// The device's global token and the instant after which it may rotate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityState {
    pub token: Uuid,
    /// Latest expiry among the device's own live global content. `None`
    /// until something has been posted or boosted under this token.
    pub rotate_not_before: Option<DateTime<Utc>>,
}

impl IdentityState {
    fn fresh() -> Self {
        Self {
            token: Uuid::new_v4(),
            rotate_not_before: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.rotate_not_before.is_some_and(|clock| now > clock)
    }
}

/// Owns every read-modify-write of identity state on top of a
/// [`KeyValueStore`].
pub struct IdentityManager<S> {
    store: S,
    lock: Mutex<()>,
}

impl<S: KeyValueStore> IdentityManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current global token, creating one if none exists. Once `now` is past
    /// the rotation clock the token is replaced, the clock reset and the
    /// local records cleared.
    pub fn get_or_create_identity(&self, now: DateTime<Utc>) -> Result<Uuid> {
        let _guard = self.guard()?;

        match self.load::<IdentityState>(IDENTITY_KEY)? {
            Some(state) if !state.is_due(now) => Ok(state.token),
            Some(old) => {
                let state = IdentityState::fresh();
                self.save(IDENTITY_KEY, &state)?;
                self.clear_records_unlocked()?;
                info!(
                    rotate_not_before = ?old.rotate_not_before,
                    "Identity rotated and local records cleared"
                );
                Ok(state.token)
            }
            None => {
                let state = IdentityState::fresh();
                self.save(IDENTITY_KEY, &state)?;
                debug!("Identity created");
                Ok(state.token)
            }
        }
    }

    pub fn identity_state(&self) -> Result<Option<IdentityState>> {
        let _guard = self.guard()?;
        self.load(IDENTITY_KEY)
    }

    /// Move the rotation clock forward to `candidate` if it is later than the
    /// stored value. Returns whether the clock moved; with no identity stored
    /// there is nothing to advance.
    pub fn update_rotation_clock(&self, candidate: DateTime<Utc>) -> Result<bool> {
        let _guard = self.guard()?;
        self.advance_clock_unlocked(candidate)
    }

    /// Token for one crowd. Independent of the global token and never rotated.
    pub fn get_or_create_crowd_identity(&self, crowd_id: Uuid) -> Result<Uuid> {
        let _guard = self.guard()?;

        let mut crowds = self.crowd_identities()?;
        if let Some(token) = crowds.get(&crowd_id) {
            return Ok(*token);
        }

        let token = Uuid::new_v4();
        crowds.insert(crowd_id, token);
        self.save(CROWD_IDENTITIES_KEY, &crowds)?;
        debug!(%crowd_id, "Crowd identity created");
        Ok(token)
    }

    /// Forget the token for a crowd that was left. Returns whether one existed.
    pub fn delete_crowd_identity(&self, crowd_id: Uuid) -> Result<bool> {
        let _guard = self.guard()?;

        let mut crowds = self.crowd_identities()?;
        if crowds.remove(&crowd_id).is_none() {
            return Ok(false);
        }
        self.save(CROWD_IDENTITIES_KEY, &crowds)?;
        Ok(true)
    }

    fn crowd_identities(&self) -> Result<HashMap<Uuid, Uuid>> {
        Ok(self.load(CROWD_IDENTITIES_KEY)?.unwrap_or_default())
    }

    pub(crate) fn advance_clock_unlocked(&self, candidate: DateTime<Utc>) -> Result<bool> {
        let Some(mut state) = self.load::<IdentityState>(IDENTITY_KEY)? else {
            return Ok(false);
        };
        if state.rotate_not_before.is_some_and(|clock| clock >= candidate) {
            return Ok(false);
        }

        state.rotate_not_before = Some(candidate);
        self.save(IDENTITY_KEY, &state)?;
        Ok(true)
    }

    pub(crate) fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock.lock().map_err(|_| IdentityError::LockPoisoned)
    }

    pub(crate) fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.store.set(key, &serde_json::to_string(value)?)
    }
}
