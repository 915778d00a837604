use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use nearcast_types::models::{Coordinate, CrowdOperation};

use crate::crowds::check_access;
use crate::messages::query_message;
use crate::models::to_millis;
use crate::{Database, DbError, Entity, Result};

impl Database {
    /// Record a boost of `message_id` by `user_id` from `location`.
    ///
    /// Checks run in this order: NotFound, SelfBoostRejected, Expired, the
    /// crowd gate for crowd-scoped messages, then AlreadyBoosted. The boost row
    /// and the `boost_count` increment commit together or not at all.
    pub fn boost_message(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        location: Coordinate,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let message = query_message(&tx, message_id)?.ok_or(DbError::NotFound(Entity::Message))?;
            if message.owner_id == user_id {
                return Err(DbError::SelfBoostRejected);
            }
            if now >= message.expires_at {
                return Err(DbError::Expired(Entity::Message));
            }
            if let Some(crowd_id) = message.crowd_id {
                check_access(&tx, CrowdOperation::Boost, crowd_id, Some(user_id), now)?;
            }

            let inserted = tx.execute(
                "INSERT INTO boosts (message_id, user_id, latitude, longitude, boosted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (message_id, user_id) DO NOTHING",
                rusqlite::params![
                    message_id.to_string(),
                    user_id.to_string(),
                    location.latitude,
                    location.longitude,
                    to_millis(now),
                ],
            )?;
            if inserted == 0 {
                debug!(%message_id, "Duplicate boost rejected");
                return Err(DbError::AlreadyBoosted);
            }

            tx.execute(
                "UPDATE messages SET boost_count = boost_count + 1 WHERE id = ?1",
                [message_id.to_string()],
            )?;

            tx.commit()?;
            Ok(())
        })
    }

    pub fn has_boosted(&self, message_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM boosts WHERE message_id = ?1 AND user_id = ?2",
                    [message_id.to_string(), user_id.to_string()],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Number of boost rows for a message, counted from the ledger itself
    /// rather than the denormalized counter.
    pub fn count_boost_rows(&self, message_id: Uuid) -> Result<u32> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM boosts WHERE message_id = ?1",
                [message_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMessage;
    use crate::testing::{TestDb, now};
    use chrono::Duration;

    const PORTLAND: Coordinate = Coordinate::new(45.5152, -122.6784);
    const SEATTLE: Coordinate = Coordinate::new(47.6062, -122.3321);

    fn post(db: &TestDb, owner_id: Uuid, crowd_id: Option<Uuid>) -> crate::models::MessageRow {
        db.insert_message(
            &NewMessage {
                text: "lost cat, orange".into(),
                origin: PORTLAND,
                radius_meters: 1000,
                active_minutes: 60,
                owner_id,
                crowd_id,
            },
            now(),
        )
        .unwrap()
    }

    fn boost_count(db: &TestDb, id: Uuid) -> u32 {
        db.get_message(id).unwrap().unwrap().boost_count
    }

    #[test]
    fn boost_inserts_row_and_bumps_counter() {
        let db = TestDb::new();
        let msg = post(&db, Uuid::new_v4(), None);
        let booster = Uuid::new_v4();

        db.boost_message(msg.id, booster, SEATTLE, now()).unwrap();

        assert!(db.has_boosted(msg.id, booster).unwrap());
        assert_eq!(boost_count(&db, msg.id), 1);
        assert_eq!(db.count_boost_rows(msg.id).unwrap(), 1);
    }

    #[test]
    fn second_boost_by_same_observer_is_rejected() {
        let db = TestDb::new();
        let msg = post(&db, Uuid::new_v4(), None);
        let booster = Uuid::new_v4();

        db.boost_message(msg.id, booster, SEATTLE, now()).unwrap();
        let again = db.boost_message(msg.id, booster, PORTLAND, now());

        assert!(matches!(again, Err(DbError::AlreadyBoosted)));
        assert_eq!(boost_count(&db, msg.id), 1);
    }

    #[test]
    fn missing_message_is_not_found() {
        let db = TestDb::new();
        let result = db.boost_message(Uuid::new_v4(), Uuid::new_v4(), SEATTLE, now());
        assert!(matches!(result, Err(DbError::NotFound(Entity::Message))));
    }

    #[test]
    fn expired_message_cannot_be_boosted() {
        let db = TestDb::new();
        let msg = post(&db, Uuid::new_v4(), None);

        let result = db.boost_message(msg.id, Uuid::new_v4(), SEATTLE, msg.expires_at);
        assert!(matches!(result, Err(DbError::Expired(Entity::Message))));
        assert_eq!(boost_count(&db, msg.id), 0);
    }

    #[test]
    fn self_boost_is_rejected_even_when_expired() {
        let db = TestDb::new();
        let owner = Uuid::new_v4();
        let msg = post(&db, owner, None);

        for at in [now(), msg.expires_at + Duration::hours(1)] {
            for location in [PORTLAND, SEATTLE] {
                let result = db.boost_message(msg.id, owner, location, at);
                assert!(matches!(result, Err(DbError::SelfBoostRejected)));
            }
        }
        assert_eq!(boost_count(&db, msg.id), 0);
    }

    #[test]
    fn crowd_messages_need_membership_to_boost() {
        let db = TestDb::new();
        let owner = Uuid::new_v4();
        let crowd = db.create_crowd("c", true, owner, now()).unwrap();
        let msg = post(&db, owner, Some(crowd.id));
        let outsider = Uuid::new_v4();

        let result = db.boost_message(msg.id, outsider, SEATTLE, now());
        assert!(matches!(result, Err(DbError::Forbidden)));

        db.join_crowd(crowd.id, outsider, now()).unwrap();
        db.boost_message(msg.id, outsider, SEATTLE, now()).unwrap();
        assert_eq!(boost_count(&db, msg.id), 1);
    }

    #[test]
    fn concurrent_identical_boosts_count_once() {
        let db = TestDb::new();
        let msg = post(&db, Uuid::new_v4(), None);
        let booster = Uuid::new_v4();
        let (store, id): (&Database, Uuid) = (&db, msg.id);

        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| s.spawn(move || store.boost_message(id, booster, SEATTLE, now())))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter(|r| r.is_err())
                .all(|r| matches!(r, Err(DbError::AlreadyBoosted)))
        );
        assert_eq!(boost_count(&db, msg.id), 1);
        assert_eq!(db.count_boost_rows(msg.id).unwrap(), 1);
    }

    #[test]
    fn counter_tracks_ledger_across_observers() {
        let db = TestDb::new();
        let msg = post(&db, Uuid::new_v4(), None);

        for _ in 0..5 {
            db.boost_message(msg.id, Uuid::new_v4(), SEATTLE, now()).unwrap();
        }

        assert_eq!(boost_count(&db, msg.id), 5);
        assert_eq!(db.count_boost_rows(msg.id).unwrap(), 5);
    }
}
