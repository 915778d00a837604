use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use nearcast_types::models::{CrowdOperation, FeedScope};

use crate::crowds::check_access;
use crate::models::{BoostRow, FeedCandidate, MESSAGE_COLUMNS, MessageRow, NewMessage, to_millis};
use crate::{Database, Result};

/// Max bound parameters per `IN (...)` batch.
const ID_BATCH: usize = 500;

impl Database {
    /// Insert a message expiring `active_minutes` after `now`. Crowd-scoped
    /// posts pass the membership gate inside the same transaction.
    pub fn insert_message(&self, new: &NewMessage, now: DateTime<Utc>) -> Result<MessageRow> {
        let row = MessageRow {
            id: Uuid::new_v4(),
            text: new.text.clone(),
            origin: new.origin,
            radius_meters: new.radius_meters,
            active_minutes: new.active_minutes,
            created_at: now,
            expires_at: now + Duration::minutes(i64::from(new.active_minutes)),
            owner_id: new.owner_id,
            boost_count: 0,
            crowd_id: new.crowd_id,
        };

        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if let Some(crowd_id) = row.crowd_id {
                check_access(&tx, CrowdOperation::Post, crowd_id, Some(row.owner_id), now)?;
            }

            tx.execute(
                "INSERT INTO messages (id, text, latitude, longitude, radius_meters, active_minutes,
                                       created_at, expires_at, owner_id, boost_count, crowd_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10)",
                rusqlite::params![
                    row.id.to_string(),
                    row.text,
                    row.origin.latitude,
                    row.origin.longitude,
                    row.radius_meters,
                    row.active_minutes,
                    to_millis(row.created_at),
                    to_millis(row.expires_at),
                    row.owner_id.to_string(),
                    row.crowd_id.map(|id| id.to_string()),
                ],
            )?;

            tx.commit()?;
            Ok(())
        })?;

        Ok(row)
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Unexpired messages in `scope`, in storage order (creation time, then
    /// id), each with all of its boosts. Distance filtering is left to the
    /// feed engine.
    pub fn feed_candidates(&self, scope: FeedScope, now: DateTime<Utc>) -> Result<Vec<FeedCandidate>> {
        self.with_conn(|conn| {
            let messages = query_live_messages(conn, scope, now)?;
            let ids: Vec<String> = messages.iter().map(|m| m.id.to_string()).collect();

            let mut boosts_by_message: HashMap<Uuid, Vec<BoostRow>> = HashMap::new();
            for boost in query_boosts_for(conn, &ids)? {
                boosts_by_message.entry(boost.message_id).or_default().push(boost);
            }

            Ok(messages
                .into_iter()
                .map(|message| FeedCandidate {
                    boosts: boosts_by_message.remove(&message.id).unwrap_or_default(),
                    message,
                })
                .collect())
        })
    }

    /// Batch-fetch boosts for a set of message ids.
    pub fn boosts_for_messages(&self, message_ids: &[Uuid]) -> Result<Vec<BoostRow>> {
        let ids: Vec<String> = message_ids.iter().map(Uuid::to_string).collect();
        self.with_conn(|conn| query_boosts_for(conn, &ids))
    }
}

pub(crate) fn query_message(conn: &Connection, id: Uuid) -> Result<Option<MessageRow>> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
    let row = conn
        .query_row(&sql, [id.to_string()], MessageRow::from_row)
        .optional()?;
    Ok(row)
}

fn query_live_messages(conn: &Connection, scope: FeedScope, now: DateTime<Utc>) -> Result<Vec<MessageRow>> {
    let rows = match scope {
        FeedScope::Global => {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE expires_at > ?1 AND crowd_id IS NULL
                 ORDER BY created_at ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map([to_millis(now)], MessageRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        FeedScope::Crowd(crowd_id) => {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE expires_at > ?1 AND crowd_id = ?2
                 ORDER BY created_at ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map(rusqlite::params![to_millis(now), crowd_id.to_string()], MessageRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };
    Ok(rows)
}

fn query_boosts_for(conn: &Connection, message_ids: &[String]) -> Result<Vec<BoostRow>> {
    let mut boosts = Vec::new();

    for batch in message_ids.chunks(ID_BATCH) {
        let placeholders: Vec<String> = (1..=batch.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT message_id, user_id, latitude, longitude, boosted_at
             FROM boosts WHERE message_id IN ({})
             ORDER BY boosted_at ASC",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(batch.iter()), BoostRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        boosts.extend(rows);
    }

    Ok(boosts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestDb, now};
    use crate::{DbError, Entity};
    use nearcast_types::models::Coordinate;

    const PORTLAND: Coordinate = Coordinate::new(45.5152, -122.6784);

    fn new_message(owner_id: Uuid, active_minutes: u32) -> NewMessage {
        NewMessage {
            text: "food truck on the corner".into(),
            origin: PORTLAND,
            radius_meters: 1000,
            active_minutes,
            owner_id,
            crowd_id: None,
        }
    }

    #[test]
    fn insert_sets_expiry_from_active_minutes() {
        let db = TestDb::new();
        let row = db.insert_message(&new_message(Uuid::new_v4(), 60), now()).unwrap();

        assert_eq!(row.expires_at - row.created_at, Duration::minutes(60));
        assert_eq!(row.boost_count, 0);
        assert_eq!(db.get_message(row.id).unwrap(), Some(row));
    }

    #[test]
    fn expired_messages_are_not_candidates() {
        let db = TestDb::new();
        let row = db.insert_message(&new_message(Uuid::new_v4(), 60), now()).unwrap();

        let live = db.feed_candidates(FeedScope::Global, now() + Duration::minutes(59)).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].message.id, row.id);

        let later = db.feed_candidates(FeedScope::Global, now() + Duration::minutes(61)).unwrap();
        assert!(later.is_empty());

        // Exactly at expiry the message is already gone.
        let edge = db.feed_candidates(FeedScope::Global, row.expires_at).unwrap();
        assert!(edge.is_empty());
    }

    #[test]
    fn crowd_posts_require_membership() {
        let db = TestDb::new();
        let owner = Uuid::new_v4();
        let crowd = db.create_crowd("c", true, owner, now()).unwrap();

        let mut outsider_post = new_message(Uuid::new_v4(), 30);
        outsider_post.crowd_id = Some(crowd.id);
        assert!(matches!(db.insert_message(&outsider_post, now()), Err(DbError::Forbidden)));

        let mut ghost_post = new_message(owner, 30);
        ghost_post.crowd_id = Some(Uuid::new_v4());
        assert!(matches!(
            db.insert_message(&ghost_post, now()),
            Err(DbError::NotFound(Entity::Crowd))
        ));

        let mut owner_post = new_message(owner, 30);
        owner_post.crowd_id = Some(crowd.id);
        db.insert_message(&owner_post, now()).unwrap();

        // Nothing leaked from the rejected attempts.
        assert_eq!(db.feed_candidates(FeedScope::Crowd(crowd.id), now()).unwrap().len(), 1);
        assert!(db.feed_candidates(FeedScope::Global, now()).unwrap().is_empty());
    }

    #[test]
    fn candidates_carry_their_boosts_in_storage_order() {
        let db = TestDb::new();
        let first = db.insert_message(&new_message(Uuid::new_v4(), 30), now()).unwrap();
        let second = db
            .insert_message(&new_message(Uuid::new_v4(), 30), now() + Duration::seconds(1))
            .unwrap();

        let booster = Uuid::new_v4();
        db.boost_message(second.id, booster, PORTLAND, now() + Duration::seconds(2))
            .unwrap();

        let candidates = db.feed_candidates(FeedScope::Global, now() + Duration::seconds(3)).unwrap();
        let ids: Vec<_> = candidates.iter().map(|c| c.message.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert!(candidates[0].boosts.is_empty());
        assert_eq!(candidates[1].boosts.len(), 1);
        assert_eq!(candidates[1].boosts[0].user_id, booster);
        assert_eq!(candidates[1].message.boost_count, 1);
    }

    #[test]
    fn boost_batches_span_chunk_boundaries() {
        let db = TestDb::new();
        let booster = Uuid::new_v4();
        let mut ids = Vec::new();
        for _ in 0..(ID_BATCH + 3) {
            let row = db.insert_message(&new_message(Uuid::new_v4(), 30), now()).unwrap();
            db.boost_message(row.id, booster, PORTLAND, now()).unwrap();
            ids.push(row.id);
        }

        let boosts = db.boosts_for_messages(&ids).unwrap();
        assert_eq!(boosts.len(), ID_BATCH + 3);
    }
}
