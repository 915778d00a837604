use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use nearcast_types::models::{CROWD_LIFETIME_HOURS, CrowdOperation};

use crate::models::{CROWD_COLUMNS, CrowdMembershipRow, CrowdRow, to_millis};
use crate::{Database, DbError, Entity, Result};

impl Database {
    /// Create a crowd and its owner's membership in one transaction.
    pub fn create_crowd(
        &self,
        name: &str,
        is_open: bool,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<CrowdRow> {
        let crowd = CrowdRow {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id,
            is_open,
            created_at: now,
            expires_at: now + Duration::hours(CROWD_LIFETIME_HOURS),
        };

        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute(
                "INSERT INTO crowds (id, name, owner_id, is_open, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    crowd.id.to_string(),
                    crowd.name,
                    crowd.owner_id.to_string(),
                    crowd.is_open,
                    to_millis(crowd.created_at),
                    to_millis(crowd.expires_at),
                ],
            )?;
            tx.execute(
                "INSERT INTO memberships (crowd_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![crowd.id.to_string(), owner_id.to_string(), to_millis(now)],
            )?;
            tx.commit()?;
            Ok(())
        })?;

        Ok(crowd)
    }

    pub fn get_crowd(&self, crowd_id: Uuid) -> Result<Option<CrowdRow>> {
        self.with_conn(|conn| query_crowd(conn, crowd_id))
    }

    /// Membership gate for crowd-scoped operations. A `None` crowd is the
    /// global scope and always passes.
    pub fn authorize(
        &self,
        op: CrowdOperation,
        crowd_id: Option<Uuid>,
        user_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some(crowd_id) = crowd_id else {
            return Ok(());
        };

        self.with_conn(|conn| check_access(conn, op, crowd_id, user_id, now))
    }

    /// Join an open crowd. The duplicate check and the insert are one
    /// conditional statement, so concurrent joins cannot both succeed.
    pub fn join_crowd(&self, crowd_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let crowd = query_crowd(&tx, crowd_id)?.ok_or(DbError::NotFound(Entity::Crowd))?;
            if crowd.is_expired(now) {
                return Err(DbError::Expired(Entity::Crowd));
            }
            if !crowd.is_open {
                return Err(DbError::Closed);
            }

            let inserted = tx.execute(
                "INSERT INTO memberships (crowd_id, user_id, joined_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (crowd_id, user_id) DO NOTHING",
                rusqlite::params![crowd_id.to_string(), user_id.to_string(), to_millis(now)],
            )?;
            if inserted == 0 {
                return Err(DbError::AlreadyMember);
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Remove a membership if it exists. Returns whether a row was removed;
    /// leaving a crowd you are not in is not an error.
    pub fn leave_crowd(&self, crowd_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM memberships WHERE crowd_id = ?1 AND user_id = ?2",
                rusqlite::params![crowd_id.to_string(), user_id.to_string()],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn is_member(&self, crowd_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| query_is_member(conn, crowd_id, user_id))
    }

    pub fn member_count(&self, crowd_id: Uuid) -> Result<u32> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM memberships WHERE crowd_id = ?1",
                [crowd_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Live crowds the user belongs to, soonest-expiring first, with member
    /// counts fetched in the same query.
    pub fn crowds_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Vec<CrowdMembershipRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, c.owner_id, c.is_open, c.created_at, c.expires_at,
                        (SELECT COUNT(*) FROM memberships m WHERE m.crowd_id = c.id)
                 FROM crowds c
                 JOIN memberships me ON me.crowd_id = c.id AND me.user_id = ?1
                 WHERE c.expires_at > ?2
                 ORDER BY c.expires_at ASC, c.id ASC",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![user_id.to_string(), to_millis(now)], |row| {
                    Ok(CrowdMembershipRow {
                        crowd: CrowdRow::from_row(row)?,
                        member_count: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

/// Gate check shared by [`Database::authorize`] and by the writes that must
/// re-check inside their own transaction.
pub(crate) fn check_access(
    conn: &Connection,
    op: CrowdOperation,
    crowd_id: Uuid,
    user_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<()> {
    gate(conn, crowd_id, user_id, now)
        .inspect_err(|e| debug!(%op, %crowd_id, "Crowd access denied: {}", e))
}

/// NotFound, then Expired, then Forbidden.
fn gate(conn: &Connection, crowd_id: Uuid, user_id: Option<Uuid>, now: DateTime<Utc>) -> Result<()> {
    let crowd = query_crowd(conn, crowd_id)?.ok_or(DbError::NotFound(Entity::Crowd))?;
    if crowd.is_expired(now) {
        return Err(DbError::Expired(Entity::Crowd));
    }

    match user_id {
        Some(user_id) if query_is_member(conn, crowd_id, user_id)? => Ok(()),
        _ => Err(DbError::Forbidden),
    }
}

fn query_crowd(conn: &Connection, crowd_id: Uuid) -> Result<Option<CrowdRow>> {
    let sql = format!("SELECT {CROWD_COLUMNS} FROM crowds WHERE id = ?1");
    let row = conn
        .query_row(&sql, [crowd_id.to_string()], CrowdRow::from_row)
        .optional()?;
    Ok(row)
}

fn query_is_member(conn: &Connection, crowd_id: Uuid, user_id: Uuid) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM memberships WHERE crowd_id = ?1 AND user_id = ?2",
            [crowd_id.to_string(), user_id.to_string()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestDb, now};

    #[test]
    fn create_adds_owner_membership_and_24h_expiry() {
        let db = TestDb::new();
        let owner = Uuid::new_v4();

        let crowd = db.create_crowd("night market", true, owner, now()).unwrap();

        assert_eq!(crowd.expires_at - crowd.created_at, Duration::hours(24));
        assert!(db.is_member(crowd.id, owner).unwrap());
        assert_eq!(db.member_count(crowd.id).unwrap(), 1);
        assert_eq!(db.get_crowd(crowd.id).unwrap(), Some(crowd));
    }

    #[test]
    fn gate_passes_global_scope_without_checks() {
        let db = TestDb::new();
        db.authorize(CrowdOperation::Post, None, None, now()).unwrap();
    }

    #[test]
    fn gate_rejections_are_distinct() {
        let db = TestDb::new();
        let owner = Uuid::new_v4();
        let crowd = db.create_crowd("c", true, owner, now()).unwrap();

        let missing = db.authorize(CrowdOperation::ViewFeed, Some(Uuid::new_v4()), Some(owner), now());
        assert!(matches!(missing, Err(DbError::NotFound(Entity::Crowd))));

        let stranger = db.authorize(CrowdOperation::Post, Some(crowd.id), Some(Uuid::new_v4()), now());
        assert!(matches!(stranger, Err(DbError::Forbidden)));

        let anonymous = db.authorize(CrowdOperation::ViewFeed, Some(crowd.id), None, now());
        assert!(matches!(anonymous, Err(DbError::Forbidden)));

        let later = crowd.expires_at;
        let expired = db.authorize(CrowdOperation::Boost, Some(crowd.id), Some(owner), later);
        assert!(matches!(expired, Err(DbError::Expired(Entity::Crowd))));

        db.authorize(CrowdOperation::Post, Some(crowd.id), Some(owner), now()).unwrap();
    }

    #[test]
    fn closed_crowd_rejects_joiners_and_keeps_owner() {
        let db = TestDb::new();
        let owner = Uuid::new_v4();
        let crowd = db.create_crowd("private", false, owner, now()).unwrap();

        let result = db.join_crowd(crowd.id, Uuid::new_v4(), now());
        assert!(matches!(result, Err(DbError::Closed)));

        assert!(db.is_member(crowd.id, owner).unwrap());
        assert_eq!(db.member_count(crowd.id).unwrap(), 1);
    }

    #[test]
    fn join_rejects_duplicates_missing_and_expired() {
        let db = TestDb::new();
        let crowd = db.create_crowd("open", true, Uuid::new_v4(), now()).unwrap();
        let user = Uuid::new_v4();

        db.join_crowd(crowd.id, user, now()).unwrap();
        assert!(matches!(db.join_crowd(crowd.id, user, now()), Err(DbError::AlreadyMember)));
        assert_eq!(db.member_count(crowd.id).unwrap(), 2);

        assert!(matches!(
            db.join_crowd(Uuid::new_v4(), user, now()),
            Err(DbError::NotFound(Entity::Crowd))
        ));
        assert!(matches!(
            db.join_crowd(crowd.id, Uuid::new_v4(), crowd.expires_at),
            Err(DbError::Expired(Entity::Crowd))
        ));
    }

    #[test]
    fn concurrent_joins_insert_once() {
        let db = TestDb::new();
        let crowd = db.create_crowd("race", true, Uuid::new_v4(), now()).unwrap();
        let user = Uuid::new_v4();
        let (store, id): (&Database, Uuid) = (&db, crowd.id);

        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(move || store.join_crowd(id, user, now())))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter(|r| r.is_err())
                .all(|r| matches!(r, Err(DbError::AlreadyMember)))
        );
        assert_eq!(db.member_count(crowd.id).unwrap(), 2);
    }

    #[test]
    fn leave_is_idempotent() {
        let db = TestDb::new();
        let crowd = db.create_crowd("c", true, Uuid::new_v4(), now()).unwrap();
        let user = Uuid::new_v4();
        db.join_crowd(crowd.id, user, now()).unwrap();

        assert!(db.leave_crowd(crowd.id, user).unwrap());
        assert_eq!(db.member_count(crowd.id).unwrap(), 1);
        assert!(!db.leave_crowd(crowd.id, user).unwrap());
        assert_eq!(db.member_count(crowd.id).unwrap(), 1);
        assert!(!db.leave_crowd(Uuid::new_v4(), user).unwrap());
    }

    #[test]
    fn crowds_for_user_lists_live_memberships() {
        let db = TestDb::new();
        let me = Uuid::new_v4();
        let mine = db.create_crowd("mine", false, me, now()).unwrap();
        let joined = db
            .create_crowd("joined", true, Uuid::new_v4(), now() + Duration::minutes(5))
            .unwrap();
        db.join_crowd(joined.id, me, now() + Duration::minutes(6)).unwrap();
        db.create_crowd("other", true, Uuid::new_v4(), now()).unwrap();

        let listed = db.crowds_for_user(me, now() + Duration::minutes(10)).unwrap();
        let names: Vec<_> = listed.iter().map(|r| r.crowd.name.as_str()).collect();
        assert_eq!(names, vec!["mine", "joined"]);
        assert_eq!(listed[1].member_count, 2);

        // Past the first crowd's expiry, only the later one remains.
        let listed = db.crowds_for_user(me, mine.expires_at).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].crowd.id, joined.id);
    }
}
