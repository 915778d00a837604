use chrono::{DateTime, Utc};
use rusqlite::TransactionBehavior;
use tracing::debug;

use crate::models::to_millis;
use crate::{Database, Result};

/// Rows removed by a purge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    pub messages: usize,
    pub boosts: usize,
    pub crowds: usize,
    pub memberships: usize,
}

impl PurgeReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn absorb(&mut self, other: PurgeReport) {
        self.messages += other.messages;
        self.boosts += other.boosts;
        self.crowds += other.crowds;
        self.memberships += other.memberships;
    }
}

// The batch of expired ids is picked by the same deterministic subquery in
// every statement of a batch; inside one IMMEDIATE transaction it resolves to
// the same set each time.
const EXPIRED_MESSAGES: &str =
    "SELECT id FROM messages WHERE expires_at <= ?1 ORDER BY expires_at, id LIMIT ?2";
const EXPIRED_CROWDS: &str =
    "SELECT id FROM crowds WHERE expires_at <= ?1 ORDER BY expires_at, id LIMIT ?2";

impl Database {
    /// Delete every message and crowd with `expires_at <= now`, together with
    /// their boosts, memberships and (for crowds) crowd-scoped messages.
    ///
    /// Work is split into transactions of at most `batch_size` parents so the
    /// writer lock is released between batches. Counts come from rows actually
    /// deleted, so overlapping runs never double-count.
    pub fn purge_expired(&self, now: DateTime<Utc>, batch_size: usize) -> Result<PurgeReport> {
        let batch_size = batch_size.max(1);
        let mut report = PurgeReport::default();

        loop {
            let batch = self.purge_message_batch(now, batch_size)?;
            report.absorb(batch);
            if batch.messages < batch_size {
                break;
            }
        }

        loop {
            let batch = self.purge_crowd_batch(now, batch_size)?;
            report.absorb(batch);
            if batch.crowds < batch_size {
                break;
            }
        }

        Ok(report)
    }

    fn purge_message_batch(&self, now: DateTime<Utc>, batch_size: usize) -> Result<PurgeReport> {
        let (cutoff, limit) = (to_millis(now), batch_size as i64);
        let params = rusqlite::params![cutoff, limit];

        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let boosts = tx.execute(
                &format!("DELETE FROM boosts WHERE message_id IN ({EXPIRED_MESSAGES})"),
                params,
            )?;
            let messages = tx.execute(
                &format!("DELETE FROM messages WHERE id IN ({EXPIRED_MESSAGES})"),
                params,
            )?;

            tx.commit()?;
            debug!(messages, boosts, "Purged expired message batch");
            Ok(PurgeReport {
                messages,
                boosts,
                ..PurgeReport::default()
            })
        })
    }

    fn purge_crowd_batch(&self, now: DateTime<Utc>, batch_size: usize) -> Result<PurgeReport> {
        let (cutoff, limit) = (to_millis(now), batch_size as i64);
        let params = rusqlite::params![cutoff, limit];

        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let boosts = tx.execute(
                &format!(
                    "DELETE FROM boosts WHERE message_id IN
                        (SELECT id FROM messages WHERE crowd_id IN ({EXPIRED_CROWDS}))"
                ),
                params,
            )?;
            let messages = tx.execute(
                &format!("DELETE FROM messages WHERE crowd_id IN ({EXPIRED_CROWDS})"),
                params,
            )?;
            let memberships = tx.execute(
                &format!("DELETE FROM memberships WHERE crowd_id IN ({EXPIRED_CROWDS})"),
                params,
            )?;
            let crowds = tx.execute(
                &format!("DELETE FROM crowds WHERE id IN ({EXPIRED_CROWDS})"),
                params,
            )?;

            tx.commit()?;
            debug!(crowds, memberships, messages, boosts, "Purged expired crowd batch");
            Ok(PurgeReport {
                messages,
                boosts,
                crowds,
                memberships,
            })
        })
    }
}
