use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE crowds (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                owner_id    TEXT NOT NULL,
                is_open     INTEGER NOT NULL,
                created_at  INTEGER NOT NULL,
                expires_at  INTEGER NOT NULL,
                CHECK (expires_at > created_at)
            );

            CREATE INDEX idx_crowds_expires ON crowds(expires_at);

            CREATE TABLE memberships (
                crowd_id    TEXT NOT NULL REFERENCES crowds(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL,
                joined_at   INTEGER NOT NULL,
                PRIMARY KEY (crowd_id, user_id)
            );

            CREATE INDEX idx_memberships_user ON memberships(user_id);

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                text            TEXT NOT NULL,
                latitude        REAL NOT NULL,
                longitude       REAL NOT NULL,
                radius_meters   INTEGER NOT NULL CHECK (radius_meters > 0),
                active_minutes  INTEGER NOT NULL CHECK (active_minutes > 0),
                created_at      INTEGER NOT NULL,
                expires_at      INTEGER NOT NULL,
                owner_id        TEXT NOT NULL,
                boost_count     INTEGER NOT NULL DEFAULT 0 CHECK (boost_count >= 0),
                crowd_id        TEXT REFERENCES crowds(id) ON DELETE CASCADE,
                CHECK (expires_at > created_at)
            );

            CREATE INDEX idx_messages_expires ON messages(expires_at);
            CREATE INDEX idx_messages_crowd ON messages(crowd_id, expires_at);

            CREATE TABLE boosts (
                message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL,
                latitude    REAL NOT NULL,
                longitude   REAL NOT NULL,
                boosted_at  INTEGER NOT NULL,
                PRIMARY KEY (message_id, user_id)
            );

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
