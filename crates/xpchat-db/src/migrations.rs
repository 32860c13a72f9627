use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS invites (
            code        TEXT PRIMARY KEY,
            space_id    TEXT NOT NULL,
            role        TEXT NOT NULL DEFAULT 'member',
            enabled     INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS members (
            space_id      TEXT NOT NULL,
            identity_id   TEXT NOT NULL,
            display_name  TEXT NOT NULL,
            role          TEXT NOT NULL DEFAULT 'member',
            invite_code   TEXT REFERENCES invites(code),
            joined_at     TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (space_id, identity_id)
        );

        CREATE INDEX IF NOT EXISTS idx_invites_space
            ON invites(space_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
