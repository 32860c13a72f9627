use crate::Database;
use crate::models::{InviteRow, MemberRow, Redemption};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

impl Database {
    // -- Invites --

    /// Create or overwrite an invite. Codes are stored as given; callers
    /// normalize them first.
    pub fn upsert_invite(&self, code: &str, space_id: &str, role: &str, enabled: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO invites (code, space_id, role, enabled) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(code) DO UPDATE SET space_id = ?2, role = ?3, enabled = ?4",
                rusqlite::params![code, space_id, role, enabled],
            )?;
            Ok(())
        })
    }

    pub fn get_invite(&self, code: &str) -> Result<Option<InviteRow>> {
        self.with_conn(|conn| query_invite(conn, code))
    }

    pub fn set_invite_enabled(&self, code: &str, enabled: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE invites SET enabled = ?2 WHERE code = ?1",
                rusqlite::params![code, enabled],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Members --

    pub fn is_member(&self, space_id: &str, identity_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM members WHERE space_id = ?1 AND identity_id = ?2",
                    [space_id, identity_id],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Add a member directly, without an invite. Existing members are kept.
    pub fn add_member(&self, space_id: &str, identity_id: &str, display_name: &str, role: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO members (space_id, identity_id, display_name, role)
                 VALUES (?1, ?2, ?3, ?4)",
                [space_id, identity_id, display_name, role],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn list_members(&self, space_id: &str) -> Result<Vec<MemberRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT space_id, identity_id, display_name, role, invite_code, joined_at
                 FROM members
                 WHERE space_id = ?1
                 ORDER BY joined_at, identity_id",
            )?;

            let rows = stmt
                .query_map([space_id], |row| {
                    Ok(MemberRow {
                        space_id: row.get(0)?,
                        identity_id: row.get(1)?,
                        display_name: row.get(2)?,
                        role: row.get(3)?,
                        invite_code: row.get(4)?,
                        joined_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Check the invite and add the member in one transaction.
    pub fn redeem_invite(
        &self,
        code: &str,
        space_id: &str,
        identity_id: &str,
        display_name: &str,
    ) -> Result<Redemption> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let invite = match query_invite(&tx, code)? {
                Some(invite) if invite.space_id == space_id => invite,
                _ => return Ok(Redemption::Invalid),
            };
            if !invite.enabled {
                return Ok(Redemption::Disabled);
            }

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO members (space_id, identity_id, display_name, role, invite_code)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                [space_id, identity_id, display_name, invite.role.as_str(), code],
            )?;
            tx.commit()?;

            Ok(if inserted > 0 {
                Redemption::Joined
            } else {
                Redemption::AlreadyMember
            })
        })
    }
}

fn query_invite(conn: &Connection, code: &str) -> Result<Option<InviteRow>> {
    let mut stmt =
        conn.prepare("SELECT code, space_id, role, enabled, created_at FROM invites WHERE code = ?1")?;

    let row = stmt
        .query_row([code], |row| {
            Ok(InviteRow {
                code: row.get(0)?,
                space_id: row.get(1)?,
                role: row.get(2)?,
                enabled: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}
