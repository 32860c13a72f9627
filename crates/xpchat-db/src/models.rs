//! Database row types. These map directly to SQLite rows and stay
//! independent from the xpchat-types models.

pub struct InviteRow {
    pub code: String,
    pub space_id: String,
    pub role: String,
    pub enabled: bool,
    pub created_at: String,
}

pub struct MemberRow {
    pub space_id: String,
    pub identity_id: String,
    pub display_name: String,
    pub role: String,
    pub invite_code: Option<String>,
    pub joined_at: String,
}

/// Result of redeeming an invite code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redemption {
    Joined,
    AlreadyMember,
    /// Unknown code, or a code issued for another space.
    Invalid,
    Disabled,
}
