use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Founder,
    Leader,
    Member,
}

#[derive(Debug, Error)]
#[error("role must be founder/leader/member")]
pub struct InvalidRole;

impl Role {
    pub const ALL: [Role; 3] = [Role::Founder, Role::Leader, Role::Member];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Founder => "founder",
            Role::Leader => "leader",
            Role::Member => "member",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Founder => "Founder",
            Role::Leader => "Leader",
            Role::Member => "Member",
        }
    }

    pub fn section_title(self) -> &'static str {
        match self {
            Role::Founder => "FOUNDERS",
            Role::Leader => "LEADERS",
            Role::Member => "MEMBERS",
        }
    }

    /// Lenient mapping used for display grouping. Unknown text lands in `Member`.
    pub fn normalize(text: &str) -> Role {
        match text.trim().to_lowercase().as_str() {
            "founder" | "founders" | "owner" | "boss" | "admin" => Role::Founder,
            "leader" | "leaders" | "mod" | "manager" => Role::Leader,
            _ => Role::Member,
        }
    }
}

/// Strict parse, only the three stored values are accepted.
impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "founder" => Ok(Role::Founder),
            "leader" => Ok(Role::Leader),
            "member" => Ok(Role::Member),
            _ => Err(InvalidRole),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directory entry. Records are never removed: `is_active = false` marks a
/// soft-deleted member that is kept in the store but hidden from listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub facebook_url: Option<String>,
    pub avatar_url: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
pub(super) struct MemberRow {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub facebook_url: Option<String>,
    pub avatar_url: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MemberRow> for Member {
    type Error = sqlx::Error;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse()
            .map_err(|e: InvalidRole| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Member {
            id: row.id,
            name: row.name,
            role,
            facebook_url: row.facebook_url,
            avatar_url: row.avatar_url,
            sort_order: row.sort_order,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

/// Already validated insert payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMember {
    pub name: String,
    pub role: Role,
    pub facebook_url: Option<String>,
    pub avatar_url: Option<String>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    pub role: Option<Role>,
    /// Case-insensitive name substring.
    pub query: Option<String>,
}

impl MemberFilter {
    pub fn matches(&self, member: &Member) -> bool {
        if !member.is_active {
            return false;
        }
        if let Some(role) = self.role {
            if member.role != role {
                return false;
            }
        }
        match &self.query {
            Some(q) => member.name.to_lowercase().contains(&q.to_lowercase()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GangMember {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gang {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub members: Vec<GangMember>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
pub(super) struct GangRow {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub members: sqlx::types::Json<Vec<GangMember>>,
    pub created_at: DateTime<Utc>,
}

impl From<GangRow> for Gang {
    fn from(row: GangRow) -> Self {
        Gang {
            slug: row.slug,
            name: row.name,
            description: row.description,
            members: row.members.0,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewGang {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub members: Vec<GangMember>,
}
