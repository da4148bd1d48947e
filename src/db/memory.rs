use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::models::{Gang, GangMember, Member, MemberFilter, NewGang, NewMember, Role};

/// In-process store used when no database is configured. Records keep their
/// insertion order so equal `(sort_order, created_at)` keys stay stable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    members: Vec<Member>,
    gangs: Vec<Gang>,
}

/// Static seed data, shaped like the API payloads.
#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub members: Vec<SeedMember>,
    #[serde(default)]
    pub gangs: Vec<NewGang>,
}

#[derive(Debug, Deserialize)]
pub struct SeedMember {
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub facebook_url: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

impl MemoryStore {
    pub fn from_seed(seed: Seed) -> Self {
        let mut store = MemoryStore::default();
        for m in seed.members {
            store.insert_member(&NewMember {
                name: m.name,
                role: m.role,
                facebook_url: m.facebook_url,
                avatar_url: m.avatar_url,
                sort_order: m.sort_order,
            });
        }
        for g in &seed.gangs {
            store.upsert_gang(g);
        }
        store
    }

    pub fn list_members(&self, filter: &MemberFilter) -> Vec<Member> {
        let mut members: Vec<Member> = self
            .members
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        // Stable sort keeps insertion order for full ties
        members.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then(a.created_at.cmp(&b.created_at))
        });
        members
    }

    pub fn insert_member(&mut self, new: &NewMember) -> Member {
        let member = Member {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            role: new.role,
            facebook_url: new.facebook_url.clone(),
            avatar_url: new.avatar_url.clone(),
            sort_order: new.sort_order,
            is_active: true,
            created_at: Utc::now(),
        };
        self.members.push(member.clone());
        member
    }

    pub fn deactivate_member(&mut self, id: Uuid) -> Option<Member> {
        let member = self.members.iter_mut().find(|m| m.id == id)?;
        member.is_active = false;
        Some(member.clone())
    }

    /// Looks a member up regardless of its active flag.
    pub fn get_member(&self, id: Uuid) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn list_gangs(&self) -> Vec<Gang> {
        let mut gangs = self.gangs.clone();
        gangs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        gangs
    }

    pub fn find_gang(&self, slug: &str) -> Option<Gang> {
        self.gangs
            .iter()
            .find(|g| same_slug(&g.slug, slug))
            .cloned()
    }

    pub fn upsert_gang(&mut self, new: &NewGang) -> Gang {
        let members: Vec<GangMember> = new.members.clone();
        match self
            .gangs
            .iter_mut()
            .find(|g| same_slug(&g.slug, &new.slug))
        {
            Some(gang) => {
                gang.name = new.name.clone();
                gang.description = new.description.clone();
                gang.members = members;
                gang.clone()
            }
            None => {
                let gang = Gang {
                    slug: new.slug.clone(),
                    name: new.name.clone(),
                    description: new.description.clone(),
                    members,
                    created_at: Utc::now(),
                };
                self.gangs.push(gang.clone());
                gang
            }
        }
    }
}

/// Slugs compare like Postgres `lower(a) = lower(b)`.
fn same_slug(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
