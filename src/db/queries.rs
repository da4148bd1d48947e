use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::models::{Gang, GangRow, Member, MemberFilter, MemberRow, NewGang, NewMember};

pub async fn list_members(pool: &Pool<Postgres>, filter: &MemberFilter) -> sqlx::Result<Vec<Member>> {
    let pattern = filter.query.as_deref().map(like_pattern);
    sqlx::query_as::<_, MemberRow>(
        "SELECT * FROM members
         WHERE is_active
           AND ($1::text IS NULL OR role = $1)
           AND ($2::text IS NULL OR name ILIKE $2)
         ORDER BY sort_order ASC, created_at ASC, seq ASC;",
    )
    .bind(filter.role.map(|r| r.as_str()))
    .bind(pattern)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(Member::try_from)
    .collect()
}

pub async fn insert_member(pool: &Pool<Postgres>, member: &NewMember) -> sqlx::Result<Member> {
    let row: MemberRow = sqlx::query_as(
        "INSERT INTO members (name, role, facebook_url, avatar_url, sort_order, is_active)
         VALUES ($1, $2, $3, $4, $5, true) RETURNING *;",
    )
    .bind(&member.name)
    .bind(member.role.as_str())
    .bind(&member.facebook_url)
    .bind(&member.avatar_url)
    .bind(member.sort_order)
    .fetch_one(pool)
    .await?;
    row.try_into()
}

pub async fn deactivate_member(pool: &Pool<Postgres>, id: Uuid) -> sqlx::Result<Option<Member>> {
    sqlx::query_as::<_, MemberRow>("UPDATE members SET is_active = false WHERE id = $1 RETURNING *;")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(Member::try_from)
        .transpose()
}

pub async fn list_gangs(pool: &Pool<Postgres>) -> sqlx::Result<Vec<Gang>> {
    let rows: Vec<GangRow> = sqlx::query_as("SELECT * FROM gangs ORDER BY created_at ASC, seq ASC;")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Gang::from).collect())
}

pub async fn find_gang(pool: &Pool<Postgres>, slug: &str) -> sqlx::Result<Option<Gang>> {
    sqlx::query_as::<_, GangRow>("SELECT * FROM gangs WHERE lower(slug) = lower($1);")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .map(|row| row.map(Gang::from))
}

pub async fn upsert_gang(pool: &Pool<Postgres>, gang: &NewGang) -> sqlx::Result<Gang> {
    let row: GangRow = sqlx::query_as(
        "INSERT INTO gangs (slug, name, description, members) VALUES ($1, $2, $3, $4)
         ON CONFLICT ((lower(slug))) DO
         UPDATE SET name = $2, description = $3, members = $4
         RETURNING *;",
    )
    .bind(&gang.slug)
    .bind(&gang.name)
    .bind(&gang.description)
    .bind(sqlx::types::Json(&gang.members))
    .fetch_one(pool)
    .await?;
    Ok(row.into())
}

/// Substring pattern for ILIKE with the wildcard characters of `query` escaped.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
