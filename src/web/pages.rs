use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;
use serde_json::Value;

use crate::db::models::{Gang, GangMember, Member, MemberFilter, Role};

use super::auth::AdminSession;
use super::error::ApiError;
use super::layout::{render, Layout};
use super::members::{parse_id, MemberPayload};
use super::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub role: Option<String>,
}

impl SearchQuery {
    fn text(&self) -> &str {
        self.q.as_deref().map(str::trim).unwrap_or("")
    }
}

pub struct CardView {
    pub class: &'static str,
    pub name: String,
    /// `ROLE • sort_order` badge, empty for gang rosters.
    pub tag: String,
    pub detail: String,
    pub avatar: Option<String>,
    pub social: bool,
    pub link: Option<String>,
}

impl CardView {
    fn member(m: &Member) -> Self {
        CardView {
            class: m.role.as_str(),
            name: m.name.clone(),
            tag: format!("{} • {}", m.role.as_str().to_uppercase(), m.sort_order),
            detail: String::new(),
            avatar: m.avatar_url.clone(),
            social: true,
            link: m.facebook_url.clone(),
        }
    }

    fn gang_member(m: &GangMember, role: Role) -> Self {
        CardView {
            class: role.as_str(),
            name: m.name.clone(),
            tag: String::new(),
            detail: m.role.as_deref().unwrap_or(role.label()).to_owned(),
            avatar: m.image.clone(),
            social: false,
            link: None,
        }
    }
}

pub struct SectionView {
    pub title: &'static str,
    /// Zero padded, e.g. `03`.
    pub count: String,
    pub cards: Vec<CardView>,
}

/// Splits already ordered items into founder/leader/member sections.
pub fn group_by_role<'a, T>(
    items: &'a [T],
    role_of: impl Fn(&T) -> Role,
) -> [(Role, Vec<&'a T>); 3] {
    Role::ALL.map(|role| (role, items.iter().filter(|i| role_of(*i) == role).collect()))
}

fn sections<T>(
    items: &[T],
    role_of: impl Fn(&T) -> Role,
    card: impl Fn(&T, Role) -> CardView,
) -> Vec<SectionView> {
    group_by_role(items, role_of)
        .into_iter()
        .map(|(role, group)| SectionView {
            title: role.section_title(),
            count: format!("{:02}", group.len()),
            cards: group.into_iter().map(|item| card(item, role)).collect(),
        })
        .collect()
}

pub struct GangLink {
    /// Percent-encoded slug.
    pub path: String,
    pub name: String,
}

#[derive(Template)]
#[template(path = "directory.html")]
pub struct DirectoryPage<'a> {
    pub layout: Layout<'a>,
    pub q: String,
    pub gangs: Vec<GangLink>,
    pub sections: Vec<SectionView>,
}

#[derive(Template)]
#[template(path = "gang.html")]
pub struct GangPage<'a> {
    pub layout: Layout<'a>,
    pub name: String,
    pub description: String,
    pub sections: Vec<SectionView>,
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundPage<'a> {
    pub layout: Layout<'a>,
    pub slug: String,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage<'a> {
    pub layout: Layout<'a>,
}

pub struct RoleOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

fn role_options(selected: Option<Role>) -> Vec<RoleOption> {
    Role::ALL
        .iter()
        .map(|&role| RoleOption {
            value: role.as_str(),
            label: role.label(),
            selected: selected == Some(role),
        })
        .collect()
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardPage<'a> {
    pub layout: Layout<'a>,
    pub q: String,
    pub filter_roles: Vec<RoleOption>,
    pub form_roles: Vec<RoleOption>,
    pub error: Option<String>,
    pub members: Vec<Member>,
}

fn directory_matches(m: &Member, q: &str) -> bool {
    q.is_empty() || format!("{} {}", m.name, m.role).to_lowercase().contains(&q.to_lowercase())
}

pub async fn directory(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Html<String>, ApiError> {
    let q = query.text();
    let members: Vec<Member> = state
        .store
        .list_members(&MemberFilter::default())
        .await?
        .into_iter()
        .filter(|m| directory_matches(m, q))
        .collect();
    let gangs = state
        .store
        .list_gangs()
        .await?
        .into_iter()
        .map(|gang| GangLink {
            path: utf8_percent_encode(&gang.slug, NON_ALPHANUMERIC).to_string(),
            name: gang.name,
        })
        .collect();
    render(&DirectoryPage {
        layout: Layout::new(&state.site, &state.music),
        q: q.to_owned(),
        gangs,
        sections: sections(&members, |m| m.role, |m, _| CardView::member(m)),
    })
}

fn gang_sections(gang: &Gang) -> Vec<SectionView> {
    sections(
        &gang.members,
        |m| Role::normalize(m.role.as_deref().unwrap_or("")),
        CardView::gang_member,
    )
}

pub async fn gang_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let layout = Layout::new(&state.site, &state.music);
    match state.store.find_gang(&slug).await? {
        Some(gang) => Ok(render(&GangPage {
            layout,
            sections: gang_sections(&gang),
            name: gang.name,
            description: gang.description,
        })?
        .into_response()),
        None => Ok((StatusCode::NOT_FOUND, render(&NotFoundPage { layout, slug })?).into_response()),
    }
}

pub async fn login_page(
    State(state): State<AppState>,
    session: Option<AdminSession>,
) -> Result<Response, ApiError> {
    if session.is_some() {
        return Ok(Redirect::to("/admin/dashboard").into_response());
    }
    Ok(render(&LoginPage {
        layout: Layout::new(&state.site, &state.music),
    })?
    .into_response())
}

async fn render_dashboard(
    state: &AppState,
    query: &SearchQuery,
    error: Option<String>,
) -> Result<Html<String>, ApiError> {
    let role = query.role.as_deref().and_then(|r| r.parse().ok());
    let filter = MemberFilter {
        role,
        query: Some(query.text().to_owned()).filter(|q| !q.is_empty()),
    };
    let members = state.store.list_members(&filter).await?;
    render(&DashboardPage {
        layout: Layout::new(&state.site, &state.music),
        q: query.text().to_owned(),
        filter_roles: role_options(role),
        form_roles: role_options(Some(Role::Member)),
        error,
        members,
    })
}

pub async fn dashboard(
    State(state): State<AppState>,
    session: Option<AdminSession>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, ApiError> {
    if session.is_none() {
        return Ok(Redirect::to("/admin").into_response());
    }
    Ok(render_dashboard(&state, &query, None).await?.into_response())
}

#[derive(Debug, Deserialize)]
pub struct MemberForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    facebook_url: String,
    #[serde(default)]
    avatar_url: String,
    #[serde(default)]
    sort_order: String,
}

impl From<MemberForm> for MemberPayload {
    fn from(form: MemberForm) -> Self {
        MemberPayload {
            name: Some(Value::String(form.name)),
            role: Some(Value::String(form.role)),
            facebook_url: Some(Value::String(form.facebook_url)),
            avatar_url: Some(Value::String(form.avatar_url)),
            sort_order: Some(Value::String(form.sort_order)),
        }
    }
}

pub async fn add_member_form(
    State(state): State<AppState>,
    _session: AdminSession,
    Form(form): Form<MemberForm>,
) -> Result<Response, ApiError> {
    let new = match MemberPayload::from(form).validate() {
        Ok(new) => new,
        Err(e) => {
            let html = render_dashboard(&state, &SearchQuery::default(), Some(e.to_string())).await?;
            return Ok((e.status(), html).into_response());
        }
    };
    let member = state.store.insert_member(&new).await?;
    tracing::info!("Added {} `{}` ({}) from dashboard", member.role, member.name, member.id);
    Ok(Redirect::to("/admin/dashboard").into_response())
}

pub async fn remove_member_form(
    State(state): State<AppState>,
    _session: AdminSession,
    Path(id): Path<String>,
) -> Result<Redirect, ApiError> {
    let id = parse_id(Some(&id))?;
    if let Some(member) = state.store.deactivate_member(id).await? {
        tracing::info!("Removed member `{}` ({id}) from dashboard", member.name);
    }
    Ok(Redirect::to("/admin/dashboard"))
}
