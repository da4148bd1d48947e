use askama::Template;
use axum::response::Html;

use crate::config::{MusicInfo, SiteInfo};
use crate::player::{format_time, PlayerOptions};

use super::error::ApiError;

/// Context every page hands to `base.html`. The base template is the only
/// place the music widget is rendered, so each page carries exactly one.
pub struct Layout<'a> {
    pub site: &'a SiteInfo,
    pub music: &'a MusicInfo,
    pub player: PlayerOptions,
}

impl<'a> Layout<'a> {
    pub fn new(site: &'a SiteInfo, music: &'a MusicInfo) -> Self {
        Layout {
            site,
            music,
            player: PlayerOptions::from(music),
        }
    }

    pub fn zero_time(&self) -> String {
        format_time(0.0)
    }
}

pub fn render(template: &impl Template) -> Result<Html<String>, ApiError> {
    Ok(Html(template.render()?))
}
