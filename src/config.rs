use std::fs::File;
use std::net::SocketAddr;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub listen: SocketAddr,
    /// Absent means the in-process store is used.
    pub db: Option<DbInfo>,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
    /// JSON file with `members` and `gangs` arrays loaded into the in-process store.
    pub seed: Option<PathBuf>,
    admin_password: Option<String>,
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde(default)]
    pub site: SiteInfo,
    #[serde(default)]
    pub music: MusicInfo,
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Config {
    /// `ADMIN_PASSWORD` from the environment wins over the config file.
    pub fn admin_password(&self) -> Option<String> {
        match std::env::var("ADMIN_PASSWORD") {
            Ok(pass) if !pass.is_empty() => Some(pass),
            _ => self.admin_password.clone().filter(|p| !p.is_empty()),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct SiteInfo {
    pub title: String,
    pub subtitle: String,
}

impl Default for SiteInfo {
    fn default() -> Self {
        SiteInfo {
            title: "WELLESLEY".to_owned(),
            subtitle: "WELLESLEY MEMBERS".to_owned(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct MusicInfo {
    pub title: String,
    pub artist: String,
    pub audio_src: String,
    pub cover_src: String,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub volume: f64,
    pub save_interval_ms: u64,
}

impl Default for MusicInfo {
    fn default() -> Self {
        MusicInfo {
            title: "KMP IN MY HEART".to_owned(),
            artist: "KINGMEENPRO".to_owned(),
            audio_src: "/assets/music/song.mp3".to_owned(),
            cover_src: "/assets/music/cover.jpg".to_owned(),
            looping: true,
            volume: 0.7,
            save_interval_ms: 1000,
        }
    }
}

#[derive(Deserialize)]
pub struct DbInfo {
    user: String,
    password: String,
    host: String,
    database: String,
}

impl DbInfo {
    pub fn db_uri(&self) -> String {
        format!(
            "postgres://{}:{}@{}/{}",
            self.user, self.password, self.host, self.database
        )
    }
}

fn default_true() -> bool {
    true
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    let config_path = match std::env::args().nth(1) {
        Some(p) => p,
        None => {
            eprintln!("usage: member-directory <path to config file>");
            std::process::exit(1);
        }
    };
    let file = match File::open(config_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening config file: {e:#}");
            std::process::exit(2);
        }
    };
    match serde_yaml::from_reader(file) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error parsing config file: {e:#}");
            std::process::exit(2);
        }
    }
});
