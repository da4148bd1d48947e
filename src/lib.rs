pub mod config;
pub mod db;
pub mod player;
pub mod web;
