pub mod app;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod healpix;
pub mod manifest;
pub mod output;
pub mod properties;
pub mod resolution;
pub mod store;
pub mod tiles;
pub mod tui;
