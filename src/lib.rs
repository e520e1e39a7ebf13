#![allow(clippy::new_without_default)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod background;
pub mod config;
pub mod geo_point;
pub mod location;
pub mod logs;
pub mod looper;
pub mod map_view;
pub mod overlay;
pub mod polyline;
pub mod preferences;
pub mod road;
pub mod route_fetcher;
pub mod routing;
pub mod screen;
pub mod task_scope;
pub mod view_state;
