#[path = "../fixtures.rs"]
mod fixtures;

mod api;
mod concurrency;
mod dal;
mod health;
mod lifecycle;
mod resource_metrics;
