pub mod api;
pub mod common_utils;
pub mod configure;
pub mod db;
pub mod logger;
pub mod models;
pub mod queue_estimator;
pub mod reconciler;
pub mod settlement;
