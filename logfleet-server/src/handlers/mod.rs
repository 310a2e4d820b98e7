//! HTTP request handlers organized by functionality

pub mod agent;
pub mod dispatch;
pub mod health;
pub mod logs;
pub mod registry;
pub mod replicate;
