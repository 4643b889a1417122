//! Terminal frontend: report rendering and configuration setup

pub mod report;
pub mod setup;
pub mod ui;
