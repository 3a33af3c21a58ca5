//! Terminal commands and their presentation

pub mod growth;
pub mod ratios;
pub mod setup;
pub mod ui;
pub mod watch;
