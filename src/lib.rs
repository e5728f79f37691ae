pub mod config;
pub mod context;
pub mod conversation;
pub mod distillation;
pub mod errors;
pub mod evaluation;
pub mod experiment;
pub mod generation;
pub mod logging;
pub mod report;
pub mod ui;
