mod parsing;
mod settings;
mod types;

pub(crate) use types::{GradingMode, GradingSettings, Settings};
