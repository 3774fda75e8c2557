use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod target;

pub use target::*;

/// Selects the content fetcher strategy for a target.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RenderingMode {
    #[default]
    Static,
    Rendered,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum TargetStatus {
    #[default]
    #[serde(rename = "Not Checked")]
    NotChecked,
    #[serde(rename = "In Stock")]
    InStock,
    #[serde(rename = "Out of Stock")]
    OutOfStock,
    #[serde(rename = "Error")]
    Error,
}

impl TargetStatus {
    pub fn from_availability(available: bool) -> Self {
        if available {
            TargetStatus::InStock
        } else {
            TargetStatus::OutOfStock
        }
    }
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TargetStatus::NotChecked => "Not Checked",
            TargetStatus::InStock => "In Stock",
            TargetStatus::OutOfStock => "Out of Stock",
            TargetStatus::Error => "Error",
        };
        f.pad(label)
    }
}

impl std::str::FromStr for RenderingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(RenderingMode::Static),
            "rendered" | "dynamic" => Ok(RenderingMode::Rendered),
            other => Err(format!("unknown rendering mode: {}", other)),
        }
    }
}

// Helper function to generate ids in the format stored in the target list
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
