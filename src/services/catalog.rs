//! Merch catalog for drop 01

use serde::Serialize;

/// Sizes offered for every garment, smallest first.
pub const SIZES: [&str; 6] = ["XS", "S", "M", "L", "XL", "XXL"];

/// Size preselected on the merch page
pub const DEFAULT_SIZE: &str = "M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MerchStatus {
    ComingSoon,
    Live,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchItem {
    pub id: &'static str,
    pub name: &'static str,
    pub tag: &'static str,
    /// Whole US dollars
    pub price_usd: u32,
    pub status: MerchStatus,
    pub description: &'static str,
    pub colors: &'static [&'static str],
}

impl MerchItem {
    /// Display price, e.g. `$54`
    pub fn price_label(&self) -> String {
        format!("${}", self.price_usd)
    }
}

pub fn catalog() -> Vec<MerchItem> {
    vec![
        MerchItem {
            id: "og-hoodie",
            name: "OG Ghostrider Hoodie",
            tag: "Drop 01 • Core",
            price_usd: 54,
            status: MerchStatus::ComingSoon,
            description: "Heavyweight fleece hoodie with a subtle chest print and big back hit. Built for late-night grinding.",
            colors: &["Midnight Black", "Storm Grey"],
        },
        MerchItem {
            id: "signal-hoodie",
            name: "Signal Glow Hoodie",
            tag: "Drop 01 • Limited",
            price_usd: 64,
            status: MerchStatus::ComingSoon,
            description: "Gradient 'signal' print inspired by the GhostriderJunior glow. Soft but structured.",
            colors: &["Obsidian", "Night Sky"],
        },
        MerchItem {
            id: "badge-tee",
            name: "Badge Tee",
            tag: "Essentials",
            price_usd: 32,
            status: MerchStatus::ComingSoon,
            description: "Everyday tee with a minimal front badge. Clean enough for IRL, comfy enough for the setup.",
            colors: &["Washed Black", "Bone"],
        },
    ]
}

/// Canonical form of a size if it is one we sell.
pub fn normalize_size(size: &str) -> Option<&'static str> {
    let wanted = size.trim().to_ascii_uppercase();
    SIZES.iter().copied().find(|s| *s == wanted)
}
