//! The DTU tier family for elastic pools

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::normalize::fold;

/// DTU elastic pool tier
///
/// vCore tiers (GeneralPurpose, BusinessCritical, Hyperscale) are a
/// different resource family and are deliberately not representable here.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    clap::ValueEnum,
)]
pub enum DtuTier {
    Basic,
    Standard,
    Premium,
}

/// Tier → pool SKU name table
const TIER_TABLE: [(DtuTier, &str, &str); 3] = [
    (DtuTier::Basic, "Basic", "BasicPool"),
    (DtuTier::Standard, "Standard", "StandardPool"),
    (DtuTier::Premium, "Premium", "PremiumPool"),
];

impl DtuTier {
    /// Canonical casing the API expects
    #[must_use]
    pub fn as_str(self) -> &'static str {
        TIER_TABLE[self as usize].1
    }

    /// Pool SKU name for this tier
    #[must_use]
    pub fn sku_name(self) -> &'static str {
        TIER_TABLE[self as usize].2
    }

    /// Case-insensitive lookup of a tier or edition name
    pub fn parse(name: &str) -> Option<Self> {
        let wanted = fold(name);
        TIER_TABLE
            .iter()
            .find(|(_, canon, _)| canon.to_lowercase() == wanted)
            .map(|(tier, _, _)| *tier)
    }
}

impl fmt::Display for DtuTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true if a pool SKU name belongs to the vCore family
///
/// vCore pool SKUs look like `GP_Gen5`, `BC_Gen5_4` or `HS_PRMS`.
pub fn is_vcore_sku_name(name: &str) -> bool {
    let upper = name.trim().to_uppercase();
    ["GP_", "BC_", "HS_"].iter().any(|p| upper.starts_with(p)) || upper.contains("_GEN")
}
