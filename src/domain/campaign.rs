use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Budget and targeting state of one campaign.
///
/// Owned and mutated by the ledger only; the engine works on a cloned
/// snapshot per decision. After every committed spend
/// `0 <= spent_today <= daily_budget` and
/// `0 <= lifetime_spent <= lifetime_budget` hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignState {
    pub id: String,
    pub daily_budget: Decimal,
    #[serde(default)]
    pub spent_today: Decimal,
    pub lifetime_budget: Decimal,
    #[serde(default)]
    pub lifetime_spent: Decimal,
    #[serde(default)]
    pub target_cpa: Decimal,
    #[serde(default)]
    pub target_roas: Decimal,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub segments: Vec<String>,
    #[serde(default)]
    pub allowed_geos: Vec<String>,
    #[serde(default)]
    pub allowed_sites: Vec<String>,
}

fn default_active() -> bool {
    true
}

impl CampaignState {
    /// Active campaign with nothing spent and no targeting restrictions
    pub fn new(id: impl Into<String>, daily_budget: Decimal, lifetime_budget: Decimal) -> Self {
        Self {
            id: id.into(),
            daily_budget,
            spent_today: Decimal::ZERO,
            lifetime_budget,
            lifetime_spent: Decimal::ZERO,
            target_cpa: Decimal::ZERO,
            target_roas: Decimal::ZERO,
            is_active: true,
            segments: Vec::new(),
            allowed_geos: Vec::new(),
            allowed_sites: Vec::new(),
        }
    }

    pub fn with_target_cpa(mut self, target_cpa: Decimal) -> Self {
        self.target_cpa = target_cpa;
        self
    }

    pub fn with_target_roas(mut self, target_roas: Decimal) -> Self {
        self.target_roas = target_roas;
        self
    }

    pub fn with_spent(mut self, spent_today: Decimal, lifetime_spent: Decimal) -> Self {
        self.spent_today = spent_today;
        self.lifetime_spent = lifetime_spent;
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn with_allowed_geos<I, S>(mut self, geos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_geos = geos.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_allowed_sites<I, S>(mut self, sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_sites = sites.into_iter().map(Into::into).collect();
        self
    }

    /// Budget left for today, never negative
    pub fn remaining_daily(&self) -> Decimal {
        (self.daily_budget - self.spent_today).max(Decimal::ZERO)
    }

    /// Budget left over the campaign lifetime, never negative
    pub fn remaining_lifetime(&self) -> Decimal {
        (self.lifetime_budget - self.lifetime_spent).max(Decimal::ZERO)
    }

    pub fn daily_exhausted(&self) -> bool {
        self.spent_today >= self.daily_budget
    }

    pub fn lifetime_exhausted(&self) -> bool {
        self.lifetime_spent >= self.lifetime_budget
    }

    /// Empty allow-list means every geo is allowed
    pub fn allows_geo(&self, geo: &str) -> bool {
        self.allowed_geos.is_empty()
            || self.allowed_geos.iter().any(|g| g.eq_ignore_ascii_case(geo))
    }

    /// Empty allow-list means every site is allowed
    pub fn allows_site(&self, site: &str) -> bool {
        self.allowed_sites.is_empty()
            || self.allowed_sites.iter().any(|s| s.eq_ignore_ascii_case(site))
    }
}
