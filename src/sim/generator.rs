use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::domain::{InventoryFormat, Opportunity};

pub const OPERATING_SYSTEMS: &[&str] = &["iOS", "Android", "Windows", "macOS"];

pub const SITE_DOMAINS: &[&str] = &[
    "news.example.com",
    "sports.example.com",
    "travel.example.com",
    "tech.example.com",
    "finance.example.com",
];

pub const COUNTRIES: &[&str] = &["US", "CA", "GB", "DE", "FR", "JP"];

/// Share of traffic tagged `EU`; the rest is `US`
const EU_SHARE: f64 = 0.3;
const DESKTOP_SHARE: f64 = 0.4;

/// Floor range in CPM, at 4 decimal places: 0.5000 ..< 2.5000
const FLOOR_MIN_BPS: i64 = 5_000;
const FLOOR_MAX_BPS: i64 = 25_000;

/// Synthetic opportunity source with fixed categorical distributions.
///
/// Owns its RNG, so two generators with the same seed yield the same stream.
pub struct OpportunityGenerator {
    rng: StdRng,
    next_id: u64,
}

impl OpportunityGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            next_id: 0,
        }
    }

    /// Sample the opportunity with the given sequence number
    pub fn sample(&mut self, n: u64) -> Opportunity {
        let geo = if self.rng.gen::<f64>() < EU_SHARE { "EU" } else { "US" };
        let device = if self.rng.gen::<f64>() < DESKTOP_SHARE {
            "desktop"
        } else {
            "mobile"
        };
        let os = OPERATING_SYSTEMS.choose(&mut self.rng).copied().unwrap_or_default();
        let site = SITE_DOMAINS.choose(&mut self.rng).copied().unwrap_or_default();
        let floor = Decimal::new(self.rng.gen_range(FLOOR_MIN_BPS..FLOOR_MAX_BPS), 4);

        Opportunity::new(format!("sim-auction-{n}"))
            .with_geo(geo)
            .with_device(device, os)
            .with_site(site)
            .with_slot("slot-1", InventoryFormat::Banner, 300, 250)
            .with_floor(floor)
    }

    /// Next `count` opportunities of the stream
    pub fn batch(&mut self, count: usize) -> Vec<Opportunity> {
        self.by_ref().take(count).collect()
    }
}

impl Iterator for OpportunityGenerator {
    type Item = Opportunity;

    fn next(&mut self) -> Option<Opportunity> {
        let opp = self.sample(self.next_id);
        self.next_id += 1;
        Some(opp)
    }
}
