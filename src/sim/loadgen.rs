use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use super::generator::{COUNTRIES, OPERATING_SYSTEMS, SITE_DOMAINS};
use crate::adapters::openrtb::{Banner, BidRequest, Device, Format, Geo, Imp, Site, User};
use crate::error::Result;

pub const DEFAULT_TARGET: &str = "http://localhost:8080/openrtb";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome counts of a load run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub sent: u64,
    pub bids: u64,
    pub no_bids: u64,
    pub errors: u64,
}

/// Posts synthetic OpenRTB requests to a running bidder
pub struct LoadGenerator {
    client: Client,
    target_url: String,
    delay: Duration,
    rng: StdRng,
}

impl LoadGenerator {
    pub fn new(target_url: impl Into<String>, seed: u64) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            target_url: target_url.into(),
            delay: Duration::from_millis(50),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// One banner impression with site, device and user context
    pub fn synthetic_request(&mut self, n: u64) -> BidRequest {
        let rng = &mut self.rng;
        // 0.5000 ..< 2.0000 CPM
        let floor = Decimal::new(rng.gen_range(5_000..20_000), 4);
        let pick = |rng: &mut StdRng, table: &[&str]| {
            table.choose(rng).copied().unwrap_or_default().to_string()
        };
        let os = pick(rng, OPERATING_SYSTEMS);
        let domain = pick(rng, SITE_DOMAINS);
        let country = pick(rng, COUNTRIES);
        let devicetype = if matches!(os.as_str(), "iOS" | "Android") { 4 } else { 2 };

        BidRequest {
            id: format!("loadgen-{}-{}", n, uuid::Uuid::new_v4().simple()),
            imp: vec![Imp {
                id: "1".to_string(),
                bidfloor: floor,
                banner: Some(Banner {
                    w: Some(300),
                    h: Some(250),
                    format: vec![Format { w: 300, h: 250 }],
                }),
                ..Imp::default()
            }],
            site: Some(Site {
                id: Some(format!("site-{}", domain.split('.').next().unwrap_or_default())),
                domain: Some(domain),
                page: None,
            }),
            device: Some(Device {
                os: Some(os),
                devicetype: Some(devicetype),
                ua: None,
                geo: Some(Geo {
                    country: Some(country),
                }),
            }),
            user: Some(User {
                id: Some(format!("user-{}", rng.gen_range(0..10_000))),
                buyeruid: None,
                geo: None,
            }),
            ..BidRequest::default()
        }
    }

    /// Send `count` requests one after another. Transport failures are
    /// counted, not raised.
    pub async fn run(&mut self, count: u64) -> LoadReport {
        info!(count, target = %self.target_url, "load generator starting");
        let mut report = LoadReport::default();

        for n in 0..count {
            let req = self.synthetic_request(n);
            report.sent += 1;

            match self.client.post(&self.target_url).json(&req).send().await {
                Ok(resp) if resp.status() == StatusCode::OK => report.bids += 1,
                Ok(resp) if resp.status() == StatusCode::NO_CONTENT => report.no_bids += 1,
                Ok(resp) => {
                    report.errors += 1;
                    warn!(request = n, status = %resp.status(), "unexpected status");
                }
                Err(e) => {
                    report.errors += 1;
                    warn!(request = n, error = %e, "request failed");
                }
            }

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        info!(
            sent = report.sent,
            bids = report.bids,
            no_bids = report.no_bids,
            errors = report.errors,
            "load generator finished"
        );
        report
    }
}
