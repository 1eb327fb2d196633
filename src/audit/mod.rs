//! Per-auction audit trail
//!
//! One [`AuditRecord`] per evaluated opportunity, handed to an
//! [`AuditLogger`] that delivers it off the request path. Delivery is
//! best-effort: a full queue drops the record and a failing sink is counted,
//! neither ever reaches the caller.

pub mod logger;
pub mod sink;

pub use logger::{AuditLogger, AuditStats};
pub use sink::{AuditSink, HttpSink, JsonLinesSink, TracingSink};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Decision, Opportunity, ReasonCode};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpAudit {
    pub id: String,
    pub fmt: String,
    pub w: u32,
    pub h: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub floor_cpm: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceAudit {
    pub os: String,
    pub devicetype: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteAudit {
    pub domain: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserAudit {
    pub id: String,
    pub buyeruid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionAudit {
    pub should_bid: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub bid_cpm: Decimal,
    pub reason: ReasonCode,
}

impl From<&Decision> for DecisionAudit {
    fn from(d: &Decision) -> Self {
        Self {
            should_bid: d.should_bid,
            bid_cpm: d.bid_cpm,
            reason: d.reason,
        }
    }
}

/// Structured record of one auction, serialised as one JSON object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// RFC 3339 with nanoseconds, UTC
    pub ts: String,
    pub auction_id: String,
    pub seat_id: String,
    pub imp: ImpAudit,
    pub device: DeviceAudit,
    pub geo: String,
    pub site: SiteAudit,
    pub user: UserAudit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionAudit>,
}

impl AuditRecord {
    /// Record for an opportunity, stamped now
    pub fn from_opportunity(seat_id: impl Into<String>, opp: &Opportunity) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
            auction_id: opp.auction_id.clone(),
            seat_id: seat_id.into(),
            imp: ImpAudit {
                id: opp.inventory_id.clone(),
                fmt: opp.format.as_str().to_string(),
                w: opp.width,
                h: opp.height,
                floor_cpm: opp.floor_cpm,
            },
            device: DeviceAudit {
                os: opp.os.clone(),
                devicetype: opp.device_type.clone(),
            },
            geo: opp.geo.clone(),
            site: SiteAudit {
                domain: opp.inventory_source().to_string(),
                id: String::new(),
            },
            user: UserAudit {
                id: opp.user_id.clone().unwrap_or_default(),
                buyeruid: String::new(),
            },
            decision: None,
        }
    }

    pub fn with_decision(mut self, decision: &Decision) -> Self {
        self.decision = Some(decision.into());
        self
    }

    /// Partition key for downstream storage
    pub fn partition_key(&self) -> &str {
        &self.auction_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InventoryFormat;
    use rust_decimal_macros::dec;

    #[test]
    fn record_serialises_with_wire_field_names() {
        let opp = Opportunity::new("auction-7")
            .with_slot("1", InventoryFormat::Banner, 300, 250)
            .with_floor(dec!(1.25))
            .with_device("mobile", "iOS")
            .with_geo("US")
            .with_site("news.example.com")
            .with_user("u-1");
        let decision = Decision::bid(dec!(280), "cr", "example.com", ReasonCode::SimpleValueStrategy);

        let rec = AuditRecord::from_opportunity("1234", &opp).with_decision(&decision);
        let json = serde_json::to_value(&rec).unwrap();

        assert_eq!(json["auction_id"], "auction-7");
        assert_eq!(json["seat_id"], "1234");
        assert_eq!(json["imp"]["fmt"], "banner");
        assert_eq!(json["imp"]["w"], 300);
        assert_eq!(json["imp"]["floor_cpm"], 1.25);
        assert_eq!(json["device"]["devicetype"], "mobile");
        assert_eq!(json["site"]["domain"], "news.example.com");
        assert_eq!(json["user"]["id"], "u-1");
        assert_eq!(json["decision"]["reason"], "simple_value_strategy");
        assert!(json["ts"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn decision_is_omitted_until_known() {
        let rec = AuditRecord::from_opportunity("1234", &Opportunity::new("a"));
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("decision").is_none());
    }
}
