//! OpenRTB 2.5 JSON subset
//!
//! Only the fields the bidder reads or writes are modelled; unknown fields
//! are ignored on input. Conversion into the engine's [`Opportunity`]
//! applies the first-impression policy.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::audit::AuditRecord;
use crate::domain::{Decision, InventoryFormat, Opportunity, PrivacyFlags};
use crate::error::Result;
use crate::validation::{validate_auction_id, validate_floor};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BidRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub imp: Vec<Imp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regs: Option<Regs>,
    /// Exchange deadline in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmax: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Imp {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native: Option<Native>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagid: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub bidfloor: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bidfloorcur: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Format {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Banner {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub format: Vec<Format>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Video {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mimes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Native {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Site {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct App {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Geo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Device {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    /// OpenRTB device type code (table 5.21)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devicetype: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ua: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyeruid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegsExt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gdpr: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub us_privacy: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Regs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coppa: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<RegsExt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: String,
    pub impid: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub crid: String,
    #[serde(default)]
    pub adomain: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatBid {
    pub seat: String,
    pub bid: Vec<Bid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidResponse {
    pub id: String,
    pub seatbid: Vec<SeatBid>,
    pub bidid: String,
    pub cur: String,
}

impl Imp {
    /// Format and size, taking `banner.format[0]` before `banner.w/h`
    pub fn slot(&self) -> (InventoryFormat, u32, u32) {
        if let Some(banner) = &self.banner {
            let (w, h) = match banner.format.first() {
                Some(f) => (f.w, f.h),
                None => (banner.w.unwrap_or(0), banner.h.unwrap_or(0)),
            };
            (InventoryFormat::Banner, w, h)
        } else if let Some(video) = &self.video {
            (
                InventoryFormat::Video,
                video.w.unwrap_or(0),
                video.h.unwrap_or(0),
            )
        } else if self.native.is_some() {
            (InventoryFormat::Native, 0, 0)
        } else {
            (InventoryFormat::Banner, 0, 0)
        }
    }

    /// Publisher placement id, falling back to the impression id
    pub fn inventory_id(&self) -> &str {
        self.tagid.as_deref().filter(|t| !t.is_empty()).unwrap_or(&self.id)
    }
}

impl BidRequest {
    pub fn first_imp(&self) -> Option<&Imp> {
        self.imp.first()
    }

    /// Country from the device geo, falling back to the user geo
    pub fn country(&self) -> &str {
        let device = self.device.as_ref().and_then(|d| d.geo.as_ref());
        let user = self.user.as_ref().and_then(|u| u.geo.as_ref());
        device
            .and_then(|g| g.country.as_deref())
            .or_else(|| user.and_then(|g| g.country.as_deref()))
            .unwrap_or_default()
    }

    pub fn privacy(&self) -> PrivacyFlags {
        let Some(regs) = &self.regs else {
            return PrivacyFlags::default();
        };
        let ext = regs.ext.as_ref();
        PrivacyFlags {
            gdpr: ext.and_then(|e| e.gdpr) == Some(1),
            coppa: regs.coppa == Some(1),
            ccpa: ext
                .and_then(|e| e.us_privacy.as_deref())
                .is_some_and(us_privacy_applies),
        }
    }
}

/// A US privacy string applies unless every signal is "not applicable"
fn us_privacy_applies(s: &str) -> bool {
    s.len() == 4 && s.starts_with('1') && s[1..].chars().any(|c| c != '-')
}

/// Map an OpenRTB device type code to the engine's device class
pub fn device_class(devicetype: Option<u8>) -> &'static str {
    match devicetype {
        Some(1) | Some(4) | Some(5) => "mobile",
        Some(2) => "desktop",
        Some(3) | Some(7) => "ctv",
        _ => "unknown",
    }
}

/// Normalize a bid request into one opportunity.
///
/// `Ok(None)` when the request carries no impression. Only the first
/// impression is considered.
pub fn to_opportunity(req: &BidRequest) -> Result<Option<Opportunity>> {
    validate_auction_id(&req.id)?;
    let Some(imp) = req.first_imp() else {
        return Ok(None);
    };
    validate_floor(imp.bidfloor)?;

    let (format, w, h) = imp.slot();
    let device = req.device.as_ref();

    let mut opp = Opportunity::new(req.id.clone())
        .with_slot(imp.inventory_id(), format, w, h)
        .with_floor(imp.bidfloor)
        .with_geo(req.country())
        .with_device(
            device_class(device.and_then(|d| d.devicetype)),
            device.and_then(|d| d.os.clone()).unwrap_or_default(),
        )
        .with_privacy(req.privacy());

    if let Some(domain) = req.site.as_ref().and_then(|s| s.domain.as_deref()) {
        opp = opp.with_site(domain);
    }
    if let Some(bundle) = req.app.as_ref().and_then(|a| a.bundle.as_deref()) {
        opp = opp.with_app(bundle);
    }
    if let Some(user_id) = req
        .user
        .as_ref()
        .and_then(|u| u.id.as_deref())
        .filter(|id| !id.is_empty())
    {
        opp = opp.with_user(user_id);
    }

    Ok(Some(opp))
}

/// Render a bid decision for the first impression; `None` for a no-bid
pub fn build_bid_response(req: &BidRequest, decision: &Decision, seat_id: &str) -> Option<BidResponse> {
    if !decision.should_bid {
        return None;
    }
    let imp = req.first_imp()?;
    let (_, w, h) = imp.slot();

    let bid = Bid {
        id: uuid::Uuid::new_v4().to_string(),
        impid: imp.id.clone(),
        price: decision.bid_cpm,
        crid: decision.creative_id.clone(),
        adomain: vec![decision.advertiser_domain.clone()],
        w: (w > 0).then_some(w),
        h: (h > 0).then_some(h),
    };

    Some(BidResponse {
        id: req.id.clone(),
        seatbid: vec![SeatBid {
            seat: seat_id.to_string(),
            bid: vec![bid],
        }],
        bidid: uuid::Uuid::new_v4().to_string(),
        cur: "USD".to_string(),
    })
}

/// Audit record carrying the wire-level identifiers the opportunity drops
pub fn audit_record(req: &BidRequest, opp: &Opportunity, seat_id: &str) -> AuditRecord {
    let mut rec = AuditRecord::from_opportunity(seat_id, opp);
    if let Some(imp) = req.first_imp() {
        rec.imp.id = imp.id.clone();
    }
    rec.site.id = req
        .site
        .as_ref()
        .and_then(|s| s.id.clone())
        .or_else(|| req.app.as_ref().and_then(|a| a.id.clone()))
        .unwrap_or_default();
    if let Some(user) = &req.user {
        rec.user.buyeruid = user.buyeruid.clone().unwrap_or_default();
    }
    rec
}
