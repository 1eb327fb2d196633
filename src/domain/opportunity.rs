use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Creative format of the inventory slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryFormat {
    #[default]
    Banner,
    Video,
    Native,
}

impl InventoryFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryFormat::Banner => "banner",
            InventoryFormat::Video => "video",
            InventoryFormat::Native => "native",
        }
    }
}

impl std::fmt::Display for InventoryFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Privacy regimes signalled by the seller, independent of each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrivacyFlags {
    pub gdpr: bool,
    pub coppa: bool,
    pub ccpa: bool,
}

/// Normalized view of one impression opportunity.
///
/// Built either by the OpenRTB adapter (live traffic) or the synthetic
/// generator (simulation), then handed read-only to the engine and the
/// strategy for exactly one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub auction_id: String,
    pub timestamp: DateTime<Utc>,

    pub geo: String,
    pub device_type: String,
    pub os: String,
    pub app_bundle: String,
    pub site_domain: String,
    /// Publisher slot / placement id
    pub inventory_id: String,
    pub format: InventoryFormat,
    pub width: u32,
    pub height: u32,

    /// Seller floor in CPM; zero means no floor
    pub floor_cpm: Decimal,

    pub user_id: Option<String>,
    pub privacy: PrivacyFlags,
}

impl Opportunity {
    /// Create an opportunity with empty context and no floor
    pub fn new(auction_id: impl Into<String>) -> Self {
        Self {
            auction_id: auction_id.into(),
            timestamp: Utc::now(),
            geo: String::new(),
            device_type: String::new(),
            os: String::new(),
            app_bundle: String::new(),
            site_domain: String::new(),
            inventory_id: String::new(),
            format: InventoryFormat::Banner,
            width: 0,
            height: 0,
            floor_cpm: Decimal::ZERO,
            user_id: None,
            privacy: PrivacyFlags::default(),
        }
    }

    pub fn with_floor(mut self, floor_cpm: Decimal) -> Self {
        self.floor_cpm = floor_cpm;
        self
    }

    pub fn with_geo(mut self, geo: impl Into<String>) -> Self {
        self.geo = geo.into();
        self
    }

    pub fn with_device(mut self, device_type: impl Into<String>, os: impl Into<String>) -> Self {
        self.device_type = device_type.into();
        self.os = os.into();
        self
    }

    pub fn with_site(mut self, site_domain: impl Into<String>) -> Self {
        self.site_domain = site_domain.into();
        self
    }

    pub fn with_app(mut self, app_bundle: impl Into<String>) -> Self {
        self.app_bundle = app_bundle.into();
        self
    }

    pub fn with_slot(
        mut self,
        inventory_id: impl Into<String>,
        format: InventoryFormat,
        width: u32,
        height: u32,
    ) -> Self {
        self.inventory_id = inventory_id.into();
        self.format = format;
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_privacy(mut self, privacy: PrivacyFlags) -> Self {
        self.privacy = privacy;
        self
    }

    pub fn has_user_id(&self) -> bool {
        self.user_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// Site domain, falling back to the app bundle for in-app inventory
    pub fn inventory_source(&self) -> &str {
        if self.site_domain.is_empty() {
            &self.app_bundle
        } else {
            &self.site_domain
        }
    }
}
