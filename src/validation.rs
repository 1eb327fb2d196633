/// Input validation for data arriving from exchanges
///
/// Everything here rejects with `DspError::MalformedInput` so callers can
/// count the request as an error and answer no-bid without touching the
/// engine. Campaign checks reject with `DspError::InvalidConfig`.
use crate::domain::CampaignState;
use crate::error::{DspError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Highest CPM accepted from an exchange, as a floor or a clearing price
pub const MAX_PRICE_CPM: Decimal = dec!(10000);

/// Highest target CPA a campaign may carry
pub const MAX_TARGET_CPA: Decimal = dec!(100000);

/// Highest budget or spend amount a campaign may carry
pub const MAX_CAMPAIGN_AMOUNT: Decimal = dec!(1000000000);

const MAX_ID_LEN: usize = 256;

/// Validate an auction (bid request) id
pub fn validate_auction_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(DspError::MalformedInput(
            "bid request id cannot be empty".to_string(),
        ));
    }

    if id.len() > MAX_ID_LEN {
        return Err(DspError::MalformedInput(format!(
            "bid request id longer than {} bytes",
            MAX_ID_LEN
        )));
    }

    Ok(())
}

/// Validate a seller floor in CPM. Zero means no floor.
pub fn validate_floor(floor_cpm: Decimal) -> Result<()> {
    if floor_cpm < Decimal::ZERO {
        return Err(DspError::MalformedInput(format!(
            "bidfloor cannot be negative: {}",
            floor_cpm
        )));
    }

    if floor_cpm > MAX_PRICE_CPM {
        return Err(DspError::MalformedInput(format!(
            "bidfloor {} exceeds maximum {}",
            floor_cpm, MAX_PRICE_CPM
        )));
    }

    Ok(())
}

/// Validate the clearing price of a win notice in CPM
pub fn validate_win_price(price_cpm: Decimal) -> Result<()> {
    if price_cpm <= Decimal::ZERO {
        return Err(DspError::MalformedInput(format!(
            "win price must be positive: {}",
            price_cpm
        )));
    }

    if price_cpm > MAX_PRICE_CPM {
        return Err(DspError::MalformedInput(format!(
            "win price {} exceeds maximum {}",
            price_cpm, MAX_PRICE_CPM
        )));
    }

    Ok(())
}

/// Validate a campaign before it enters a ledger
pub fn validate_campaign(campaign: &CampaignState) -> Result<()> {
    if campaign.id.trim().is_empty() {
        return Err(DspError::InvalidConfig(
            "campaign id cannot be empty".to_string(),
        ));
    }

    let amounts = [
        ("daily_budget", campaign.daily_budget),
        ("spent_today", campaign.spent_today),
        ("lifetime_budget", campaign.lifetime_budget),
        ("lifetime_spent", campaign.lifetime_spent),
        ("target_cpa", campaign.target_cpa),
    ];
    for (field, value) in amounts {
        if value < Decimal::ZERO {
            return Err(DspError::InvalidConfig(format!(
                "campaign {}: {} cannot be negative",
                campaign.id, field
            )));
        }
        if value > MAX_CAMPAIGN_AMOUNT {
            return Err(DspError::InvalidConfig(format!(
                "campaign {}: {} {} exceeds maximum {}",
                campaign.id, field, value, MAX_CAMPAIGN_AMOUNT
            )));
        }
    }

    if campaign.target_cpa > MAX_TARGET_CPA {
        return Err(DspError::InvalidConfig(format!(
            "campaign {}: target_cpa {} exceeds maximum {}",
            campaign.id, campaign.target_cpa, MAX_TARGET_CPA
        )));
    }

    if campaign.spent_today > campaign.daily_budget
        || campaign.lifetime_spent > campaign.lifetime_budget
    {
        return Err(DspError::InvalidConfig(format!(
            "campaign {}: spend exceeds budget",
            campaign.id
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_auction_id() {
        assert!(validate_auction_id("auction-1").is_ok());

        assert!(validate_auction_id("").is_err());
        assert!(validate_auction_id("   ").is_err());
        assert!(validate_auction_id(&"x".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_floor() {
        assert!(validate_floor(dec!(0)).is_ok());
        assert!(validate_floor(dec!(1.25)).is_ok());

        let err = validate_floor(dec!(-0.01)).unwrap_err();
        assert_eq!(err.kind(), "malformed_input");
        assert!(validate_floor(dec!(10000.01)).is_err());
    }

    #[test]
    fn test_validate_win_price() {
        assert!(validate_win_price(dec!(1.7)).is_ok());

        assert!(validate_win_price(dec!(0)).is_err());
        assert!(validate_win_price(dec!(-2)).is_err());
    }

    #[test]
    fn test_validate_campaign() {
        let ok = CampaignState::new("c1", dec!(100), dec!(3000)).with_target_cpa(dec!(20));
        assert!(validate_campaign(&ok).is_ok());

        let overspent = ok.clone().with_spent(dec!(101), dec!(101));
        assert!(matches!(
            validate_campaign(&overspent),
            Err(DspError::InvalidConfig(_))
        ));

        let negative = CampaignState::new("c1", dec!(-1), dec!(3000));
        assert!(validate_campaign(&negative).is_err());

        let unnamed = CampaignState::new(" ", dec!(1), dec!(1));
        assert!(validate_campaign(&unnamed).is_err());
    }

    #[test]
    fn test_validate_campaign_upper_bounds() {
        let ok = CampaignState::new("c1", dec!(100), dec!(3000));
        assert!(validate_campaign(&ok.clone().with_target_cpa(MAX_TARGET_CPA)).is_ok());

        let huge_cpa = ok.clone().with_target_cpa(Decimal::MAX);
        assert!(matches!(
            validate_campaign(&huge_cpa),
            Err(DspError::InvalidConfig(_))
        ));
        assert!(validate_campaign(&ok.clone().with_target_cpa(dec!(100000.01))).is_err());

        let huge_budget = CampaignState::new("c1", dec!(100), Decimal::MAX);
        assert!(validate_campaign(&huge_budget).is_err());
    }
}
