pub mod bidder_server;
pub mod openrtb;

pub use bidder_server::{create_router, serve, AppState, StatsResponse, WinNotice};
pub use openrtb::{build_bid_response, to_opportunity, BidRequest, BidResponse};
