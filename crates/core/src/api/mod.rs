//! Seam between the reward engine and the token endpoints
//!
//! The engine only ever talks to the points backend through this trait, so
//! the slot driver can be exercised with an in-process fake.

use std::future::Future;

use crate::errors::Result;
use crate::models::{EarnResponse, TokenGrant};

/// Token issuing and redeeming endpoints, as seen by the engine
pub trait PointsApi: Send + Sync {
    /// Issue a fresh single-use reward token for the given ad slot
    fn request_token(
        &self,
        ad_slot_id: &str,
    ) -> impl Future<Output = Result<TokenGrant>> + Send;

    /// Redeem a held token for points
    ///
    /// The server consumes the token at most once; a second redemption of
    /// the same value fails like any other invalid token.
    fn redeem_token(&self, token: &str) -> impl Future<Output = Result<EarnResponse>> + Send;
}
