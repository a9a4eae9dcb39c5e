//! API data models shared across the workspace

pub mod earn;
pub mod outcome;
pub mod problem;
pub mod token;

pub use earn::{EarnRequest, EarnResponse};
pub use outcome::RewardOutcome;
pub use problem::ProblemDetails;
pub use token::{TokenGrant, TokenRequest};
