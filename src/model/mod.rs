pub mod basis;
pub mod candidate;
pub mod depth;
pub mod funding;
pub mod profile;
pub mod quote;

pub use candidate::{Candidate, Instrument, Side, StrategyType, VenueTag};
pub use profile::ExecutionProfile;
pub use quote::NormalizedQuote;

/// Current UTC time as an RFC 3339 string, the form every artifact carries.
pub fn utc_now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Round at emission boundaries only; intermediates stay full-precision.
pub fn round2(value: f64) -> f64 {
    (value * 1e2).round() / 1e2
}

pub fn round4(value: f64) -> f64 {
    (value * 1e4).round() / 1e4
}

pub fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

pub fn round8(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}

pub fn round10(value: f64) -> f64 {
    (value * 1e10).round() / 1e10
}
