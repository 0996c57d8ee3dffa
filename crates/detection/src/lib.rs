//! Threat-intelligence matching: the indicator store, value normalisation,
//! and on-demand file hashing used when an event carries no digest.

pub mod hashing;
pub mod ioc;
pub mod normalize;

pub use hashing::sha256_file;
pub use ioc::{
    load_indicator_file, Indicator, IndicatorKind, IndicatorSet, IntelError, IocStore, Severity,
};
pub use normalize::{normalize, normalize_hash, normalize_ip, normalize_url_host, parse_hash_blob};
