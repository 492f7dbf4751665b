//! Provider clients.
//!
//! `http::ProviderClient` does the transport work (timeouts, retry, circuit
//! breaking, `$ref` paging); the provider modules only know endpoint shapes.

pub mod espn_core;
pub mod espn_site;
pub mod http;
pub mod sportsdata;

pub use espn_core::EspnCoreClient;
pub use espn_site::EspnSiteClient;
pub use http::{HttpConfig, ProviderClient, RawPage};
pub use sportsdata::SportsDataClient;
