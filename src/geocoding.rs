//! Reverse geocoding of photo GPS positions into short place names.
//!
//! The extractor only ever talks to the [`ReverseGeocoder`] trait. Production
//! uses [`NominatimGeocoder`] (blocking HTTP with a global timeout), optionally
//! wrapped in a [`CachedGeocoder`] so several photos from the same spot only
//! cost one request.

use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use crate::config::GeocoderConfig;

/// Signed decimal degrees, negative for the southern / western hemisphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Label used when no place name can be resolved, e.g. `"40.4461, -79.9767"`.
    pub fn fallback_label(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Converts a degrees/minutes/seconds triple plus its hemisphere reference
/// (`N`, `S`, `E`, `W`) into signed decimal degrees.
pub fn dms_to_decimal(dms: [f64; 3], reference: &str) -> f64 {
    let decimal = dms[0] + dms[1] / 60.0 + dms[2] / 3600.0;

    match reference.trim().chars().next() {
        Some('S') | Some('s') | Some('W') | Some('w') => -decimal,
        _ => decimal,
    }
}

/// The subset of a reverse-geocoding answer the blog cares about.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(skip)]
    pub display_name: Option<String>,
}

impl Address {
    /// `"{city}, {country}"` when both are known, otherwise the full display name.
    pub fn place_name(&self) -> Option<String> {
        fn non_empty(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.trim().is_empty())
        }

        let city = non_empty(&self.city)
            .or_else(|| non_empty(&self.town))
            .or_else(|| non_empty(&self.village));

        match (city, non_empty(&self.country)) {
            (Some(city), Some(country)) => Some(format!("{}, {}", city, country)),
            _ => non_empty(&self.display_name).map(str::to_string),
        }
    }
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] ureq::Error),
    #[error("Invalid geocoder response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("No result: {0}")]
    NoResult(String),
}

pub trait ReverseGeocoder: Send + Sync {
    fn reverse(&self, coordinate: GeoCoordinate) -> Result<Address, GeocodeError>;
}

/// Resolves a coordinate to a place label. Every failure mode collapses into
/// the 4-decimal coordinate label.
pub fn resolve_place_name(geocoder: &dyn ReverseGeocoder, coordinate: GeoCoordinate) -> String {
    match geocoder.reverse(coordinate) {
        Ok(address) => match address.place_name() {
            Some(name) => name,
            None => {
                warn!(
                    "Geocoder returned an empty address for {}",
                    coordinate.fallback_label()
                );
                coordinate.fallback_label()
            }
        },
        Err(e) => {
            warn!(
                "Geocoding error for {}: {}",
                coordinate.fallback_label(),
                e
            );
            coordinate.fallback_label()
        }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    display_name: Option<String>,
    address: Option<Address>,
    error: Option<String>,
}

/// Nominatim `/reverse` client.
pub struct NominatimGeocoder {
    agent: ureq::Agent,
    base_url: String,
    user_agent: String,
    language: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Self {
        Self::with_timeout(
            &config.base_url,
            &config.user_agent,
            &config.language,
            config.timeout,
        )
    }

    pub fn with_timeout(base_url: &str, user_agent: &str, language: &str, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            language: language.to_string(),
        }
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    fn reverse(&self, coordinate: GeoCoordinate) -> Result<Address, GeocodeError> {
        let url = format!("{}/reverse", self.base_url);
        debug!("Reverse geocoding {}", coordinate.fallback_label());

        let body = self
            .agent
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .query("format", "jsonv2")
            .query("lat", coordinate.latitude.to_string())
            .query("lon", coordinate.longitude.to_string())
            .query("accept-language", &self.language)
            .call()?
            .body_mut()
            .read_to_string()?;

        parse_nominatim_response(&body)
    }
}

fn parse_nominatim_response(body: &str) -> Result<Address, GeocodeError> {
    let response: NominatimResponse = serde_json::from_str(body)?;

    if let Some(error) = response.error {
        return Err(GeocodeError::NoResult(error));
    }

    let mut address = response.address.unwrap_or_default();
    address.display_name = response.display_name;

    if address.place_name().is_none() {
        return Err(GeocodeError::NoResult("empty address".to_string()));
    }

    Ok(address)
}

/// Remembers successful lookups per ~11 m grid cell (4 decimal places).
pub struct CachedGeocoder<G> {
    inner: G,
    cache: Mutex<HashMap<(i64, i64), Address>>,
}

impl<G: ReverseGeocoder> CachedGeocoder<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn key(coordinate: GeoCoordinate) -> (i64, i64) {
        (
            (coordinate.latitude * 10_000.0).round() as i64,
            (coordinate.longitude * 10_000.0).round() as i64,
        )
    }
}

impl<G: ReverseGeocoder> ReverseGeocoder for CachedGeocoder<G> {
    fn reverse(&self, coordinate: GeoCoordinate) -> Result<Address, GeocodeError> {
        let key = Self::key(coordinate);

        if let Ok(cache) = self.cache.lock() {
            if let Some(address) = cache.get(&key) {
                debug!("Geocoder cache hit for {}", coordinate.fallback_label());
                return Ok(address.clone());
            }
        }

        let address = self.inner.reverse(coordinate)?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, address.clone());
        }

        Ok(address)
    }
}
