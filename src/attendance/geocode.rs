use anyhow::Result;
use async_trait::async_trait;

/// Optional reverse-geocoding enrichment of a clock event's coordinates.
/// Never load-bearing: a failure or timeout simply leaves the address as
/// whatever the client supplied.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<String>>;
}

/// Used when no geocoding provider is configured.
pub struct NoopGeocoder;

#[async_trait]
impl Geocoder for NoopGeocoder {
    async fn reverse(&self, _latitude: f64, _longitude: f64) -> Result<Option<String>> {
        Ok(None)
    }
}
