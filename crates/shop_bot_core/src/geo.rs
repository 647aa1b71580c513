//! crates/shop_bot_core/src/geo.rs
//!
//! Great-circle distances and the mapping from distance to a delivery tier.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::Store;
use crate::money::Money;

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Upper bound (inclusive) of each tier, in kilometres.
pub const FREE_RADIUS_KM: f64 = 0.5;
pub const NEAR_RADIUS_KM: f64 = 5.0;
pub const FAR_RADIUS_KM: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Parses `"lat,lon"` (the format stores are kept in); whitespace is tolerated.
    pub fn parse_pair(raw: &str) -> Option<Self> {
        let (lat, lon) = raw.split_once(',')?;
        let lat = lat.trim().parse::<f64>().ok()?;
        let lon = lon.trim().parse::<f64>().ok()?;
        let coords = Self::new(lat, lon);
        coords.is_valid().then_some(coords)
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    /// Haversine distance in kilometres.
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryTier {
    /// Close enough for free delivery or pickup.
    Free,
    /// Flat fee A.
    Near,
    /// Flat fee B.
    Far,
    Undeliverable,
}

impl DeliveryTier {
    pub fn from_distance(km: f64) -> Self {
        if km <= FREE_RADIUS_KM {
            DeliveryTier::Free
        } else if km <= NEAR_RADIUS_KM {
            DeliveryTier::Near
        } else if km <= FAR_RADIUS_KM {
            DeliveryTier::Far
        } else {
            DeliveryTier::Undeliverable
        }
    }
}

/// The flat fees charged per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryFees {
    pub near: Money,
    pub far: Money,
}

impl DeliveryFees {
    /// `None` means the tier cannot be delivered to at all.
    pub fn fee_for(&self, tier: DeliveryTier) -> Option<Money> {
        match tier {
            DeliveryTier::Free => Some(Money::ZERO),
            DeliveryTier::Near => Some(self.near),
            DeliveryTier::Far => Some(self.far),
            DeliveryTier::Undeliverable => None,
        }
    }
}

impl Default for DeliveryFees {
    fn default() -> Self {
        Self {
            near: Money::from_major(100),
            far: Money::from_major(300),
        }
    }
}

/// Picks the store closest to `from`, returning it with its distance.
pub fn nearest_store<'a>(from: &Coordinates, stores: &'a [Store]) -> Option<(&'a Store, f64)> {
    stores
        .iter()
        .map(|store| (store, from.distance_km(&store.location)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}
