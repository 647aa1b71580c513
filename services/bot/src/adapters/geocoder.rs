//! services/bot/src/adapters/geocoder.rs
//!
//! Yandex geocoder implementation of the `Geocoder` port.

use async_trait::async_trait;
use serde::Deserialize;
use shop_bot_core::geo::Coordinates;
use shop_bot_core::ports::{Geocoder, PortError, PortResult};
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://geocode-maps.yandex.ru/1.x";

#[derive(Clone)]
pub struct YandexGeocoder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl YandexGeocoder {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self::with_endpoint(client, api_key, DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(
        client: reqwest::Client,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Deserialize)]
struct GeocodeResponse {
    response: ResponseBody,
}

#[derive(Deserialize)]
struct ResponseBody {
    #[serde(rename = "GeoObjectCollection")]
    collection: GeoObjectCollection,
}

#[derive(Deserialize)]
struct GeoObjectCollection {
    #[serde(rename = "featureMember", default)]
    members: Vec<FeatureMember>,
}

#[derive(Deserialize)]
struct FeatureMember {
    #[serde(rename = "GeoObject")]
    geo_object: GeoObject,
}

#[derive(Deserialize)]
struct GeoObject {
    #[serde(rename = "Point")]
    point: Point,
}

#[derive(Deserialize)]
struct Point {
    pos: String,
}

/// `pos` is `"lon lat"`, in that order.
fn parse_pos(pos: &str) -> Option<Coordinates> {
    let mut parts = pos.split_whitespace();
    let lon: f64 = parts.next()?.parse().ok()?;
    let lat: f64 = parts.next()?.parse().ok()?;
    let coordinates = Coordinates::new(lat, lon);
    coordinates.is_valid().then_some(coordinates)
}

fn first_match(body: GeocodeResponse) -> Option<Coordinates> {
    body.response
        .collection
        .members
        .first()
        .and_then(|member| parse_pos(&member.geo_object.point.pos))
}

#[async_trait]
impl Geocoder for YandexGeocoder {
    async fn geocode(&self, address: &str) -> PortResult<Option<Coordinates>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("geocode", address),
                ("apikey", self.api_key.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("geocoder request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PortError::Unauthorized);
        }
        if !status.is_success() {
            return Err(PortError::Unexpected(format!("geocoder returned HTTP {}", status)));
        }

        let body: GeocodeResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("unreadable geocoder response: {}", e)))?;
        let found = first_match(body);
        debug!(address, ?found, "Geocoded address.");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_first_member_in_lon_lat_order() {
        let body: GeocodeResponse = serde_json::from_str(
            r#"{"response":{"GeoObjectCollection":{"featureMember":[
                {"GeoObject":{"Point":{"pos":"91.687 53.710"}}},
                {"GeoObject":{"Point":{"pos":"37.61 55.75"}}}
            ]}}}"#,
        )
        .unwrap();
        assert_eq!(first_match(body), Some(Coordinates::new(53.710, 91.687)));
    }

    #[test]
    fn empty_result_is_none() {
        let body: GeocodeResponse = serde_json::from_str(
            r#"{"response":{"GeoObjectCollection":{"featureMember":[]}}}"#,
        )
        .unwrap();
        assert_eq!(first_match(body), None);
        assert_eq!(parse_pos("garbage"), None);
    }
}
