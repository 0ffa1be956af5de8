use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::models::PlaceCandidate;

// Attraction categories the walking tour cares about, matching the
// places-nearby type filter.
const PLACE_TYPES: &str = "tourist_attraction|museum|art_gallery|park|shopping_mall|hindu_temple|church|mosque|place_of_worship|amusement_park|aquarium|zoo|restaurant|cafe";

const DEFAULT_RADIUS_METERS: u32 = 500;

#[derive(Clone, Copy, Debug)]
pub enum NearbyRank {
    Distance,
    Radius,
}

#[derive(Clone)]
pub struct GoogleMapsClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GoogleMapsClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Resolves coordinates to a formatted address. `None` when the geocoder
    /// has no result; the caller falls back to the raw "lat,lng" string.
    pub async fn reverse_geocode(&self, lat: f64, lng: f64) -> Result<Option<String>> {
        #[derive(Deserialize)]
        struct GeocodeResp {
            results: Vec<GeocodeResult>,
        }

        #[derive(Deserialize)]
        struct GeocodeResult {
            formatted_address: String,
        }

        let url = format!("{}/geocode/json", self.base_url);
        let response = self
            .client
            .get(url)
            .query(&[
                ("latlng", format!("{lat},{lng}")),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await
            .context("failed to call reverse geocode endpoint")?
            .error_for_status()
            .context("reverse geocode returned non-success status")?
            .json::<GeocodeResp>()
            .await
            .context("failed to decode reverse geocode response")?;

        Ok(response
            .results
            .into_iter()
            .next()
            .map(|r| r.formatted_address))
    }

    /// Nearby points of interest, distance-ordered by the service when
    /// ranking by distance.
    pub async fn places_nearby(
        &self,
        lat: f64,
        lng: f64,
        rank: NearbyRank,
    ) -> Result<Vec<PlaceCandidate>> {
        #[derive(Deserialize)]
        struct NearbyResp {
            #[serde(default)]
            results: Vec<NearbyResult>,
        }

        #[derive(Deserialize)]
        struct NearbyResult {
            name: String,
            geometry: Geometry,
            #[serde(default)]
            photos: Vec<Photo>,
        }

        #[derive(Deserialize)]
        struct Geometry {
            location: LatLng,
        }

        #[derive(Deserialize)]
        struct LatLng {
            lat: f64,
            lng: f64,
        }

        #[derive(Deserialize)]
        struct Photo {
            photo_reference: String,
        }

        let mut query = vec![
            ("location".to_string(), format!("{lat},{lng}")),
            ("type".to_string(), PLACE_TYPES.to_string()),
            ("language".to_string(), "en".to_string()),
            ("key".to_string(), self.api_key.clone()),
        ];
        match rank {
            NearbyRank::Distance => query.push(("rankby".to_string(), "distance".to_string())),
            NearbyRank::Radius => {
                query.push(("radius".to_string(), DEFAULT_RADIUS_METERS.to_string()))
            }
        }

        let url = format!("{}/place/nearbysearch/json", self.base_url);
        let response = self
            .client
            .get(url)
            .query(&query)
            .send()
            .await
            .context("failed to call places nearby endpoint")?
            .error_for_status()
            .context("places nearby returned non-success status")?
            .json::<NearbyResp>()
            .await
            .context("failed to decode places nearby response")?;

        Ok(response
            .results
            .into_iter()
            .map(|place| PlaceCandidate {
                name: place.name,
                lat: place.geometry.location.lat,
                lng: place.geometry.location.lng,
                photo_reference: place.photos.into_iter().next().map(|p| p.photo_reference),
            })
            .collect())
    }

    pub async fn place_photo(&self, photo_reference: &str, max_width: u32) -> Result<Vec<u8>> {
        let url = format!("{}/place/photo", self.base_url);
        let width = max_width.to_string();
        let response = self
            .client
            .get(url)
            .query(&[
                ("photo_reference", photo_reference),
                ("maxwidth", width.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("failed to call place photo endpoint")?
            .error_for_status()
            .context("place photo returned non-success status")?;

        let bytes = response
            .bytes()
            .await
            .context("failed to read place photo bytes")?;

        if bytes.is_empty() {
            anyhow::bail!("place photo returned no image data");
        }

        Ok(bytes.to_vec())
    }
}
