use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::scrapers::extract::thumb_to_full;

/// One raw search result as the Trade Me search API returns it.
///
/// Only the fields the pipeline touches are typed; every other wire key is
/// kept verbatim in `extra` so it survives to the output untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingStub {
    #[serde(rename = "ListingId")]
    pub listing_id: i64,
    #[serde(rename = "ListingUrl", default)]
    pub listing_url: Option<String>,
    #[serde(rename = "StartDate", default)]
    pub start_date: Option<String>,
    #[serde(rename = "PhotoUrls", default)]
    pub photo_urls: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ListingStub {
    /// Detail page for this listing; falls back to the canonical listing URL
    /// scheme when the search record carries no usable `ListingUrl`.
    pub fn detail_url(&self) -> String {
        match &self.listing_url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => format!(
                "https://www.trademe.co.nz/a/property/listing/{}",
                self.listing_id
            ),
        }
    }
}

/// Fields pulled from a listing's detail page.
///
/// Every field is present on every output record; extraction failures leave
/// the affected fields as empty strings rather than dropping them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailFields {
    pub address: String,
    pub price_line: String,
    pub beds: String,
    pub baths: String,
    pub parks: String,
    pub homes_estimate: String,
    pub homes_updated: String,
    pub rent_estimate: String,
    pub rent_updated: String,
    pub rent_yield: String,
    pub capital_value: String,
    pub description: String,
}

/// Final output record: the stub's wire fields plus detail-page data.
///
/// Built as a pure transform of stub + fields. `Agency` and `PhotoUrls` are
/// dropped here, and `image_urls` carries the full-resolution rewrite of the
/// thumbnails, same length and order.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedListing {
    #[serde(rename = "ListingId")]
    pub listing_id: i64,
    #[serde(rename = "ListingUrl", skip_serializing_if = "Option::is_none")]
    pub listing_url: Option<String>,
    #[serde(rename = "StartDate", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(flatten)]
    pub details: DetailFields,
    pub image_urls: Vec<String>,
}

impl EnrichedListing {
    pub fn new(stub: ListingStub, details: DetailFields) -> Self {
        let ListingStub {
            listing_id,
            listing_url,
            start_date,
            photo_urls,
            mut extra,
        } = stub;
        extra.remove("Agency");
        let image_urls = photo_urls.iter().map(|u| thumb_to_full(u)).collect();
        Self {
            listing_id,
            listing_url,
            start_date,
            extra,
            details,
            image_urls,
        }
    }
}
