//! Domain data structures for lookups, cached schedules, and collection results.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Address lookup as entered by a user.
pub struct LookupQuery {
    /// Free-form postcode, e.g. `"BT1 1AA"`.
    pub postcode: String,
    /// Optional house number used to pick one address out of a postcode.
    pub house_number: Option<String>,
}

impl LookupQuery {
    /// Construct a new lookup query.
    ///
    /// A blank house number is treated as absent.
    #[must_use]
    pub fn new<P: Into<String>, H: Into<String>>(postcode: P, house_number: Option<H>) -> Self {
        Self {
            postcode: postcode.into(),
            house_number: house_number
                .map(Into::into)
                .filter(|number: &String| !number.trim().is_empty()),
        }
    }

    /// Check if the postcode is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.postcode.trim().is_empty()
    }

    /// Postcode in the canonical form used as the cache key.
    #[must_use]
    pub fn normalized_postcode(&self) -> String {
        normalize_postcode(&self.postcode)
    }

    /// Trimmed house number, if any.
    #[must_use]
    pub fn house_number(&self) -> Option<&str> {
        self.house_number
            .as_deref()
            .map(str::trim)
            .filter(|number| !number.is_empty())
    }
}

/// Uppercase a postcode and strip every whitespace character.
#[must_use]
pub fn normalize_postcode(raw: &str) -> String {
    raw.chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Lowercase a street name and collapse its whitespace runs.
#[must_use]
pub fn normalize_street(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Previously resolved schedule for one address, as held by the cache.
pub struct ScheduleEntry {
    /// Store-assigned row id; zero for records not yet stored.
    #[serde(default)]
    pub id: i64,
    /// Collection route code.
    pub route: String,
    /// Free-text bin label.
    pub bin_type: String,
    /// Weekday the bin is collected, e.g. `"Tuesday"`.
    pub day_of_week: String,
    /// Week cycle marker for fortnightly collections.
    #[serde(default)]
    pub week_cycle: String,
    /// House number.
    pub house_number: String,
    /// House number suffix such as “A”.
    #[serde(default)]
    pub house_suffix: String,
    /// Street name as published.
    pub street: String,
    /// Lowercased street name with collapsed whitespace.
    #[serde(default)]
    pub street_normalized: String,
    /// City.
    pub city: String,
    /// County.
    pub county: String,
    /// Postcode as published.
    pub postcode: String,
    /// Canonical postcode, see [`normalize_postcode`].
    #[serde(default)]
    pub postcode_normalized: String,
    /// Single-line address.
    pub full_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Bin color a collection is identified by.
pub enum BinColor {
    /// General waste.
    Black,
    /// Dry recycling.
    Blue,
    /// Garden waste and compost.
    Brown,
    /// Food waste.
    Green,
    /// Glass.
    Purple,
    /// Label did not match any known bin.
    Unknown,
}

impl fmt::Display for BinColor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinColor::Black => "Black",
            BinColor::Blue => "Blue",
            BinColor::Brown => "Brown",
            BinColor::Green => "Green",
            BinColor::Purple => "Purple",
            BinColor::Unknown => "Unknown",
        };
        write!(formatter, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A single upcoming collection.
pub struct BinCollection {
    /// Free-text bin label as shown by the source.
    pub bin_type: String,
    /// Color derived from the label.
    pub color: BinColor,
    /// Human-readable date of the next collection.
    pub next_collection: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Outcome of a lookup.
pub struct BinLookupResult {
    /// Address the schedule belongs to.
    pub address: String,
    /// Collections in the order the source listed them.
    pub collections: Vec<BinCollection>,
    /// Color of the first collection, or [`BinColor::Unknown`] when there is none.
    pub next_collection_color: BinColor,
}

impl BinLookupResult {
    /// Build a result, deriving the next collection color from the first entry.
    #[must_use]
    pub fn new(address: String, collections: Vec<BinCollection>) -> Self {
        let next_collection_color = collections
            .first()
            .map_or(BinColor::Unknown, |collection| collection.color);
        Self {
            address,
            collections,
            next_collection_color,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Where a lookup result came from.
pub enum LookupSource {
    /// Served from the schedule cache.
    Cache,
    /// Scraped from the council form.
    Live,
    /// Synthetic placeholder data.
    Placeholder,
}

impl fmt::Display for LookupSource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LookupSource::Cache => "cache",
            LookupSource::Live => "live",
            LookupSource::Placeholder => "placeholder",
        };
        write!(formatter, "{label}")
    }
}
