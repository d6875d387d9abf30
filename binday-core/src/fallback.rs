//! Deterministic placeholder schedules.

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::model::{BinCollection, BinColor, BinLookupResult};

/// Date format used for every human-readable collection date.
pub const DATE_FORMAT: &str = "%A, %d %B %Y";

/// Placeholder schedule for a postcode: general waste next Monday, recycling
/// and garden waste the Thursday after.
///
/// Today never counts as "next Monday".
#[must_use]
pub fn mock_schedule(postcode: &str, _house_number: Option<&str>, today: NaiveDate) -> BinLookupResult {
    let next_monday = next_weekday(today, Weekday::Mon, false);
    let next_thursday = next_monday + Days::new(3);

    let monday = next_monday.format(DATE_FORMAT).to_string();
    let thursday = next_thursday.format(DATE_FORMAT).to_string();

    BinLookupResult::new(
        format!("Sample Address, {postcode}"),
        vec![
            BinCollection {
                bin_type: "General Waste (Black Bin)".to_owned(),
                color: BinColor::Black,
                next_collection: monday,
            },
            BinCollection {
                bin_type: "Recycling (Blue Bin)".to_owned(),
                color: BinColor::Blue,
                next_collection: thursday.clone(),
            },
            BinCollection {
                bin_type: "Garden Waste (Brown Bin)".to_owned(),
                color: BinColor::Brown,
                next_collection: thursday,
            },
        ],
    )
}

/// First date on or after `from` falling on `weekday`.
///
/// With `include_today` unset a match on `from` itself moves a week ahead.
#[must_use]
pub fn next_weekday(from: NaiveDate, weekday: Weekday, include_today: bool) -> NaiveDate {
    let current = from.weekday().num_days_from_monday();
    let target = weekday.num_days_from_monday();
    let mut ahead = (7 + target - current) % 7;
    if ahead == 0 && !include_today {
        ahead = 7;
    }
    from + Days::new(u64::from(ahead))
}
