//! Results grid parsing and conversion into collections.

use scraper::{ElementRef, Html, Selector};

use crate::classify::classify_bin;
use crate::model::BinCollection;
use crate::ports::ScrapeError;

/// Text of every row of the first table matching `grid_selector`.
///
/// Header cells (`th`) are included so the header row counts as a row. An
/// absent grid yields no rows.
///
/// # Errors
///
/// Returns [`ScrapeError::Unexpected`] when `grid_selector` is not valid CSS.
pub fn grid_rows(html: &str, grid_selector: &str) -> Result<Vec<Vec<String>>, ScrapeError> {
    let grid = parse_selector(grid_selector)?;
    let row = parse_selector("tr")?;
    let cell = parse_selector("td, th")?;

    let document = Html::parse_document(html);
    let Some(table) = document.select(&grid).next() else {
        return Ok(Vec::new());
    };

    Ok(table
        .select(&row)
        .map(|tr| tr.select(&cell).map(cell_text).collect())
        .collect())
}

/// Turn grid rows into collections, skipping the header row.
///
/// Rows with fewer than two cells are ignored. Row order is kept. Cell text
/// arrives from [`grid_rows`] trimmed with inner whitespace runs collapsed to
/// one space, so `"General\n   Waste"` becomes `"General Waste"`.
#[must_use]
pub fn collections_from_rows(rows: &[Vec<String>]) -> Vec<BinCollection> {
    rows.iter()
        .skip(1)
        .filter_map(|cells| match cells.as_slice() {
            [bin_type, next_collection, ..] => Some(BinCollection {
                bin_type: bin_type.clone(),
                color: classify_bin(bin_type),
                next_collection: next_collection.clone(),
            }),
            _ => None,
        })
        .collect()
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_selector(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector)
        .map_err(|err| ScrapeError::Unexpected(format!("invalid CSS selector '{selector}': {err}")))
}
