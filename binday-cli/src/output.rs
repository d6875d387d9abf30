//! Human readable rendering of lookup results.

use std::fmt;

use binday_core::{BinLookupResult, LookupSource};

/// A lookup result laid out as a small aligned table.
pub(crate) struct Report<'a> {
    pub(crate) result: &'a BinLookupResult,
    pub(crate) source: LookupSource,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.result;
        writeln!(formatter, "Address:   {}", result.address)?;
        writeln!(formatter, "Source:    {}", self.source)?;
        writeln!(formatter, "Next bin:  {}", result.next_collection_color)?;
        if result.collections.is_empty() {
            return writeln!(formatter, "\nNo collections listed.");
        }

        let type_width = result
            .collections
            .iter()
            .map(|collection| collection.bin_type.chars().count())
            .max()
            .unwrap_or_default()
            .max("Bin".len());

        writeln!(formatter)?;
        writeln!(
            formatter,
            "{:<type_width$}  {:<7}  Next collection",
            "Bin", "Colour"
        )?;
        for collection in &result.collections {
            writeln!(
                formatter,
                "{:<type_width$}  {:<7}  {}",
                collection.bin_type,
                collection.color.to_string(),
                collection.next_collection
            )?;
        }
        Ok(())
    }
}
