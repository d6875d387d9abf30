//! Map free-text bin labels to bin colors.

use crate::model::BinColor;

/// Ordered keyword table; the first rule with a matching keyword wins.
const RULES: &[(&[&str], BinColor)] = &[
    (&["black", "general"], BinColor::Black),
    (&["blue", "recycling"], BinColor::Blue),
    (&["brown", "compost"], BinColor::Brown),
    (&["green", "food"], BinColor::Green),
    (&["purple", "glass"], BinColor::Purple),
];

/// Classify a bin label by case-insensitive substring match.
#[must_use]
pub fn classify_bin(label: &str) -> BinColor {
    let normalized = label.to_lowercase();

    RULES
        .iter()
        .find(|(keywords, _color)| {
            keywords
                .iter()
                .any(|keyword| normalized.contains(keyword))
        })
        .map_or(BinColor::Unknown, |(_keywords, color)| *color)
}
