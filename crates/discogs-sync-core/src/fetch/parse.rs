use serde_json::Value;

use crate::{RandomRecord, RecordMetadata};

use super::wire::{BasicInformation, FormatRef};

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Parses a marketplace amount such as `"$1,234.56"` or `"€12.00"`.
///
/// Every character that is not an ASCII digit or `.` is dropped before
/// parsing, so `.` must never be used as a thousands separator upstream.
/// Anything unparseable reads as `0.0`.
pub fn parse_currency(value: &str) -> f64 {
    let numeric: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    numeric.parse::<f64>().unwrap_or(0.0)
}

/// Amount field that may arrive as a display string or as a bare number.
pub fn parse_amount(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::String(text)) => parse_currency(text),
        Some(Value::Number(number)) => number.as_f64().filter(|n| n.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// `"Vinyl (LP, Album)"`, `"Vinyl"` or `None` from the first listed format.
pub fn format_string(formats: &[FormatRef]) -> Option<String> {
    let first = formats.first()?;
    let name = first.name.as_deref().filter(|name| !name.is_empty())?;

    if first.descriptions.is_empty() {
        Some(name.to_owned())
    } else {
        Some(format!("{name} ({})", first.descriptions.join(", ")))
    }
}

/// `"Artist - Title"` plus display metadata for a sampled release.
pub fn record_from(info: &BasicInformation) -> RandomRecord {
    let artist = info
        .artists
        .first()
        .and_then(|artist| artist.name.as_deref())
        .unwrap_or(UNKNOWN_ARTIST);
    let title = info.title.as_deref().unwrap_or(UNKNOWN_TITLE);
    let label = info.labels.first();

    RandomRecord {
        title: Some(format!("{artist} - {title}")),
        metadata: Some(RecordMetadata {
            cat_no: label.and_then(|label| label.catno.clone()),
            cover_image: info.cover_image.clone(),
            format: format_string(&info.formats),
            label: label.and_then(|label| label.name.clone()),
            released: info.year.filter(|year| *year > 0),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::wire::{ArtistRef, LabelRef};

    #[test]
    fn currency_strings_drop_symbols_and_grouping() {
        assert_eq!(parse_currency("$1,234.56"), 1234.56);
        assert_eq!(parse_currency("€12.00"), 12.0);
        assert_eq!(parse_currency("0.00"), 0.0);
    }

    #[test]
    fn unparseable_currency_reads_as_zero() {
        assert_eq!(parse_currency(""), 0.0);
        assert_eq!(parse_currency("n/a"), 0.0);
        assert_eq!(parse_currency("1.2.3"), 0.0);
    }

    #[test]
    fn amounts_accept_numbers_and_reject_other_shapes() {
        assert_eq!(parse_amount(Some(&serde_json::json!(42.5))), 42.5);
        assert_eq!(parse_amount(Some(&serde_json::json!("$7.10"))), 7.1);
        assert_eq!(parse_amount(Some(&serde_json::json!(null))), 0.0);
        assert_eq!(parse_amount(Some(&serde_json::json!(["1"]))), 0.0);
        assert_eq!(parse_amount(None), 0.0);
    }

    #[test]
    fn format_string_variants() {
        let lp = FormatRef {
            name: Some(String::from("Vinyl")),
            descriptions: vec![String::from("LP"), String::from("Album")],
            ..FormatRef::default()
        };
        let bare = FormatRef {
            name: Some(String::from("CD")),
            ..FormatRef::default()
        };

        assert_eq!(format_string(&[lp]).as_deref(), Some("Vinyl (LP, Album)"));
        assert_eq!(format_string(&[bare]).as_deref(), Some("CD"));
        assert_eq!(format_string(&[FormatRef::default()]), None);
        assert_eq!(format_string(&[]), None);
    }

    #[test]
    fn record_uses_first_artist_and_label() {
        let info = BasicInformation {
            title: Some(String::from("Blue Train")),
            year: Some(1957),
            artists: vec![ArtistRef {
                name: Some(String::from("John Coltrane")),
                ..ArtistRef::default()
            }],
            labels: vec![LabelRef {
                name: Some(String::from("Blue Note")),
                catno: Some(String::from("BLP 1577")),
                ..LabelRef::default()
            }],
            ..BasicInformation::default()
        };

        let record = record_from(&info);
        assert_eq!(record.title.as_deref(), Some("John Coltrane - Blue Train"));
        let metadata = record.metadata.expect("metadata");
        assert_eq!(metadata.cat_no.as_deref(), Some("BLP 1577"));
        assert_eq!(metadata.label.as_deref(), Some("Blue Note"));
        assert_eq!(metadata.released, Some(1957));
        assert_eq!(metadata.format, None);
    }

    #[test]
    fn record_defaults_missing_fields() {
        let info = BasicInformation {
            year: Some(0),
            ..BasicInformation::default()
        };

        let record = record_from(&info);
        assert_eq!(record.title.as_deref(), Some("Unknown Artist - Unknown Title"));
        assert_eq!(record.metadata.and_then(|m| m.released), None);
    }
}
