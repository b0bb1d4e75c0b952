//! Positional parser for the CRM's account information blob.
//!
//! The CRM stores the pharmacy's postal and contact data as one text field
//! whose lines are joined with a literal `<br>`. The layout is fixed:
//!
//! ```text
//! 0  pharmacy name
//! 1  SAP id
//! 2  street
//! 3  "<postal code> <city>"
//! 4  "<state> <region name>"
//! 5  free text
//! 6  "<label> <email>"
//! 7  "<label> <phone>"
//! ```
//!
//! Blobs with fewer segments are kept verbatim and produce no address.

use serde::{Deserialize, Serialize};

/// Token separating the segments of the blob.
pub const SEGMENT_DELIMITER: &str = "<br>";

/// Number of segments a blob needs before it is parsed.
pub const MIN_SEGMENTS: usize = 8;

/// Address and contact fields extracted from a well-formed blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub pharmacy: Option<String>,
    pub sap_id: Option<String>,
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub extra: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Outcome of [`parse_account_information`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressParse {
    Parsed(Address),
    /// Too few segments; the original text is returned untouched.
    Unparsed(String),
}

impl AddressParse {
    pub fn is_parsed(&self) -> bool {
        matches!(self, AddressParse::Parsed(_))
    }
}

/// Split a blob into its address fields.
///
/// Never fails: a blob with fewer than [`MIN_SEGMENTS`] segments is the
/// degraded case and comes back as [`AddressParse::Unparsed`].
pub fn parse_account_information(blob: &str) -> AddressParse {
    let parts: Vec<&str> = blob.split(SEGMENT_DELIMITER).collect();
    if parts.len() < MIN_SEGMENTS {
        return AddressParse::Unparsed(blob.to_string());
    }

    let (postal_code, city) = split_first_space(parts[3]);
    let (state, country) = split_first_space(parts[4]);
    let (_, email) = split_first_space(parts[6]);
    let (_, phone) = split_first_space(parts[7]);

    AddressParse::Parsed(Address {
        pharmacy: non_empty(parts[0]),
        sap_id: non_empty(parts[1]),
        street: non_empty(parts[2]),
        postal_code,
        city,
        state,
        country,
        extra: non_empty(parts[5]),
        email,
        phone,
    })
}

/// Split at the first space; the tail is `None` when there is no space.
fn split_first_space(segment: &str) -> (Option<String>, Option<String>) {
    match segment.split_once(' ') {
        Some((head, tail)) => (non_empty(head), non_empty(tail)),
        None => (non_empty(segment), None),
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "Linden-Apotheke<br>0004711<br>Hauptstr. 5<br>50667 Köln<br>NW Nordrhein-Westfalen<br>Inhaber: Dr. Weber<br>E-Mail: info@linden.example<br>Telefon: 0221 123456";

    #[test]
    fn parses_all_positional_fields() {
        let AddressParse::Parsed(addr) = parse_account_information(FULL) else {
            panic!("expected parsed address");
        };
        assert_eq!(addr.pharmacy.as_deref(), Some("Linden-Apotheke"));
        assert_eq!(addr.sap_id.as_deref(), Some("0004711"));
        assert_eq!(addr.street.as_deref(), Some("Hauptstr. 5"));
        assert_eq!(addr.postal_code.as_deref(), Some("50667"));
        assert_eq!(addr.city.as_deref(), Some("Köln"));
        assert_eq!(addr.state.as_deref(), Some("NW"));
        assert_eq!(addr.country.as_deref(), Some("Nordrhein-Westfalen"));
        assert_eq!(addr.extra.as_deref(), Some("Inhaber: Dr. Weber"));
        assert_eq!(addr.email.as_deref(), Some("info@linden.example"));
        assert_eq!(addr.phone.as_deref(), Some("0221 123456"));
    }

    #[test]
    fn city_keeps_everything_after_first_space() {
        let blob = "A<br>1<br>S<br>10115 Berlin Mitte<br>BE Berlin<br><br>E x@y<br>T 1";
        let AddressParse::Parsed(addr) = parse_account_information(blob) else {
            panic!("expected parsed address");
        };
        assert_eq!(addr.city.as_deref(), Some("Berlin Mitte"));
        assert_eq!(addr.extra, None);
    }

    #[test]
    fn four_segments_are_left_unparsed() {
        let blob = "Apotheke<br>1<br>Weg 1<br>12345 Ort";
        assert_eq!(
            parse_account_information(blob),
            AddressParse::Unparsed(blob.to_string())
        );
    }

    #[test]
    fn exactly_eight_segments_parse() {
        let blob = ["a", "b", "c", "d e", "f g", "h", "i j", "k l"].join(SEGMENT_DELIMITER);
        assert!(parse_account_information(&blob).is_parsed());
    }

    #[test]
    fn segment_without_space_has_no_tail() {
        let blob = "a<br>b<br>c<br>12345<br>NW<br>x<br>mail<br>phone";
        let AddressParse::Parsed(addr) = parse_account_information(blob) else {
            panic!("expected parsed address");
        };
        assert_eq!(addr.postal_code.as_deref(), Some("12345"));
        assert_eq!(addr.city, None);
        assert_eq!(addr.email, None);
    }
}
