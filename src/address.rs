//! Positional address parsing.
//!
//! Input addresses look like `MAIN (1234) ...`: the first token is the street
//! name and the second the street number, sometimes wrapped in parentheses.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Malformed address '{0}': expected at least a street name and a street number")]
    Malformed(String),
}

/// Street name and number extracted from a raw address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    pub street_name: String,
    pub street_number: String,
}

/// Split a raw address into street name and street number.
///
/// Purely positional: no locale handling, no validation of the number beyond
/// stripping parentheses.
pub fn parse_address(raw: &str) -> Result<ParsedAddress, AddressError> {
    let mut tokens = raw.split_whitespace();

    let (name, number) = match (tokens.next(), tokens.next()) {
        (Some(name), Some(number)) => (name, number),
        _ => return Err(AddressError::Malformed(raw.to_string())),
    };

    let street_number: String = number.chars().filter(|c| *c != '(' && *c != ')').collect();

    Ok(ParsedAddress {
        street_name: name.to_string(),
        street_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_address() {
        let parsed = parse_address("MAIN 1234 HOUSTON TX").unwrap();
        assert_eq!(parsed.street_name, "MAIN");
        assert_eq!(parsed.street_number, "1234");
    }

    #[test]
    fn test_parse_strips_parentheses() {
        let parsed = parse_address("Westheimer (5600)").unwrap();
        assert_eq!(parsed.street_name, "Westheimer");
        assert_eq!(parsed.street_number, "5600");

        let half_open = parse_address("Elm (42").unwrap();
        assert_eq!(half_open.street_number, "42");
    }

    #[test]
    fn test_parse_collapses_whitespace() {
        let parsed = parse_address("  Oak\t\t(17)   Suite 3 ").unwrap();
        assert_eq!(parsed.street_name, "Oak");
        assert_eq!(parsed.street_number, "17");
    }

    #[test]
    fn test_parse_rejects_short_addresses() {
        assert_eq!(
            parse_address("MAIN"),
            Err(AddressError::Malformed("MAIN".to_string()))
        );
        assert!(parse_address("").is_err());
        assert!(parse_address("   ").is_err());
    }

    #[test]
    fn test_street_number_never_contains_parentheses() {
        let samples = [
            "A (1)",
            "B ((2))",
            "C )3(",
            "D (4)(5) extra",
            "E () trailing",
            "F 6",
        ];
        for raw in samples {
            let parsed = parse_address(raw).unwrap();
            assert!(
                !parsed.street_number.contains('(') && !parsed.street_number.contains(')'),
                "parentheses left in street number for {:?}: {:?}",
                raw,
                parsed.street_number
            );
        }
    }
}
