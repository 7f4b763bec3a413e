//! CIDR list parsing.
//!
//! Tickets list ranges comma-separated, space-separated, one per line, or any
//! mix of those. Rather than splitting on delimiters, every CIDR-shaped token
//! in the text is collected, which accepts all of them.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CIDR_TOKEN: Regex =
        Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}/\d{1,2})\b").unwrap();
}

/// Whether `value` is a well-formed IPv4 CIDR (`a.b.c.d/n`, `n <= 32`).
pub fn is_valid_cidr(value: &str) -> bool {
    let Some((addr, prefix)) = value.split_once('/') else {
        return false;
    };
    if addr.parse::<Ipv4Addr>().is_err() {
        return false;
    }
    matches!(prefix.parse::<u8>(), Ok(p) if p <= 32)
}

/// All valid CIDRs in `text`, exact duplicates collapsed, first-seen order.
pub fn parse_cidr_list(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut cidrs = Vec::new();

    for caps in CIDR_TOKEN.captures_iter(text) {
        let cidr = &caps[1];
        if !is_valid_cidr(cidr) {
            continue;
        }
        if seen.insert(cidr.to_string()) {
            cidrs.push(cidr.to_string());
        }
    }

    cidrs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_delimiters_and_duplicates() {
        assert_eq!(
            parse_cidr_list("10.0.0.0/8, 10.0.0.0/8\n11.0.0.0/8"),
            vec!["10.0.0.0/8", "11.0.0.0/8"]
        );
    }

    #[test]
    fn test_every_delimiter_style() {
        let text = "cidr range: 17.0.0.0/8,18.0.0.0/8 19.0.0.0/8\n\t20.0.0.0/8;21.0.0.0/8";
        assert_eq!(
            parse_cidr_list(text),
            vec!["17.0.0.0/8", "18.0.0.0/8", "19.0.0.0/8", "20.0.0.0/8", "21.0.0.0/8"]
        );
    }

    #[test]
    fn test_order_is_first_seen() {
        assert_eq!(
            parse_cidr_list("11.0.0.0/8 10.0.0.0/8 11.0.0.0/8"),
            vec!["11.0.0.0/8", "10.0.0.0/8"]
        );
    }

    #[test]
    fn test_invalid_ranges_are_dropped() {
        assert_eq!(
            parse_cidr_list("300.1.1.1/8, 10.0.0.0/33, 192.168.1.0/24"),
            vec!["192.168.1.0/24"]
        );
        assert!(parse_cidr_list("no ranges here, just 10.0.0.1").is_empty());
    }

    #[test]
    fn test_is_valid_cidr() {
        assert!(is_valid_cidr("0.0.0.0/0"));
        assert!(is_valid_cidr("10.1.2.3/32"));
        assert!(!is_valid_cidr("10.1.2.3"));
        assert!(!is_valid_cidr("10.1.2/24"));
        assert!(!is_valid_cidr("10.1.2.3/x"));
    }
}
