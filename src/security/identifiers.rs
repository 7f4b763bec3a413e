//! Identifier validation.
//!
//! Values extracted from ticket text end up inside SQL statements and CLI
//! arguments. Each must match a strict shape before it is used; anything
//! else is rejected without contacting the cloud.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::CloudError;
use crate::extraction::cidr::is_valid_cidr;

lazy_static! {
    static ref SQL_IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]{0,126}$").unwrap();
    static ref SECURITY_GROUP_ID: Regex = Regex::new(r"^sg-[A-Za-z0-9]{1,32}$").unwrap();
    static ref REGION: Regex = Regex::new(r"^[a-z]{2}(?:-gov)?-[a-z]+-\d{1,2}$").unwrap();
    static ref CLUSTER_IDENTIFIER: Regex = Regex::new(r"^[a-z][a-z0-9]*(?:-[a-z0-9]+)*$").unwrap();
}

/// Words that cannot name a user without quoting.
const RESERVED_USER_NAMES: &[&str] = &[
    "all", "public", "user", "select", "table", "group", "grant", "from", "where", "null",
];

fn rejected(kind: &str, value: &str) -> CloudError {
    CloudError::Rejected(format!("invalid {}: {:?}", kind, value))
}

/// Validate and normalise a database user name. Unquoted identifiers fold to
/// lower case in the catalog, so the returned name is lower-cased.
pub fn sql_identifier(name: &str) -> Result<String, CloudError> {
    if !SQL_IDENTIFIER.is_match(name) {
        return Err(rejected("user name", name));
    }
    let folded = name.to_lowercase();
    if RESERVED_USER_NAMES.contains(&folded.as_str()) {
        return Err(rejected("user name", name));
    }
    Ok(folded)
}

pub fn validate_security_group_id(group_id: &str) -> Result<(), CloudError> {
    if SECURITY_GROUP_ID.is_match(group_id) {
        Ok(())
    } else {
        Err(rejected("security group id", group_id))
    }
}

pub fn validate_region(region: &str) -> Result<(), CloudError> {
    if REGION.is_match(region) {
        Ok(())
    } else {
        Err(rejected("region", region))
    }
}

pub fn validate_cluster_identifier(cluster: &str) -> Result<(), CloudError> {
    if cluster.len() <= 63 && CLUSTER_IDENTIFIER.is_match(cluster) {
        Ok(())
    } else {
        Err(rejected("cluster identifier", cluster))
    }
}

pub fn validate_cidr(cidr: &str) -> Result<(), CloudError> {
    if is_valid_cidr(cidr) {
        Ok(())
    } else {
        Err(rejected("CIDR", cidr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_identifier() {
        assert_eq!(sql_identifier("user7").unwrap(), "user7");
        assert_eq!(sql_identifier("Analyst_01").unwrap(), "analyst_01");
        assert!(sql_identifier("7user").is_err());
        assert!(sql_identifier("bob; DROP TABLE x").is_err());
        assert!(sql_identifier("bob'--").is_err());
        assert!(sql_identifier("").is_err());
        assert!(sql_identifier("PUBLIC").is_err());
        assert!(sql_identifier(&"a".repeat(128)).is_err());
    }

    #[test]
    fn test_security_group_id() {
        assert!(validate_security_group_id("sg-abc123").is_ok());
        assert!(validate_security_group_id("sg-0123456789abcdef0").is_ok());
        assert!(validate_security_group_id("sg-").is_err());
        assert!(validate_security_group_id("sg-abc --profile prod").is_err());
    }

    #[test]
    fn test_region() {
        assert!(validate_region("us-east-1").is_ok());
        assert!(validate_region("us-gov-west-1").is_ok());
        assert!(validate_region("US-EAST-1").is_err());
        assert!(validate_region("moon-1").is_err());
    }

    #[test]
    fn test_cluster_identifier() {
        assert!(validate_cluster_identifier("redshift-cluster-1").is_ok());
        assert!(validate_cluster_identifier("analytics").is_ok());
        assert!(validate_cluster_identifier("Cluster_1").is_err());
        assert!(validate_cluster_identifier("a--b").is_err());
    }

    #[test]
    fn test_rejection_is_cloud_error() {
        match validate_cidr("10.0.0.0/40") {
            Err(CloudError::Rejected(reason)) => assert!(reason.contains("10.0.0.0/40")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
