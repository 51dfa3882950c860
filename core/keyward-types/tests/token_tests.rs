use keyward_types::LicenseToken;
use std::collections::HashSet;
use std::str::FromStr;

// ── Generation ───────────────────────────────────────────────────

#[test]
fn generated_tokens_are_unique() {
    let tokens: HashSet<LicenseToken> = (0..200).map(|_| LicenseToken::generate()).collect();
    assert_eq!(tokens.len(), 200);
}

#[test]
fn generated_token_shape() {
    let token = LicenseToken::generate();
    let parts: Vec<&str> = token.as_str().split('-').collect();
    assert_eq!(parts.len(), 5);
    assert_eq!(parts[0], "KW");
    for group in &parts[1..] {
        assert_eq!(group.len(), 5);
        assert!(group.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }
}

#[test]
fn generated_token_reparses() {
    let token = LicenseToken::generate();
    let parsed = LicenseToken::parse(&token.to_string()).unwrap();
    assert_eq!(token, parsed);
}

// ── Parsing ──────────────────────────────────────────────────────

#[test]
fn parse_trims_whitespace() {
    let token = LicenseToken::parse("  T1  ").unwrap();
    assert_eq!(token.as_str(), "T1");
}

#[test]
fn parse_accepts_legacy_serials() {
    assert!(LicenseToken::parse("ABCD-1234_efgh").is_ok());
}

#[test]
fn parse_rejects_empty() {
    assert!(LicenseToken::parse("").is_err());
    assert!(LicenseToken::parse("   ").is_err());
}

#[test]
fn parse_rejects_path_characters() {
    assert!(LicenseToken::parse("T1/../admin").is_err());
    assert!(LicenseToken::parse("T 1").is_err());
    assert!(LicenseToken::parse("T1?x=1").is_err());
}

#[test]
fn parse_rejects_overlong() {
    let long = "A".repeat(129);
    assert!(LicenseToken::parse(&long).is_err());
    assert!(LicenseToken::parse(&"A".repeat(128)).is_ok());
}

#[test]
fn from_str_matches_parse() {
    let a = LicenseToken::from_str("T2").unwrap();
    let b = LicenseToken::parse("T2").unwrap();
    assert_eq!(a, b);
}

// ── Serde ────────────────────────────────────────────────────────

#[test]
fn serializes_as_plain_string() {
    let token = LicenseToken::parse("T1").unwrap();
    let json = serde_json::to_string(&token).unwrap();
    assert_eq!(json, "\"T1\"");
}

#[test]
fn deserialize_rejects_invalid() {
    let result: Result<LicenseToken, _> = serde_json::from_str("\"bad token\"");
    assert!(result.is_err());
}
