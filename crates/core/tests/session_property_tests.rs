//! Property-based integration tests for session handling and the domain gate.
//!
//! These tests verify that universal properties hold across arbitrary store
//! contents and host names, using the `proptest` crate.

use cloudtrial_core::constants::SESSION_RECORD_KEY;
use cloudtrial_core::session::{export_bundle, import_bundle, MemorySessionStore};
use cloudtrial_core::{DomainGate, SessionCredentials};
use proptest::prelude::*;

// =============================================================================
// Generators
// =============================================================================

/// Generates a token-like string: printable ASCII without quotes or escapes.
fn arb_token() -> impl Strategy<Value = String> {
    "[A-Za-z0-9._-]{1,40}"
}

/// Generates host names that are never one of the allowed hosts.
fn arb_foreign_host() -> impl Strategy<Value = String> {
    "[a-z]{1,12}\\.(com|net|org|example)"
        .prop_filter("allowed host", |h| h != "ugphone.com")
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// Whatever sits under the session record key, reading never panics and
    /// yields either complete credentials or absent fields.
    #[test]
    fn prop_read_never_fails(raw in ".{0,80}") {
        let store = MemorySessionStore::with_entries([(SESSION_RECORD_KEY, raw)]);
        let credentials = SessionCredentials::read(&store);
        if let Some(token) = &credentials.access_token {
            prop_assert!(!token.is_empty());
        }
    }

    /// A well-formed record always reads back to the same values.
    #[test]
    fn prop_well_formed_record_reads_back(token in arb_token(), login in arb_token()) {
        let record = serde_json::json!({"access_token": token, "login_id": login}).to_string();
        let store = MemorySessionStore::with_entries([(SESSION_RECORD_KEY, record)]);

        prop_assert_eq!(
            SessionCredentials::read(&store),
            SessionCredentials::new(token, login)
        );
    }

    /// Exporting and re-importing a bundle preserves the credentials.
    #[test]
    fn prop_bundle_round_trip_preserves_credentials(token in arb_token(), login in arb_token()) {
        let bundle = serde_json::json!({
            "ugPhoneLang": "en",
            "UGPHONE-MQTT": {"access_token": token, "login_id": login},
        })
        .to_string();
        let first = MemorySessionStore::new();
        import_bundle(&first, &bundle).unwrap();

        let second = MemorySessionStore::new();
        import_bundle(&second, &export_bundle(&first).unwrap()).unwrap();

        prop_assert_eq!(SessionCredentials::read(&second), SessionCredentials::read(&first));
    }

    /// No host outside the allow-list passes the production gate.
    #[test]
    fn prop_foreign_hosts_are_rejected(host in arb_foreign_host()) {
        prop_assert!(!DomainGate::production().validate(&host).is_allowed());
    }

    /// The allowed hosts pass regardless of ASCII case.
    #[test]
    fn prop_allowed_hosts_ignore_case(upper in proptest::collection::vec(any::<bool>(), 15)) {
        let host: String = "www.ugphone.com"
            .chars()
            .zip(upper)
            .map(|(c, u)| if u { c.to_ascii_uppercase() } else { c })
            .collect();
        prop_assert!(DomainGate::production().validate(&host).is_allowed());
    }
}
