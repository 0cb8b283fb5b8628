//! Proptest generators for property-based testing.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use gnap_authz_core::{
    AccessDescriptor, AccessItem, ClientKey, ConsentResult, Keypair, ProofMethod, TokenFlag,
    TokenRequest, TokenValue,
};

/// Access types known to [`DEFAULT_POLICY`](crate::fixtures::DEFAULT_POLICY).
pub const ACCESS_TYPES: [&str; 5] = ["read-email", "read-profile", "read-ssn", "photo-api", "ping"];

/// Subject attribute names, including ones no access type discloses.
pub const SUBJECT_KEYS: [&str; 5] = ["email", "name", "ssn", "phone", "address"];

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a proof method.
pub fn proof_method() -> impl Strategy<Value = ProofMethod> {
    prop_oneof![
        Just(ProofMethod::HttpSig),
        Just(ProofMethod::Jwsd),
        Just(ProofMethod::Mtls),
        "[a-z]{3,8}".prop_map(ProofMethod::from),
    ]
}

/// Generate a client key.
pub fn client_key() -> impl Strategy<Value = ClientKey> {
    (keypair(), proof_method()).prop_map(|(kp, proof)| ClientKey::new(kp.public_key(), proof))
}

/// Generate a random token value.
pub fn token_value() -> impl Strategy<Value = TokenValue> {
    any::<[u8; 32]>().prop_map(TokenValue::from_bytes)
}

/// Generate a descriptor for a known access type, as a reference or an item.
pub fn access_descriptor() -> impl Strategy<Value = AccessDescriptor> {
    (prop::sample::select(ACCESS_TYPES.to_vec()), any::<bool>()).prop_map(|(name, structured)| {
        if structured {
            AccessDescriptor::Item(AccessItem::new(name).action("read"))
        } else {
            AccessDescriptor::reference(name)
        }
    })
}

/// Generate a token flag set.
pub fn token_flags() -> impl Strategy<Value = BTreeSet<TokenFlag>> {
    prop::collection::btree_set(prop_oneof![Just(TokenFlag::Bearer), Just(TokenFlag::Durable)], 0..=2)
}

/// Generate a token request over known access types.
pub fn token_request() -> impl Strategy<Value = TokenRequest> {
    (
        prop::collection::vec(access_descriptor(), 1..=3),
        prop::option::of("[a-z]{1,8}"),
        token_flags(),
    )
        .prop_map(|(access, label, flags)| TokenRequest {
            access,
            label,
            flags,
        })
}

/// Generate subject data over [`SUBJECT_KEYS`].
pub fn subject_data() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(
        prop::sample::select(SUBJECT_KEYS.to_vec()).prop_map(String::from),
        "[a-z0-9@.]{1,16}",
        0..=SUBJECT_KEYS.len(),
    )
}

/// Generate a consent result granting up to four tokens.
pub fn consent_result() -> impl Strategy<Value = ConsentResult> {
    (subject_data(), prop::collection::vec(token_request(), 0..=4))
        .prop_map(|(subject_data, tokens)| ConsentResult {
            subject_data,
            tokens,
        })
}
