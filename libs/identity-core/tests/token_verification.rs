use std::sync::Once;
use uuid::Uuid;

// Test RSA key pair. NEVER use these keys outside of tests.
const TEST_PRIVATE_KEY: &str = include_str!("fixtures/test_rsa_key.pem");
const TEST_PUBLIC_KEY: &str = include_str!("fixtures/test_rsa_key.pub.pem");

static INIT: Once = Once::new();

fn init_keys() {
    INIT.call_once(|| {
        identity_core::initialize_signing_keys(TEST_PRIVATE_KEY, TEST_PUBLIC_KEY)
            .expect("test keys must initialize");
    });
}

#[test]
fn verifies_generated_access_token() {
    init_keys();
    let user_id = Uuid::new_v4();

    let token = identity_core::generate_access_token(user_id, "ada@worklink.dev", "Ada")
        .expect("token generation");
    let identity = identity_core::verify_credential(&token).expect("verification");

    assert_eq!(identity.user_id, user_id);
    assert_eq!(identity.display_name, "Ada");
    assert_eq!(identity.email, "ada@worklink.dev");
}

#[test]
fn carries_access_token_type() {
    init_keys();
    let token = identity_core::generate_access_token(Uuid::new_v4(), "b@worklink.dev", "B")
        .expect("token generation");
    let data = identity_core::validate_token(&token).expect("validation");
    assert_eq!(data.claims.token_type, "access");
    assert!(data.claims.exp > data.claims.iat);
}

#[test]
fn rejects_tampered_token() {
    init_keys();
    let token = identity_core::generate_access_token(Uuid::new_v4(), "c@worklink.dev", "C")
        .expect("token generation");

    // Flip a character in the signature segment
    let mut tampered = token.clone();
    let last = tampered.pop().expect("non-empty token");
    tampered.push(if last == 'A' { 'B' } else { 'A' });

    assert!(identity_core::verify_credential(&tampered).is_err());
}

#[test]
fn rejects_garbage_credential() {
    init_keys();
    assert!(identity_core::verify_credential("not-a-jwt").is_err());
    assert!(identity_core::verify_credential("").is_err());
}
