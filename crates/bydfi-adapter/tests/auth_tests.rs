/*
[INPUT]:  API credentials, payloads and clock samples
[OUTPUT]: Test results for credentials, signing and clock sync
[POS]:    Integration tests - authentication
[UPDATE]: When auth flow or signature format changes
*/

mod common;

use bydfi_adapter::http::{HttpMethod, RequestSigner};
use bydfi_adapter::{
    BydfiClient, BydfiError, ClientConfig, Credentials, HmacSigner, RequestParams, ServerClock,
};
use common::{test_credentials, TEST_API_KEY};
use rstest::rstest;
use tokio_test::assert_ok;

// Published HMAC-SHA256 reference pair for this signature scheme
const REFERENCE_SECRET: &str = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
const REFERENCE_PAYLOAD: &str =
    "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
const REFERENCE_SIGNATURE: &str = "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71";

#[test]
fn test_reference_signature() {
    let credentials = assert_ok!(Credentials::new("any-key", REFERENCE_SECRET));
    let signer = HmacSigner::new(credentials);

    assert_eq!(assert_ok!(signer.sign(REFERENCE_PAYLOAD)), REFERENCE_SIGNATURE);
    assert!(signer.verify(REFERENCE_PAYLOAD, REFERENCE_SIGNATURE));
    assert!(!signer.verify(&REFERENCE_PAYLOAD.replace("LTCBTC", "ETHBTC"), REFERENCE_SIGNATURE));
}

#[rstest]
#[case("", "secret")]
#[case("key", "")]
#[case("   ", "secret")]
fn test_blank_credentials_rejected(#[case] key: &str, #[case] secret: &str) {
    assert!(matches!(Credentials::new(key, secret), Err(BydfiError::Config(_))));
}

#[test]
fn test_debug_output_hides_secret() {
    let rendered = format!("{:?}", test_credentials());
    assert!(!rendered.contains(common::TEST_API_SECRET));

    let config = ClientConfig::default().with_credentials(TEST_API_KEY, "very-secret");
    assert!(!format!("{config:?}").contains("very-secret"));
}

#[rstest]
#[case(Some("key"), None)]
#[case(None, Some("secret"))]
fn test_half_configured_credentials_rejected(#[case] key: Option<&str>, #[case] secret: Option<&str>) {
    let result = ClientConfig::from_lookup(|name| match name {
        "BYDFI_API_KEY" => key.map(str::to_string),
        "BYDFI_API_SECRET" => secret.map(str::to_string),
        _ => None,
    });
    assert!(matches!(result, Err(BydfiError::Config(_))));
}

#[test]
fn test_signed_request_carries_timestamp_and_signature() {
    let signer = RequestSigner::new(HmacSigner::new(test_credentials())).with_recv_window(Some(5_000));
    let params = RequestParams::new().with("symbol", "BTC-USDT").with("limit", 10);

    let signed = assert_ok!(signer.sign(HttpMethod::Get, "/api/v1/allOrders", &params, 1_700_000_000_000));
    let query = signed.query_string();
    let (payload, signature) = query.split_once("&signature=").expect("signature appended");

    assert_eq!(
        payload,
        "limit=10&recvWindow=5000&symbol=BTC-USDT&timestamp=1700000000000"
    );
    assert!(HmacSigner::new(test_credentials()).verify(payload, signature));
    // Caller params are left untouched
    assert!(!params.contains_key("timestamp"));
}

#[test]
fn test_clock_offset_shared_between_clones() {
    let client = assert_ok!(BydfiClient::new());
    let clone = client.clone();

    let offset = client.clock().record_sample(1_000, 6_000, 1_200);
    assert_eq!(offset, 4_900);
    assert_eq!(clone.clock().offset_ms(), 4_900);

    let drift = clone.clock().now_ms() as i64 - ServerClock::local_ms();
    assert!((drift - 4_900).abs() < 1_000);
}

#[test]
fn test_set_credentials_enables_signing() {
    let mut client = assert_ok!(BydfiClient::new());
    assert!(client.api_key().is_none());

    client.set_credentials(test_credentials());
    assert!(client.has_credentials());
    assert_eq!(client.api_key(), Some(TEST_API_KEY));
}
