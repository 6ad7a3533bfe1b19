/*
[INPUT]:  API key/secret and exchange time samples
[OUTPUT]: Credentials, HMAC signatures and skew-corrected timestamps
[POS]:    Auth layer - handles BYDFi API authentication
[UPDATE]: When auth flow or signature methods change
*/

pub mod clock;
pub mod credentials;
pub mod signer;

pub use clock::ServerClock;
pub use credentials::Credentials;
pub use signer::HmacSigner;
