//! Token command implementation.

use seglog_server::{encode_token_hex, AuthConfig, TokenValidator};

/// Runs the token command: prints a hex subject token.
///
/// Clients pass the bytes from `seglog_server::decode_token_hex` to
/// `LogClient::connect`.
pub fn run(subject: &str, secret: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    let validator = TokenValidator::new(AuthConfig::new(secret.to_vec()));
    let token = validator.create_token(subject)?;
    println!("{}", encode_token_hex(&token));
    Ok(())
}
