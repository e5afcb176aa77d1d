use memchr::memchr;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::{ClientError, Error, Result};

/// The authentication plugins this client can answer.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/8.0.12/page_protocol_connection_phase_authentication_methods.html>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPlugin {
    MySqlNativePassword,
    CachingSha2Password,
}

impl AuthPlugin {
    pub(crate) fn from_str(s: &str) -> Result<Self> {
        match s {
            "mysql_native_password" => Ok(AuthPlugin::MySqlNativePassword),
            "caching_sha2_password" => Ok(AuthPlugin::CachingSha2Password),

            _ => Err(Error::Client(ClientError::UnsupportedAuthPlugin(
                s.to_owned(),
            ))),
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            AuthPlugin::MySqlNativePassword => "mysql_native_password",
            AuthPlugin::CachingSha2Password => "caching_sha2_password",
        }
    }

    /// Computes the challenge response for this plugin.
    ///
    /// An empty password always answers with an empty response.
    pub(crate) fn scramble(self, password: &str, nonce: &[u8]) -> Vec<u8> {
        if password.is_empty() {
            return Vec::new();
        }

        match self {
            AuthPlugin::MySqlNativePassword => {
                // The nonce is (optionally) NUL-terminated on the wire
                let end = memchr(b'\0', nonce).unwrap_or(nonce.len());

                scramble_sha1(password, &nonce[..end]).to_vec()
            }

            AuthPlugin::CachingSha2Password => scramble_sha256(password, nonce).to_vec(),
        }
    }
}

// SHA1( password ) ^ SHA1( seed + SHA1( SHA1( password ) ) )
// https://mariadb.com/kb/en/connection/#mysql_native_password-plugin
fn scramble_sha1(password: &str, seed: &[u8]) -> [u8; 20] {
    let pw_hash = Sha1::digest(password.as_bytes());
    let pw_hash_hash = Sha1::digest(pw_hash);

    let mut ctx = Sha1::new();
    ctx.update(seed);
    ctx.update(pw_hash_hash);

    let mut out: [u8; 20] = pw_hash.into();
    xor_eq(&mut out, &ctx.finalize());

    out
}

// SHA256( password ) ^ SHA256( SHA256( SHA256( password ) ) + seed )
// https://mariadb.com/kb/en/caching_sha2_password-authentication-plugin/
fn scramble_sha256(password: &str, seed: &[u8]) -> [u8; 32] {
    let pw_hash = Sha256::digest(password.as_bytes());
    let pw_hash_hash = Sha256::digest(pw_hash);

    let mut ctx = Sha256::new();
    ctx.update(pw_hash_hash);
    ctx.update(seed);

    let mut out: [u8; 32] = pw_hash.into();
    xor_eq(&mut out, &ctx.finalize());

    out
}

fn xor_eq(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(dst.len(), src.len());

    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

#[cfg(test)]
mod tests {
    use super::AuthPlugin;
    use matches::assert_matches;

    const NONCE: [u8; 20] = [
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20,
    ];

    #[test]
    fn it_parses_plugin_names() {
        assert_matches!(
            AuthPlugin::from_str("mysql_native_password"),
            Ok(AuthPlugin::MySqlNativePassword)
        );

        assert_matches!(
            AuthPlugin::from_str("caching_sha2_password"),
            Ok(AuthPlugin::CachingSha2Password)
        );

        assert!(AuthPlugin::from_str("sha256_password").is_err());
    }

    #[test]
    fn it_scrambles_mysql_native_password() {
        let response = AuthPlugin::MySqlNativePassword.scramble("password", &NONCE);

        assert_eq!(
            response,
            [
                193, 125, 96, 9, 165, 203, 71, 229, 159, 116, 131, 252, 240, 85, 83, 187, 191,
                125, 208, 214,
            ]
        );
    }

    #[test]
    fn it_scrambles_caching_sha2_password() {
        let response = AuthPlugin::CachingSha2Password.scramble("password", &NONCE);

        assert_eq!(
            response,
            [
                247, 171, 28, 98, 58, 110, 152, 220, 234, 179, 94, 146, 98, 144, 229, 116, 106,
                49, 65, 17, 97, 21, 244, 221, 140, 204, 169, 148, 57, 62, 204, 221,
            ]
        );
    }

    #[test]
    fn it_answers_empty_password_with_empty_response() {
        assert!(AuthPlugin::MySqlNativePassword.scramble("", &NONCE).is_empty());
        assert!(AuthPlugin::CachingSha2Password.scramble("", &NONCE).is_empty());
    }

    #[test]
    fn it_stops_the_sha1_nonce_at_a_nul_terminator() {
        let mut nonce = NONCE.to_vec();
        let trimmed = AuthPlugin::MySqlNativePassword.scramble("password", &nonce);

        nonce.push(0);
        let terminated = AuthPlugin::MySqlNativePassword.scramble("password", &nonce);

        assert_eq!(trimmed, terminated);
    }
}
