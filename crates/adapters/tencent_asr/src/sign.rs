//! TC3-HMAC-SHA256 request signing.

use chrono::DateTime;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::AsrError;

type HmacSha256 = Hmac<Sha256>;

pub(crate) const ALGORITHM: &str = "TC3-HMAC-SHA256";
pub(crate) const CONTENT_TYPE: &str = "application/json; charset=utf-8";
const SERVICE: &str = "asr";
const SIGNED_HEADERS: &str = "content-type;host";

pub(crate) struct Signer<'a> {
    pub secret_id: &'a str,
    pub secret_key: &'a str,
}

impl Signer<'_> {
    /// `Authorization` header value for a `POST /` with the given body.
    pub fn authorization(&self, host: &str, body: &[u8], timestamp: i64) -> Result<String, AsrError> {
        let date = DateTime::from_timestamp(timestamp, 0)
            .unwrap_or_default()
            .format("%Y-%m-%d")
            .to_string();

        let canonical_request = [
            "POST",
            "/",
            "",
            &format!("content-type:{CONTENT_TYPE}"),
            &format!("host:{host}"),
            "",
            SIGNED_HEADERS,
            &hex::encode(Sha256::digest(body)),
        ]
        .join("\n");

        let scope = format!("{date}/{SERVICE}/tc3_request");
        let string_to_sign = [
            ALGORITHM,
            &timestamp.to_string(),
            &scope,
            &hex::encode(Sha256::digest(canonical_request.as_bytes())),
        ]
        .join("\n");

        let secret_date = hmac(format!("TC3{}", self.secret_key).as_bytes(), &date)?;
        let secret_service = hmac(&secret_date, SERVICE)?;
        let secret_signing = hmac(&secret_service, "tc3_request")?;
        let signature = hex::encode(hmac(&secret_signing, &string_to_sign)?);

        Ok(format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
            self.secret_id
        ))
    }
}

fn hmac(key: &[u8], message: &str) -> Result<Vec<u8>, AsrError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(AsrError::InvalidKey)?;
    mac.update(message.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_known_signature() {
        let signer = Signer {
            secret_id: "AKIDEXAMPLE",
            secret_key: "secret",
        };

        let header = signer
            .authorization("asr.tencentcloudapi.com", br#"{"a":1}"#, 1_700_000_000)
            .unwrap();

        assert_eq!(
            header,
            "TC3-HMAC-SHA256 Credential=AKIDEXAMPLE/2023-11-14/asr/tc3_request, \
             SignedHeaders=content-type;host, \
             Signature=cc8074eacb4e06dea5ac05efbae395a04e59d784283581c81d8d4b4c2ce62a33"
        );
    }

    #[test]
    fn should_change_signature_with_body() {
        let signer = Signer {
            secret_id: "AKIDEXAMPLE",
            secret_key: "secret",
        };
        let a = signer.authorization("asr.tencentcloudapi.com", b"{}", 1_700_000_000).unwrap();
        let b = signer.authorization("asr.tencentcloudapi.com", b"[]", 1_700_000_000).unwrap();
        assert_ne!(a, b);
    }
}
