//! Request signature.
//!
//! The server authenticates `api.php` calls with
//! `md5(k1=v1k2=v2...secret)`, keys sorted ascending, values in their plain
//! wire form. The digest always runs over UTF-8 bytes.

use md5::{Digest, Md5};

/// Compute the lowercase hex MD5 signature of `params` under `secret`.
///
/// Pass every field except `sig` itself.
pub fn signature<I, K, V>(secret: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<(K, V)> = params.into_iter().collect();
    pairs.sort_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()));

    let mut hasher = Md5::new();
    for (key, value) in &pairs {
        hasher.update(key.as_ref().as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_ref().as_bytes());
    }
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}
