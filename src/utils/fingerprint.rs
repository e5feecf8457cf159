//! Content fingerprints used for cheap change detection.
//!
//! Both the client and the server compute fingerprints independently and
//! compare them, so the digest must stay stable across processes: lowercase
//! hex MD5 over the UTF-8 bytes of the content.

use md5::Digest;
use md5::Md5;

use crate::constants::NULL_FINGERPRINT;

/// Fingerprint of `content`. Absent content maps to [`NULL_FINGERPRINT`], which
/// differs from the fingerprint of empty content.
pub fn fingerprint(content: Option<&str>) -> String {
    match content {
        Some(c) => md5_hex(c),
        None => NULL_FINGERPRINT.to_string(),
    }
}

pub(crate) fn md5_hex(content: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// True when `fp` is the absent-content sentinel
pub fn is_null_fingerprint(fp: &str) -> bool {
    fp == NULL_FINGERPRINT
}
