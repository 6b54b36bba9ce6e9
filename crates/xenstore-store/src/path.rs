use crate::error::StoreError;

/// `XENSTORE_ABS_PATH_MAX`: maximum encoded length of an absolute path,
/// including the trailing NUL the wire always budgets for (§3 "Path").
pub const ABS_PATH_MAX: usize = 3072;

/// Maximum length of `/local/domain/<domid>/`, domid in `0..=32767` (§4.B).
pub const MAX_LOCALPATH_LEN: usize = 21;

/// `true` if `path` is non-empty and begins with `/` (§4.B `is_abs_path`).
#[inline]
#[must_use]
pub fn is_abs_path(path: &[u8]) -> bool {
    path.first() == Some(&b'/')
}

/// `true` if `path` is exactly `/` (§4.B `is_root_path`).
#[inline]
#[must_use]
pub fn is_root_path(path: &[u8]) -> bool {
    is_abs_path(path) && path.len() == 1
}

/// Splits `path` into its non-empty segments, ignoring empty ones so a
/// trailing slash or a run of consecutive slashes tokenizes the same as a
/// single separator (§4.C "Tie-breaks and edge cases").
#[must_use]
pub fn tokenize(path: &[u8]) -> Vec<&[u8]> {
    path.split(|&b| b == b'/').filter(|segment| !segment.is_empty()).collect()
}

/// Builds the absolute path a request payload addresses (§4.B
/// `construct_path`): payloads starting with `/` are used verbatim, anything
/// else is resolved under the caller's home subtree
/// `/local/domain/<domid>/`.
///
/// # Errors
///
/// Returns [`StoreError::OutOfMemory`] if the resulting path would exceed
/// [`ABS_PATH_MAX`] — the source's allocation-failure path for an oversized
/// request, preserved here as a length check since Rust doesn't let a
/// well-formed small allocation fail.
pub fn construct_path(payload: &[u8], domid: u32) -> Result<Vec<u8>, StoreError> {
    if is_abs_path(payload) {
        if payload.len() + 1 > ABS_PATH_MAX {
            return Err(StoreError::OutOfMemory);
        }
        return Ok(payload.to_vec());
    }

    let home = format!("/local/domain/{domid}/");
    let total_len = home.len() + payload.len() + 1;
    if total_len > ABS_PATH_MAX {
        return Err(StoreError::OutOfMemory);
    }

    let mut out = Vec::with_capacity(home.len() + payload.len());
    out.extend_from_slice(home.as_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// The home subtree prefix for a guest, `/local/domain/<domid>/` (no
/// trailing path component).
#[must_use]
pub fn home_subtree_prefix(domid: u32) -> Vec<u8> {
    format!("/local/domain/{domid}/").into_bytes()
}
