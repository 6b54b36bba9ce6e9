/// The wire's `xsd_errors` table: negative errno values paired with the
/// string name sent in an `XS_ERROR` reply payload (§6 "Error table").
///
/// Order matters only in that index 0 (`EINVAL`) is the fallback for an
/// untranslatable code (§4.F "Error translation").
const XSD_ERRORS: &[(i32, &str)] = &[
    (EINVAL, "EINVAL"),
    (EACCES, "EACCES"),
    (EEXIST, "EEXIST"),
    (EISDIR, "EISDIR"),
    (ENOENT, "ENOENT"),
    (ENOMEM, "ENOMEM"),
    (ENOSPC, "ENOSPC"),
    (EIO, "EIO"),
    (ENOTEMPTY, "ENOTEMPTY"),
    (ENOSYS, "ENOSYS"),
    (EROFS, "EROFS"),
    (EBUSY, "EBUSY"),
    (EAGAIN, "EAGAIN"),
    (EISCONN, "EISCONN"),
    (E2BIG, "E2BIG"),
];

pub const EINVAL: i32 = 22;
pub const EACCES: i32 = 13;
pub const EEXIST: i32 = 17;
pub const EISDIR: i32 = 21;
pub const ENOENT: i32 = 2;
pub const ENOMEM: i32 = 12;
pub const ENOSPC: i32 = 28;
pub const EIO: i32 = 5;
pub const ENOTEMPTY: i32 = 39;
pub const ENOSYS: i32 = 38;
pub const EROFS: i32 = 30;
pub const EBUSY: i32 = 16;
pub const EAGAIN: i32 = 11;
pub const EISCONN: i32 = 106;
pub const E2BIG: i32 = 7;

/// Translates a raw errno into its wire name, falling back to `EINVAL` for
/// any value not in `XSD_ERRORS` (§4.F "Error translation").
#[must_use]
pub fn errno_name(code: i32) -> &'static str {
    XSD_ERRORS
        .iter()
        .find(|(value, _)| *value == code)
        .map_or("EINVAL", |(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_known_codes() {
        assert_eq!(errno_name(ENOENT), "ENOENT");
        assert_eq!(errno_name(EBUSY), "EBUSY");
        assert_eq!(errno_name(ENOSYS), "ENOSYS");
    }

    #[test]
    fn untranslatable_code_falls_back_to_einval() {
        assert_eq!(errno_name(-1), "EINVAL");
        assert_eq!(errno_name(999), "EINVAL");
    }
}
