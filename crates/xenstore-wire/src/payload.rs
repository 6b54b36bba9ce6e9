/// Byte size of a C string including its terminating NUL (§4.B
/// `str_byte_size`). Reply payloads for most opcodes are NUL-terminated; the
/// `READ` reply is the one exception (§4.F).
#[inline]
#[must_use]
pub fn str_byte_size(s: &[u8]) -> usize {
    s.len() + 1
}

/// Splits a payload at its first NUL byte into `(before, after)`, the shape
/// every path+token or path+value opcode uses (§6 "Payload encoding").
/// Returns `None` if the payload contains no NUL.
#[must_use]
pub fn split_at_nul(payload: &[u8]) -> Option<(&[u8], &[u8])> {
    let pos = payload.iter().position(|&b| b == 0)?;
    Some((&payload[..pos], &payload[pos + 1..]))
}

/// Encodes a directory listing as `child1\0child2\0...` (§4.F `DIRECTORY`).
/// Returns an empty vector for an empty list.
#[must_use]
pub fn encode_directory_listing<T: AsRef<[u8]>>(children: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(children.iter().map(|c| str_byte_size(c.as_ref())).sum());
    for child in children {
        out.extend_from_slice(child.as_ref());
        out.push(0);
    }
    out
}

/// Encodes a watch event payload: `event_path\0token\0` (§6 "Watch-event
/// payload").
#[must_use]
pub fn encode_watch_event(event_path: &[u8], token: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(str_byte_size(event_path) + str_byte_size(token));
    out.extend_from_slice(event_path);
    out.push(0);
    out.extend_from_slice(token);
    out.push(0);
    out
}

/// Encodes a plain NUL-terminated string reply payload (`"OK\0"`, errno
/// names, decimal transaction ids, ...).
#[must_use]
pub fn encode_cstr(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() + 1);
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_path_and_value() {
        let (path, value) = split_at_nul(b"foo\0bar").unwrap();
        assert_eq!(path, b"foo");
        assert_eq!(value, b"bar");
    }

    #[test]
    fn missing_nul_is_none() {
        assert!(split_at_nul(b"no-separator").is_none());
    }

    #[test]
    fn directory_listing_is_nul_joined_with_trailing_terminator() {
        let listing = encode_directory_listing(&["a", "bb"]);
        assert_eq!(listing, b"a\0bb\0");
    }

    #[test]
    fn watch_event_has_two_nul_terminated_fields() {
        let payload = encode_watch_event(b"cfg/x", b"tok1");
        assert_eq!(payload, b"cfg/x\0tok1\0");
    }
}
