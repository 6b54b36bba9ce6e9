//! Wire-level types for the xenstore directory-service protocol: the opcode
//! set, frame header layout, payload encoding helpers, and the `xsd_errors`
//! translation table (§6). Nothing here touches the ring or the store —
//! this crate only knows how bytes are shaped, not what they mean.

mod errno;
mod header;
mod opcode;
mod payload;

pub use errno::{errno_name, EACCES, EAGAIN, EBUSY, EEXIST, EINVAL, EIO, EISCONN, EISDIR, ENOENT, ENOMEM, ENOSPC, ENOSYS, ENOTEMPTY, EROFS, E2BIG};
pub use header::{Header, HEADER_LEN};
pub use opcode::Opcode;
pub use payload::{encode_cstr, encode_directory_listing, encode_watch_event, split_at_nul, str_byte_size};
