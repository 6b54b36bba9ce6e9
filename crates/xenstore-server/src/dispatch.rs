//! Opcode dispatch (§4.F). Each handler receives the guest and the already
//! length-framed payload and produces a [`DispatchOutcome`]; the worker is
//! responsible for actually writing the resulting frame to the ring.

use xenstore_store::{construct_path, is_abs_path, DirectoryService, StoreError};
use xenstore_wire::{encode_cstr, encode_directory_listing, errno_name, split_at_nul, Opcode, EBUSY, EINVAL, ENOSYS};

use crate::guest::GuestContext;

/// What the worker should do after a dispatch call returns.
pub enum DispatchOutcome {
    /// Write one reply frame with the given opcode and payload.
    Reply { opcode: Opcode, payload: Vec<u8> },
    /// No reply now; the worker will synthesize one later (`TRANSACTION_END`).
    Deferred,
    /// No reply at all — reproduces the source's `RM`-replies-only-on-failure
    /// behavior (§9 open question).
    None,
}

fn errno_reply(code: i32) -> DispatchOutcome {
    DispatchOutcome::Reply { opcode: Opcode::Error, payload: encode_cstr(errno_name(code)) }
}

fn ok_reply(payload: Vec<u8>, opcode: Opcode) -> DispatchOutcome {
    DispatchOutcome::Reply { opcode, payload }
}

/// Dispatches one request (§4.F's handler table) for `guest` against `svc`.
#[tracing::instrument(skip(svc, payload, guest), fields(domid = guest.domid))]
pub fn dispatch(op: Opcode, req_id: u32, payload: &[u8], guest: &GuestContext, svc: &DirectoryService) -> DispatchOutcome {
    match op {
        Opcode::Directory => handle_directory(payload, guest, svc),
        Opcode::Read => handle_read(payload, guest, svc),
        Opcode::Write => handle_write(payload, guest, svc),
        Opcode::Mkdir => handle_mkdir(payload, guest, svc),
        Opcode::Rm => handle_rm(payload, guest, svc),
        Opcode::Watch => handle_watch(payload, guest, svc),
        Opcode::Unwatch => handle_unwatch(payload, guest, svc),
        Opcode::ResetWatches => {
            svc.reset_watches();
            ok_reply(encode_cstr("OK"), op)
        }
        Opcode::GetPerms => errno_reply(ENOSYS),
        Opcode::SetPerms => ok_reply(encode_cstr("OK"), op),
        Opcode::GetDomainPath => handle_get_domain_path(payload, op),
        Opcode::Control => ok_reply(encode_cstr("OK"), op),
        Opcode::TransactionStart => handle_transaction_start(guest, op),
        Opcode::TransactionEnd => handle_transaction_end(guest, req_id),
        Opcode::Introduce
        | Opcode::Release
        | Opcode::WatchEvent
        | Opcode::Error
        | Opcode::IsDomainIntroduced
        | Opcode::Resume
        | Opcode::SetTarget
        | Opcode::Restrict
        | Opcode::DirectoryPart => errno_reply(ENOSYS),
    }
}

fn handle_directory(payload: &[u8], guest: &GuestContext, svc: &DirectoryService) -> DispatchOutcome {
    let path = match construct_path(payload, guest.domid) {
        Ok(p) => p,
        Err(e) => return errno_reply(e.errno()),
    };
    match svc.directory(&path) {
        Ok(children) => ok_reply(encode_directory_listing(&children), Opcode::Directory),
        Err(StoreError::NotFound) => ok_reply(Vec::new(), Opcode::Directory),
        Err(e) => errno_reply(e.errno()),
    }
}

fn handle_read(payload: &[u8], guest: &GuestContext, svc: &DirectoryService) -> DispatchOutcome {
    let path = match construct_path(payload, guest.domid) {
        Ok(p) => p,
        Err(e) => return errno_reply(e.errno()),
    };
    match svc.read(&path) {
        Ok(value) => ok_reply(value, Opcode::Read),
        Err(e) => errno_reply(e.errno()),
    }
}

fn handle_write(payload: &[u8], guest: &GuestContext, svc: &DirectoryService) -> DispatchOutcome {
    let Some((path_bytes, value)) = split_at_nul(payload) else {
        return errno_reply(EINVAL);
    };
    let path = match construct_path(path_bytes, guest.domid) {
        Ok(p) => p,
        Err(e) => return errno_reply(e.errno()),
    };
    match svc.write(&path, value, guest.domid) {
        Ok(()) => ok_reply(encode_cstr("OK"), Opcode::Write),
        Err(e) => errno_reply(e.errno()),
    }
}

fn handle_mkdir(payload: &[u8], guest: &GuestContext, svc: &DirectoryService) -> DispatchOutcome {
    let path = match construct_path(payload, guest.domid) {
        Ok(p) => p,
        Err(e) => return errno_reply(e.errno()),
    };
    match svc.mkdir(&path, guest.domid) {
        Ok(()) => ok_reply(encode_cstr("OK"), Opcode::Mkdir),
        Err(e) => errno_reply(e.errno()),
    }
}

/// `RM` replies only when the removal fails, reproducing the source's
/// `handle_rm`/`xss_do_rm`: `xss_do_rm` returns truthy on failure (node not
/// found), and only that branch calls `send_reply`. A successful removal
/// gets silence, and the failure reply carries an empty payload rather than
/// an errno frame — `send_reply_read(domain, id, XS_RM, "")` regardless of
/// which error occurred.
fn handle_rm(payload: &[u8], guest: &GuestContext, svc: &DirectoryService) -> DispatchOutcome {
    let path = match construct_path(payload, guest.domid) {
        Ok(p) => p,
        Err(e) => return errno_reply(e.errno()),
    };
    match svc.rm(&path, guest.domid) {
        Ok(()) => DispatchOutcome::None,
        Err(_) => DispatchOutcome::Reply { opcode: Opcode::Rm, payload: Vec::new() },
    }
}

fn handle_watch(payload: &[u8], guest: &GuestContext, svc: &DirectoryService) -> DispatchOutcome {
    let Some((path_bytes, token)) = split_at_nul(payload) else {
        return errno_reply(EINVAL);
    };
    let is_relative = !is_abs_path(path_bytes);
    let path = match construct_path(path_bytes, guest.domid) {
        Ok(p) => p,
        Err(e) => return errno_reply(e.errno()),
    };
    svc.watch(guest.domid, &path, token, is_relative);
    ok_reply(encode_cstr("OK"), Opcode::Watch)
}

fn handle_unwatch(payload: &[u8], guest: &GuestContext, svc: &DirectoryService) -> DispatchOutcome {
    let Some((path_bytes, token)) = split_at_nul(payload) else {
        return errno_reply(EINVAL);
    };
    let path = match construct_path(path_bytes, guest.domid) {
        Ok(p) => p,
        Err(e) => return errno_reply(e.errno()),
    };
    svc.unwatch(guest.domid, &path, token);
    ok_reply(Vec::new(), Opcode::Unwatch)
}

fn handle_get_domain_path(payload: &[u8], op: Opcode) -> DispatchOutcome {
    if payload.is_empty() {
        return errno_reply(EINVAL);
    }
    let domid_str = String::from_utf8_lossy(payload);
    ok_reply(encode_cstr(&format!("/local/domain/{domid_str}")), op)
}

fn handle_transaction_start(guest: &GuestContext, op: Opcode) -> DispatchOutcome {
    match guest.start_transaction() {
        Ok(id) => ok_reply(encode_cstr(&id.to_string()), op),
        Err(()) => errno_reply(EBUSY),
    }
}

fn handle_transaction_end(guest: &GuestContext, req_id: u32) -> DispatchOutcome {
    guest.defer_transaction_end(req_id);
    DispatchOutcome::Deferred
}
