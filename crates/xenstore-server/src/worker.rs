//! The per-guest worker task (§4.E).

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use xenstore_ring::ByteRing;
use xenstore_store::DirectoryService;
use xenstore_wire::{encode_cstr, encode_watch_event, errno_name, Header, Opcode, EINVAL, ENOSYS, HEADER_LEN};

use crate::dispatch::{dispatch, DispatchOutcome};
use crate::guest::GuestContext;
use crate::hypervisor::Hypervisor;

/// Reads exactly `buf.len()` bytes out of `ring`, looping on short reads.
/// Frames are written by their producer before the event channel is
/// signalled, so a short read only happens in the narrow window between a
/// partial `copy_in` and its follow-up; it resolves within a few retries.
async fn read_exact(ring: &ByteRing, buf: &mut [u8]) {
    let mut filled = 0usize;
    while filled < buf.len() {
        let n = ring.copy_out(&mut buf[filled..]) as usize;
        if n == 0 {
            tokio::task::yield_now().await;
            continue;
        }
        filled += n;
    }
}

fn write_reply(guest: &GuestContext, hv: &dyn Hypervisor, req_id: u32, opcode: Opcode, payload: Vec<u8>) {
    let header = Header { msg_type: opcode.wire_value(), req_id, tx_id: 0, len: payload.len() as u32 };
    if let Err(err) = guest.iface.rsp.write_all(&header.encode()) {
        tracing::error!(domid = guest.domid, %err, "failed writing reply header");
        return;
    }
    if let Err(err) = hv.notify_evtchn(guest.domid, guest.local_port) {
        tracing::warn!(domid = guest.domid, %err, "failed to signal event channel after header");
    }
    if let Err(err) = guest.iface.rsp.write_all(&payload) {
        tracing::error!(domid = guest.domid, %err, "failed writing reply payload");
        return;
    }
    if let Err(err) = hv.notify_evtchn(guest.domid, guest.local_port) {
        tracing::warn!(domid = guest.domid, %err, "failed to signal event channel after payload");
    }
}

/// Drives one guest's request/reply loop until its shutdown flag is set and
/// the ring has nothing left to read, then purges its watch state.
#[tracing::instrument(skip_all, fields(domid = guest.domid))]
pub async fn run_worker(guest: Arc<GuestContext>, svc: Arc<DirectoryService>, hv: Arc<dyn Hypervisor>, poll_interval: Duration) {
    let mut safety_net = interval(poll_interval);

    loop {
        if let Some(req_id) = guest.take_pending_transaction_end() {
            write_reply(&guest, hv.as_ref(), req_id, Opcode::TransactionEnd, encode_cstr("OK"));
        }

        if guest.current_transaction() == 0 {
            for event in svc.drain_events(guest.domid) {
                let payload = encode_watch_event(&event.path, &event.token);
                write_reply(&guest, hv.as_ref(), 0, Opcode::WatchEvent, payload);
            }
        }

        if guest.iface.req.readable() == 0 {
            if guest.shutdown.is_stop_requested() {
                break;
            }
            tokio::select! {
                () = guest.wake.notified() => {}
                _ = safety_net.tick() => {}
            }
            continue;
        }

        let mut header_bytes = [0u8; HEADER_LEN];
        read_exact(&guest.iface.req, &mut header_bytes).await;
        let header = Header::decode(&header_bytes);

        if header.len > guest.iface.req.capacity() {
            tracing::warn!(domid = guest.domid, len = header.len, "oversized request header, dropping frame");
            write_reply(&guest, hv.as_ref(), header.req_id, Opcode::Error, encode_cstr(errno_name(EINVAL)));
            continue;
        }

        let mut body = vec![0u8; header.len as usize];
        read_exact(&guest.iface.req, &mut body).await;

        let Some(op) = Opcode::from_wire(header.msg_type) else {
            write_reply(&guest, hv.as_ref(), header.req_id, Opcode::Error, encode_cstr(errno_name(ENOSYS)));
            continue;
        };

        match dispatch(op, header.req_id, &body, &guest, &svc) {
            DispatchOutcome::Reply { opcode, payload } => write_reply(&guest, hv.as_ref(), header.req_id, opcode, payload),
            DispatchOutcome::Deferred | DispatchOutcome::None => {}
        }
    }

    svc.purge_domain(guest.domid);
}
