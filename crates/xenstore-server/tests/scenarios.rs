//! End-to-end request/reply and watch-delivery scenarios driven through the
//! public `Server` API, simulating a guest peer on the other end of the ring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use xenstore_ring::DomainInterface;
use xenstore_server::{Hypervisor, Server, ServerConfig, SimulatedHypervisor};
use xenstore_wire::{Header, Opcode, HEADER_LEN};

fn request_frame(opcode: Opcode, req_id: u32, payload: &[u8]) -> Vec<u8> {
    let header = Header { msg_type: opcode.wire_value(), req_id, tx_id: 0, len: payload.len() as u32 };
    let mut out = header.encode().to_vec();
    out.extend_from_slice(payload);
    out
}

/// Writes a request frame into `iface.req` and signals the event channel, as
/// a guest kernel would after placing a frame on the ring.
fn send(hv: &SimulatedHypervisor, iface: &DomainInterface, local_port: u32, domid: u32, opcode: Opcode, req_id: u32, payload: &[u8]) {
    iface.req.write_all(&request_frame(opcode, req_id, payload)).unwrap();
    hv.notify_evtchn(domid, local_port).unwrap();
}

/// Waits a short grace period and asserts no reply frame showed up on
/// `iface.rsp` in that window — used for opcodes that only reply on the
/// opposite outcome from what was just driven (e.g. a successful `RM`).
async fn assert_no_reply(iface: &DomainInterface) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(iface.rsp.readable(), 0, "expected no reply frame to have been written");
}

/// Blocks (with a generous test timeout) until `iface.rsp` has a full frame,
/// then returns its `(header, payload)`.
async fn recv(iface: &DomainInterface) -> (Header, Vec<u8>) {
    timeout(Duration::from_secs(5), async {
        loop {
            if iface.rsp.readable() as usize >= HEADER_LEN {
                break;
            }
            tokio::task::yield_now().await;
        }
        let mut header_bytes = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            let n = iface.rsp.copy_out(&mut header_bytes[filled..]) as usize;
            filled += n;
            if n == 0 {
                tokio::task::yield_now().await;
            }
        }
        let header = Header::decode(&header_bytes);
        let mut body = vec![0u8; header.len as usize];
        let mut filled = 0;
        while filled < body.len() {
            let n = iface.rsp.copy_out(&mut body[filled..]) as usize;
            filled += n;
            if n == 0 {
                tokio::task::yield_now().await;
            }
        }
        (header, body)
    })
    .await
    .expect("reply did not arrive in time")
}

struct Harness {
    server: Server,
    hv: Arc<SimulatedHypervisor>,
}

impl Harness {
    fn new() -> Self {
        let hv = Arc::new(SimulatedHypervisor::new());
        let server = Server::new(ServerConfig::new(), Arc::clone(&hv) as Arc<dyn Hypervisor>);
        Self { server, hv }
    }

    fn start(&self, domid: u32) {
        self.server.start(domid, 1, 0, 0).unwrap();
    }

    fn iface(&self, domid: u32) -> Arc<DomainInterface> {
        self.server.interface(domid).unwrap()
    }

    fn local_port(&self, domid: u32) -> u32 {
        self.server.local_port(domid).unwrap()
    }

    async fn send_and_recv(&self, domid: u32, opcode: Opcode, req_id: u32, payload: &[u8]) -> (Header, Vec<u8>) {
        let iface = self.iface(domid);
        let port = self.local_port(domid);
        send(&self.hv, &iface, port, domid, opcode, req_id, payload);
        recv(&iface).await
    }
}

#[tokio::test]
async fn s1_write_then_read_round_trip() {
    let h = Harness::new();
    h.start(2);

    let (header, payload) = h.send_and_recv(2, Opcode::Write, 1, b"foo\0bar").await;
    assert_eq!(header.msg_type, Opcode::Write.wire_value());
    assert_eq!(payload, b"OK\0");

    let (header, payload) = h.send_and_recv(2, Opcode::Read, 2, b"foo").await;
    assert_eq!(header.msg_type, Opcode::Read.wire_value());
    assert_eq!(payload, b"bar");

    h.server.stop(2).await.unwrap();
}

#[tokio::test]
async fn s2_relative_watch_fires_with_stripped_prefix() {
    let h = Harness::new();
    h.start(3);
    h.start(0);

    let (_, ack) = h.send_and_recv(3, Opcode::Watch, 1, b"cfg\0tok1").await;
    assert_eq!(ack, b"OK\0");

    h.send_and_recv(0, Opcode::Write, 2, b"/local/domain/3/cfg/x\x001").await;

    let watcher_iface = h.iface(3);
    let (header, payload) = recv(&watcher_iface).await;
    assert_eq!(header.msg_type, Opcode::WatchEvent.wire_value());
    assert_eq!(payload, b"cfg/x\0tok1\0");

    h.server.stop(3).await.unwrap();
    h.server.stop(0).await.unwrap();
}

#[tokio::test]
async fn s3_absolute_watch_fires_with_full_path() {
    let h = Harness::new();
    h.start(3);
    h.start(0);

    let (_, ack) = h.send_and_recv(3, Opcode::Watch, 1, b"/local/domain/3/cfg\0tok2").await;
    assert_eq!(ack, b"OK\0");

    h.send_and_recv(0, Opcode::Write, 2, b"/local/domain/3/cfg/x\x001").await;

    let watcher_iface = h.iface(3);
    let (header, payload) = recv(&watcher_iface).await;
    assert_eq!(header.msg_type, Opcode::WatchEvent.wire_value());
    assert_eq!(payload, b"/local/domain/3/cfg/x\0tok2\0");

    h.server.stop(3).await.unwrap();
    h.server.stop(0).await.unwrap();
}

#[tokio::test]
async fn s4_self_mutation_is_not_delivered_back() {
    let h = Harness::new();
    h.start(3);

    let (_, ack) = h.send_and_recv(3, Opcode::Watch, 1, b"/a\0t").await;
    assert_eq!(ack, b"OK\0");

    // domid=3 writes under its own watch; it must not receive a WATCH_EVENT,
    // only the WRITE reply itself.
    let (header, payload) = h.send_and_recv(3, Opcode::Write, 2, b"/a/b\0v").await;
    assert_eq!(header.msg_type, Opcode::Write.wire_value());
    assert_eq!(payload, b"OK\0");

    // Confirm no watch event is queued by issuing an unrelated request and
    // checking its reply arrives next, not a WATCH_EVENT frame.
    let (header, payload) = h.send_and_recv(3, Opcode::Read, 3, b"/a/b").await;
    assert_eq!(header.msg_type, Opcode::Read.wire_value());
    assert_eq!(payload, b"v");

    h.server.stop(3).await.unwrap();
}

#[tokio::test]
async fn s5_recursive_remove() {
    let h = Harness::new();
    h.start(2);

    h.send_and_recv(2, Opcode::Write, 1, b"/x/y/z\0v").await;

    // A successful RM gets no reply at all (§9: the source only replies when
    // the removal fails), so this can't go through `send_and_recv`.
    let iface = h.iface(2);
    let port = h.local_port(2);
    send(&h.hv, &iface, port, 2, Opcode::Rm, 2, b"/x");
    assert_no_reply(&iface).await;

    let (header, payload) = h.send_and_recv(2, Opcode::Read, 3, b"/x/y/z").await;
    assert_eq!(header.msg_type, Opcode::Error.wire_value());
    assert_eq!(payload, b"ENOENT\0");

    let (_, payload) = h.send_and_recv(2, Opcode::Directory, 4, b"/").await;
    assert!(!payload.split(|&b| b == 0).any(|seg| seg == b"x"));

    h.server.stop(2).await.unwrap();
}
