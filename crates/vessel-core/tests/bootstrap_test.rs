//! End-to-end exercises of the bootstrap handshake: a scripted child on
//! one end of a socket pair, the supervisor loop on the other.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use vessel_common::types::{BootstrapConfig, NamespaceKind, NamespaceRef};
use vessel_core::sync::{SyncMsg, SyncSocket, run_sync};
use vessel_core::usermap::BootstrapSupervisor;

/// Configuration whose usermap handling has no side effects: the child
/// joins a pre-existing user namespace, so no map files are touched.
fn inert_config() -> BootstrapConfig {
    BootstrapConfig {
        namespaces: vec![NamespaceRef {
            kind: NamespaceKind::User,
            path: Some(PathBuf::from("/proc/1/ns/user")),
        }],
        uid_mappings: vec![],
        gid_mappings: vec![],
        rootless_euid: true,
        ..BootstrapConfig::default()
    }
}

fn send_tag(stream: &mut UnixStream, msg: SyncMsg) {
    stream.write_all(&msg.tag().to_ne_bytes()).unwrap();
}

fn expect_tag(stream: &mut UnixStream, msg: SyncMsg) {
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf).unwrap();
    assert_eq!(u32::from_ne_bytes(buf), msg.tag());
}

#[test]
fn full_handshake_reports_child_pid() {
    let (parent, mut child) = UnixStream::pair().unwrap();
    let scripted = std::thread::spawn(move || {
        send_tag(&mut child, SyncMsg::UsermapRequest);
        expect_tag(&mut child, SyncMsg::UsermapAck);
        send_tag(&mut child, SyncMsg::TimeOffsetsRequest);
        expect_tag(&mut child, SyncMsg::TimeOffsetsAck);
        send_tag(&mut child, SyncMsg::PidRequest);
        child.write_all(&4242u32.to_ne_bytes()).unwrap();
        expect_tag(&mut child, SyncMsg::PidAck);
    });

    let config = inert_config();
    let mut supervisor = BootstrapSupervisor::new(&config, 0);
    let mut socket = SyncSocket::from(parent);
    run_sync(&mut socket, &mut supervisor).unwrap();
    scripted.join().unwrap();

    assert_eq!(supervisor.child_pid(), Some(4242));
}

#[test]
fn pid_report_alone_terminates_the_loop() {
    let (parent, mut child) = UnixStream::pair().unwrap();
    let scripted = std::thread::spawn(move || {
        send_tag(&mut child, SyncMsg::PidRequest);
        child.write_all(&7u32.to_ne_bytes()).unwrap();
        expect_tag(&mut child, SyncMsg::PidAck);
    });

    let config = inert_config();
    let mut supervisor = BootstrapSupervisor::new(&config, 0);
    let mut socket = SyncSocket::from(parent);
    run_sync(&mut socket, &mut supervisor).unwrap();
    scripted.join().unwrap();

    assert_eq!(supervisor.child_pid(), Some(7));
}

#[test]
fn early_close_fails_without_storing_a_pid() {
    let (parent, child) = UnixStream::pair().unwrap();
    drop(child);

    let config = inert_config();
    let mut supervisor = BootstrapSupervisor::new(&config, 0);
    let mut socket = SyncSocket::from(parent);
    assert!(run_sync(&mut socket, &mut supervisor).is_err());
    assert_eq!(supervisor.child_pid(), None);
}

#[test]
fn close_after_request_fails_without_storing_a_pid() {
    let (parent, mut child) = UnixStream::pair().unwrap();
    let scripted = std::thread::spawn(move || {
        send_tag(&mut child, SyncMsg::UsermapRequest);
        expect_tag(&mut child, SyncMsg::UsermapAck);
        // Wedge-and-die before ever reporting the pid.
        drop(child);
    });

    let config = inert_config();
    let mut supervisor = BootstrapSupervisor::new(&config, 0);
    let mut socket = SyncSocket::from(parent);
    assert!(run_sync(&mut socket, &mut supervisor).is_err());
    scripted.join().unwrap();

    assert_eq!(supervisor.child_pid(), None);
}

#[test]
fn unknown_tag_aborts_the_handshake() {
    let (parent, mut child) = UnixStream::pair().unwrap();
    child.write_all(&0x99u32.to_ne_bytes()).unwrap();

    let config = inert_config();
    let mut supervisor = BootstrapSupervisor::new(&config, 0);
    let mut socket = SyncSocket::from(parent);
    assert!(run_sync(&mut socket, &mut supervisor).is_err());
}

#[test]
fn acknowledge_from_child_is_a_protocol_violation() {
    let (parent, mut child) = UnixStream::pair().unwrap();
    send_tag(&mut child, SyncMsg::UsermapAck);

    let config = inert_config();
    let mut supervisor = BootstrapSupervisor::new(&config, 0);
    let mut socket = SyncSocket::from(parent);
    assert!(run_sync(&mut socket, &mut supervisor).is_err());
    assert_eq!(supervisor.child_pid(), None);
}

#[test]
fn truncated_pid_payload_is_fatal() {
    let (parent, mut child) = UnixStream::pair().unwrap();
    send_tag(&mut child, SyncMsg::PidRequest);
    child.write_all(&[0x01, 0x02]).unwrap();
    drop(child);

    let config = inert_config();
    let mut supervisor = BootstrapSupervisor::new(&config, 0);
    let mut socket = SyncSocket::from(parent);
    assert!(run_sync(&mut socket, &mut supervisor).is_err());
    assert_eq!(supervisor.child_pid(), None);
}
