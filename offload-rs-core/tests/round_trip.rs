use offload_rs_core::arp::SystemClock;
use offload_rs_core::codec::UdpTransmitter;
use offload_rs_core::config::CoreConfig;
use offload_rs_core::sim::{CoreHarness, Sent, SimPeer};
use offload_rs_core::transport::encode_frame;
use offload_rs_core::types::{HostFrame, RxSymbol};
use offload_rs_packets::{ArpOp, EthernetFrame, MacAddr};
use offload_rs_runtime::processor::Processor;
use rand::{thread_rng, Rng};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Retries slow enough that a prompt reply always beats the first one.
fn config() -> CoreConfig {
    CoreConfig::default().arp_retries(Duration::from_secs(5), 2)
}

fn start(config: &CoreConfig) -> (CoreHarness, SimPeer) {
    let harness = CoreHarness::start(config.clone(), Arc::new(SystemClock)).unwrap();
    (harness, SimPeer::facing(config))
}

fn random_payload(len: usize) -> Vec<u8> {
    (0..len).map(|_| thread_rng().gen()).collect()
}

/// A datagram from the peer, before it is put on the wire, so tests can damage it.
fn peer_frame(config: &CoreConfig, payload: &[u8]) -> EthernetFrame {
    let peer = CoreConfig::default()
        .local_mac(config.dest_mac)
        .local_ip(config.dest_ip)
        .dest_ip(config.local_ip);
    let mut frame = UdpTransmitter::new(&peer)
        .process(HostFrame {
            payload: payload.to_vec(),
            ok: true,
        })
        .unwrap()
        .frame;
    frame.set_dest_mac(config.local_mac);
    frame
}

fn symbols(frame: &[u8]) -> Vec<RxSymbol> {
    encode_frame(frame).into_iter().map(RxSymbol::from).collect()
}

fn assert_request(sent: &Sent, config: &CoreConfig) {
    assert_eq!(
        *sent,
        Sent::Arp {
            op: ArpOp::Request,
            dest_mac: MacAddr::BROADCAST,
            sender_mac: config.local_mac,
            sender_ip: config.local_ip,
            target_mac: MacAddr::ZERO,
            target_ip: config.dest_ip,
        }
    );
}

fn assert_echo(sent: &Sent, config: &CoreConfig, payload: &[u8]) {
    match sent {
        Sent::Datagram {
            dest_mac,
            src_mac,
            src_ip,
            dest_ip,
            checksums_ok,
            payload: received,
            ..
        } => {
            assert_eq!(*dest_mac, config.dest_mac);
            assert_eq!(*src_mac, config.local_mac);
            assert_eq!(*src_ip, config.local_ip);
            assert_eq!(*dest_ip, config.dest_ip);
            assert!(checksums_ok);
            assert_eq!(&received[..], payload);
        }
        other => panic!("expected a datagram, got {:?}", other),
    }
}

fn echo(len: usize) {
    let config = config();
    assert_eq!(config.dest_ip, Ipv4Addr::new(192, 168, 1, 100));
    let (harness, mut peer) = start(&config);
    let payload = random_payload(len);

    harness.send_lane(0, peer.datagram(&payload)).unwrap();
    let delivered = harness.recv_host(TIMEOUT).unwrap();
    assert_eq!(
        delivered,
        HostFrame {
            payload: payload.clone(),
            ok: true
        }
    );

    harness.send_host(&delivered.payload, false).unwrap();
    let sent = harness.recv_sent(0, &mut peer, TIMEOUT).unwrap();
    assert_eq!(sent.len(), 1);
    assert_request(&sent[0], &config);

    harness.send_lane(0, peer.arp_reply()).unwrap();
    let sent = harness.recv_sent(0, &mut peer, TIMEOUT).unwrap();
    assert_eq!(sent.len(), 1);
    assert_echo(&sent[0], &config, &payload);

    let (host, lanes) = harness.finish().unwrap();
    assert!(host.is_empty());
    assert!(lanes.iter().all(|words| words.is_empty()));
}

#[test]
fn echoes_256_bytes() {
    echo(256);
}

#[test]
fn echoes_1024_bytes() {
    echo(1024);
}

#[test]
fn damaged_checksums_clear_the_flag() {
    let config = config();
    let (harness, _) = start(&config);

    let mut bad_udp = peer_frame(&config, &[0x11; 300]);
    bad_udp.data[14 + 20 + 6] ^= 0x01;
    harness.send_lane(2, symbols(&bad_udp.data)).unwrap();
    assert_eq!(
        harness.recv_host(TIMEOUT).unwrap(),
        HostFrame {
            payload: vec![0x11; 300],
            ok: false
        }
    );

    let mut bad_ip = peer_frame(&config, &[0x22; 300]);
    bad_ip.data[14 + 10] ^= 0x80;
    harness.send_lane(2, symbols(&bad_ip.data)).unwrap();
    assert_eq!(
        harness.recv_host(TIMEOUT).unwrap(),
        HostFrame {
            payload: vec![0x22; 300],
            ok: false
        }
    );

    harness.finish().unwrap();
}

#[test]
fn bad_fcs_is_flagged_not_dropped() {
    let config = config();
    let (harness, mut peer) = start(&config);

    let mut words = peer.datagram(&[0x33; 200]);
    if let RxSymbol::Word(word) = &mut words[10] {
        word.data[3] ^= 0x04;
    }
    harness.send_lane(1, words).unwrap();
    let delivered = harness.recv_host(TIMEOUT).unwrap();
    assert!(!delivered.ok);
    assert_eq!(delivered.payload.len(), 200);

    harness.finish().unwrap();
}

#[test]
fn every_lane_delivers() {
    let config = config();
    let (harness, mut peer) = start(&config);

    for lane in 0..config.num_lanes {
        harness
            .send_lane(lane, peer.datagram(&[lane as u8; 100]))
            .unwrap();
    }
    let mut tags: Vec<u8> = (0..config.num_lanes)
        .map(|_| {
            let delivered = harness.recv_host(TIMEOUT).unwrap();
            assert!(delivered.ok);
            assert!(delivered.payload.iter().all(|b| *b == delivered.payload[0]));
            delivered.payload[0]
        })
        .collect();
    tags.sort();
    assert_eq!(tags, (0..config.num_lanes as u8).collect::<Vec<u8>>());

    harness.finish().unwrap();
}

#[test]
fn second_reply_changes_nothing() {
    let config = config();
    let (harness, mut peer) = start(&config);

    harness.send_host(b"first", false).unwrap();
    let sent = harness.recv_sent(0, &mut peer, TIMEOUT).unwrap();
    assert_request(&sent[0], &config);
    harness.send_lane(0, peer.arp_reply()).unwrap();
    let sent = harness.recv_sent(0, &mut peer, TIMEOUT).unwrap();
    assert_echo(&sent[0], &config, b"first");

    harness.send_lane(0, peer.arp_reply()).unwrap();
    assert!(harness.lane_quiet(0, Duration::from_millis(300)));

    // Still resolved: the next payload goes straight out.
    harness.send_host(b"second", false).unwrap();
    let sent = harness.recv_sent(0, &mut peer, TIMEOUT).unwrap();
    assert_eq!(sent.len(), 1);
    assert_echo(&sent[0], &config, b"second");

    harness.finish().unwrap();
}

#[test]
fn unanswered_request_times_out() {
    let config = config().arp_retries(Duration::from_millis(100), 2);
    let (harness, mut peer) = start(&config);

    harness.send_host(b"never sent", false).unwrap();
    for _ in 0..3 {
        let sent = harness.recv_sent(0, &mut peer, TIMEOUT).unwrap();
        assert_eq!(sent.len(), 1);
        assert_request(&sent[0], &config);
    }
    assert!(harness.lane_quiet(0, Duration::from_millis(500)));

    // A late reply is unsolicited and releases nothing.
    harness.send_lane(0, peer.arp_reply()).unwrap();
    assert!(harness.lane_quiet(0, Duration::from_millis(200)));

    // The address was forgotten, so the next payload asks again.
    harness.send_host(b"try again", false).unwrap();
    let sent = harness.recv_sent(0, &mut peer, TIMEOUT).unwrap();
    assert_request(&sent[0], &config);
    harness.send_lane(0, peer.arp_reply()).unwrap();
    let sent = harness.recv_sent(0, &mut peer, TIMEOUT).unwrap();
    assert_echo(&sent[0], &config, b"try again");

    harness.finish().unwrap();
}

#[test]
fn answers_requests_for_local_address() {
    let config = config();
    let (harness, mut peer) = start(&config);

    harness.send_lane(4, peer.arp_request()).unwrap();
    let sent = harness.recv_sent(0, &mut peer, TIMEOUT).unwrap();
    assert_eq!(
        sent,
        vec![Sent::Arp {
            op: ArpOp::Reply,
            dest_mac: config.dest_mac,
            sender_mac: config.local_mac,
            sender_ip: config.local_ip,
            target_mac: config.dest_mac,
            target_ip: config.dest_ip,
        }]
    );
    assert!(harness.host_idle(Duration::from_millis(100)));
    // The gap after the reply is idle words only.
    assert!(harness.lane_quiet(0, Duration::from_millis(100)));

    let (host, lanes) = harness.finish().unwrap();
    assert!(host.is_empty());
    assert!(lanes.iter().all(|words| words.is_empty()));
}

#[test]
fn aborted_host_frame_is_not_sent() {
    let config = config();
    let (harness, mut peer) = start(&config);

    harness.send_host(b"aborted", true).unwrap();
    harness.send_host(b"kept", false).unwrap();
    let sent = harness.recv_sent(0, &mut peer, TIMEOUT).unwrap();
    assert_request(&sent[0], &config);
    harness.send_lane(0, peer.arp_reply()).unwrap();
    let sent = harness.recv_sent(0, &mut peer, TIMEOUT).unwrap();
    assert_eq!(sent.len(), 1);
    assert_echo(&sent[0], &config, b"kept");

    harness.finish().unwrap();
}
