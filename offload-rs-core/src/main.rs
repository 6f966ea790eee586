mod subscriber;

use clap::{value_t, App, Arg};
use offload_rs_core::arp::SystemClock;
use offload_rs_core::config::CoreConfig;
use offload_rs_core::sim::{CoreHarness, Sent, SimPeer};
use offload_rs_packets::{ArpOp, MacAddr};
use std::net::Ipv4Addr;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};
use subscriber::PrintSubscriber;
use tracing::Level;

fn main() {
    let matches = App::new("offload-sim")
        .version("0.1")
        .author("Offload-rs Contributors")
        .about("Runs the UDP offload core against a simulated peer that echoes one datagram")
        .arg(address_arg("local-mac", "MAC", "Core MAC address"))
        .arg(address_arg("local-ip", "IP", "Core IPv4 address"))
        .arg(address_arg("gateway-ip", "IP", "Default gateway"))
        .arg(address_arg("subnet-mask", "MASK", "Local subnet mask"))
        .arg(address_arg("dest-mac", "MAC", "Peer MAC address"))
        .arg(address_arg("dest-ip", "IP", "Peer IPv4 address"))
        .arg(
            Arg::with_name("lanes")
                .long("lanes")
                .value_name("N")
                .help("Number of lanes, 1 to 8")
                .takes_value(true)
                .default_value("8"),
        )
        .arg(
            Arg::with_name("payload-len")
                .long("payload-len")
                .value_name("BYTES")
                .help("Size of the datagram the peer sends")
                .takes_value(true)
                .default_value("256"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("Log more, repeat for trace output"),
        )
        .get_matches();

    let level = match matches.occurrences_of("verbose") {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing::subscriber::set_global_default(PrintSubscriber::new(level))
        .expect("setting tracing default failed");

    let mut config = CoreConfig::default();
    if matches.is_present("local-mac") {
        let mac = value_t!(matches, "local-mac", MacAddr).unwrap_or_else(|e| e.exit());
        config = config.local_mac(mac);
    }
    if matches.is_present("dest-mac") {
        let mac = value_t!(matches, "dest-mac", MacAddr).unwrap_or_else(|e| e.exit());
        config = config.dest_mac(mac);
    }
    let addresses: [(&str, fn(CoreConfig, Ipv4Addr) -> CoreConfig); 4] = [
        ("local-ip", CoreConfig::local_ip),
        ("gateway-ip", CoreConfig::gateway_ip),
        ("subnet-mask", CoreConfig::subnet_mask),
        ("dest-ip", CoreConfig::dest_ip),
    ];
    for &(name, set) in addresses.iter() {
        if matches.is_present(name) {
            let ip = value_t!(matches, name, Ipv4Addr).unwrap_or_else(|e| e.exit());
            config = set(config, ip);
        }
    }
    config = config.num_lanes(value_t!(matches, "lanes", usize).unwrap_or_else(|e| e.exit()));
    let payload_len = value_t!(matches, "payload-len", usize).unwrap_or_else(|e| e.exit());

    match simulate(config, payload_len) {
        Ok(()) => println!("Echo complete"),
        Err(reason) => {
            eprintln!("Echo failed: {}", reason);
            process::exit(1);
        }
    }
}

fn address_arg<'a, 'b>(name: &'a str, value_name: &'b str, help: &'b str) -> Arg<'a, 'b> {
    Arg::with_name(name)
        .long(name)
        .value_name(value_name)
        .help(help)
        .takes_value(true)
}

/// The peer sends one datagram; whatever the host receives it sends straight back.
fn simulate(config: CoreConfig, payload_len: usize) -> Result<(), String> {
    let deadline = Instant::now() + config.arp_window() + Duration::from_secs(2);
    let tx_lane = config.tx_lane;
    let mut peer = SimPeer::facing(&config);
    let harness = CoreHarness::start(config, Arc::new(SystemClock))
        .map_err(|err| format!("invalid configuration: {}", err))?;

    let payload: Vec<u8> = (0..payload_len).map(|i| i as u8).collect();
    harness
        .send_lane(0, peer.datagram(&payload))
        .map_err(|err| format!("lane closed: {}", err))?;
    println!("Peer sent {} bytes", payload.len());

    let received = harness
        .recv_host(remaining(deadline))
        .map_err(|err| format!("nothing delivered to the host: {}", err))?;
    println!(
        "Host received {} bytes, ok: {}",
        received.payload.len(),
        received.ok
    );
    harness
        .send_host(&received.payload, false)
        .map_err(|err| format!("host stream closed: {}", err))?;

    let echoed = loop {
        let sent = harness
            .recv_sent(tx_lane, &mut peer, remaining(deadline))
            .map_err(|err| format!("no echo: {}", err))?;
        let mut echoed = None;
        for frame in sent {
            match frame {
                Sent::Arp {
                    op: ArpOp::Request,
                    target_ip,
                    ..
                } if target_ip == peer.ip() => {
                    println!("Peer answering ARP request for {}", target_ip);
                    harness
                        .send_lane(0, peer.arp_reply())
                        .map_err(|err| format!("lane closed: {}", err))?;
                }
                Sent::Datagram {
                    dest_mac,
                    checksums_ok,
                    payload,
                    ..
                } => {
                    println!(
                        "Peer received {} bytes at {}, checksums ok: {}",
                        payload.len(),
                        dest_mac,
                        checksums_ok
                    );
                    echoed = Some(payload);
                }
                other => println!("Peer ignored {:?}", other),
            }
        }
        if let Some(echoed) = echoed {
            break echoed;
        }
    };

    harness.finish().map_err(|_| "core panicked".to_string())?;
    if echoed == payload {
        Ok(())
    } else {
        Err("echoed payload differs from the original".into())
    }
}

fn remaining(deadline: Instant) -> Duration {
    let now = Instant::now();
    if now >= deadline {
        Duration::from_millis(0)
    } else {
        deadline - now
    }
}
