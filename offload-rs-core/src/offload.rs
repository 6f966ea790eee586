use crate::arbiter::{PortDemux, PortMux};
use crate::arp::{ArpLink, Clock, Resolver, SystemClock};
use crate::codec::{ByEtherType, FrameKind, UdpReceiver, UdpTransmitter};
use crate::config::{ConfigError, CoreConfig};
use crate::fifo::ElasticBuffer;
use crate::host::{host_rx_stream, HostTxAssembler};
use crate::transport::{XgmiiReceiver, XgmiiTransmitter};
use crate::types::{RxFrame, RxSymbol, StreamUnit, XgmiiWord};
use futures::prelude::*;
use offload_rs_runtime::link::primitive::{ClassifyLink, ProcessLink};
use offload_rs_runtime::link::{LinkBuilder, PacketStream, ProcessLinkBuilder, TokioRunnable};
use std::sync::Arc;
use tracing::info;

/// Everything a built core hands back. The runnables must be spawned; every stream must be
/// either drained or dropped, since a held but idle stream backpressures the core.
pub struct CorePorts {
    pub runnables: Vec<TokioRunnable>,
    /// Transmit words, one stream per lane.
    pub lane_tx: Vec<PacketStream<XgmiiWord>>,
    pub host_rx: PacketStream<StreamUnit>,
}

/// Assembles the whole offload pipeline:
///
/// ```text
/// lane rx ─ XgmiiReceiver ─┐                       ┌─ ipv4 ─ UdpReceiver ─ host rx
/// lane rx ─ XgmiiReceiver ─┼─ PortMux ─ ByEtherType ┤
///                          ┘                       └─ arp ──┐
/// host tx ─ HostTxAssembler ─ UdpTransmitter ─────── ArpLink ─ PortDemux ─┬─ XgmiiTransmitter ─ lane tx
///                                                                        └─ XgmiiTransmitter ─ lane tx
/// ```
pub struct OffloadCore {
    config: Option<CoreConfig>,
    lanes: Option<Vec<PacketStream<RxSymbol>>>,
    host_tx: Option<PacketStream<StreamUnit>>,
    clock: Arc<dyn Clock>,
}

impl Default for OffloadCore {
    fn default() -> Self {
        OffloadCore::new()
    }
}

impl OffloadCore {
    pub fn new() -> Self {
        OffloadCore {
            config: None,
            lanes: None,
            host_tx: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn config(self, config: CoreConfig) -> Self {
        OffloadCore {
            config: Some(config),
            ..self
        }
    }

    /// Receive symbols, one stream per configured lane.
    pub fn lanes(self, lanes: Vec<PacketStream<RxSymbol>>) -> Self {
        OffloadCore {
            lanes: Some(lanes),
            ..self
        }
    }

    pub fn host_tx(self, host_tx: PacketStream<StreamUnit>) -> Self {
        OffloadCore {
            host_tx: Some(host_tx),
            ..self
        }
    }

    /// Time source for ARP retries and timeouts.
    pub fn clock(self, clock: Arc<dyn Clock>) -> Self {
        OffloadCore { clock, ..self }
    }

    /// Fails on a bad configuration. Panics when an input is missing or the lane count does
    /// not match the configuration.
    pub fn build(self) -> Result<CorePorts, ConfigError> {
        let (config, lanes, host_tx) = match (self.config, self.lanes, self.host_tx) {
            (None, _, _) => panic!("Cannot build core! Missing config"),
            (_, None, _) => panic!("Cannot build core! Missing lanes"),
            (_, _, None) => panic!("Cannot build core! Missing host tx stream"),
            (Some(config), Some(lanes), Some(host_tx)) => (config, lanes, host_tx),
        };
        config.validate()?;
        assert_eq!(
            lanes.len(),
            config.num_lanes,
            "Core configured for {} lanes, given {}",
            config.num_lanes,
            lanes.len()
        );

        let depth = config.fifo_depth;
        let mut runnables: Vec<TokioRunnable> = Vec::new();

        // Receive: each lane decodes on the writer task of its own elastic buffer.
        let mut lane_frames = Vec::with_capacity(lanes.len());
        for (lane, symbols) in lanes.into_iter().enumerate() {
            let (_, mut decoded) = ProcessLink::new()
                .ingressor(symbols)
                .processor(XgmiiReceiver::new(lane))
                .build_link();
            let (mut lane_runnables, mut buffered) = ElasticBuffer::new()
                .ingressor(flatten_frames(decoded.remove(0)))
                .depth(depth)
                .build_link();
            runnables.append(&mut lane_runnables);
            lane_frames.push(buffered.remove(0));
        }

        let (mut mux_runnables, mut merged) = PortMux::new()
            .ingressors(lane_frames)
            .depth(depth)
            .build_link();
        runnables.append(&mut mux_runnables);

        let (mut sort_runnables, mut sorted) = ClassifyLink::<ByEtherType>::new()
            .ingressor(merged.remove(0))
            .classifier(ByEtherType)
            .num_egressors(2)
            .dispatcher(Box::new(|kind| match kind {
                FrameKind::Ipv4 => Some(0),
                FrameKind::Arp => Some(1),
                FrameKind::Other => None,
            }))
            .queue_capacity(depth)
            .build_link();
        runnables.append(&mut sort_runnables);
        let arp_frames = sorted.remove(1);
        let ipv4_frames = sorted.remove(0);

        let (_, mut payloads) = ProcessLink::new()
            .ingressor(ipv4_frames)
            .processor(UdpReceiver::new(&config))
            .build_link();
        let (mut rx_runnables, mut delivered) = ElasticBuffer::new()
            .ingressor(payloads.remove(0))
            .depth(depth)
            .build_link();
        runnables.append(&mut rx_runnables);
        let host_rx = host_rx_stream(delivered.remove(0));

        // Transmit: host units are gathered on the host side of the buffer, then framed.
        let (_, mut assembled) = ProcessLink::new()
            .ingressor(host_tx)
            .processor(HostTxAssembler::new())
            .build_link();
        let (mut host_runnables, mut host_frames) = ElasticBuffer::new()
            .ingressor(assembled.remove(0))
            .depth(depth)
            .build_link();
        runnables.append(&mut host_runnables);

        let (_, mut datagrams) = ProcessLink::new()
            .ingressor(host_frames.remove(0))
            .processor(UdpTransmitter::new(&config))
            .build_link();

        let (_, mut addressed) = ArpLink::new()
            .ingressor(datagrams.remove(0))
            .arp_ingress(arp_frames)
            .resolver(Resolver::new(&config, self.clock))
            .build_link();

        let (mut demux_runnables, lane_frames) = PortDemux::new()
            .ingressor(addressed.remove(0))
            .num_lanes(config.num_lanes)
            .depth(depth)
            .build_link();
        runnables.append(&mut demux_runnables);

        let lane_tx = lane_frames
            .into_iter()
            .map(|frames| {
                let (_, mut words) = ProcessLink::new()
                    .ingressor(frames)
                    .processor(XgmiiTransmitter::new())
                    .build_link();
                flatten_words(words.remove(0))
            })
            .collect();

        info!(
            lanes = config.num_lanes,
            tx_lane = config.tx_lane,
            local_mac = %config.local_mac,
            local_ip = %config.local_ip,
            "offload core built"
        );
        Ok(CorePorts {
            runnables,
            lane_tx,
            host_rx,
        })
    }
}

fn flatten_words(frames: PacketStream<Vec<XgmiiWord>>) -> PacketStream<XgmiiWord> {
    Box::new(frames.flat_map(stream::iter))
}

fn flatten_frames(frames: PacketStream<Vec<RxFrame>>) -> PacketStream<RxFrame> {
    Box::new(frames.flat_map(stream::iter))
}
