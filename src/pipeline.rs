//! The per-packet pipeline: capture, parse, scan, frame, inject. One
//! blocking loop over the input handle; the matcher is read-only throughout.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use dpi_matcher::{MatchReport, TableMachine, MAX_REPORTS};
use pcap::{Activated, Capture};

use crate::{frame, packet};

pub struct Pipeline<T: Activated> {
    machine: TableMachine,
    input: Capture<T>,
    output: Capture<T>,
    link_header_len: usize,
    shutdown: Arc<AtomicBool>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineStats {
    pub packets: u64,
    pub payload_bytes: u64,
}

impl<T: Activated> Pipeline<T> {
    pub fn new(
        machine: TableMachine,
        input: Capture<T>,
        output: Capture<T>,
        link_header_len: usize,
        shutdown: Arc<AtomicBool>,
    ) -> Pipeline<T> {
        Pipeline {
            machine,
            input,
            output,
            link_header_len,
            shutdown,
        }
    }

    /// Runs the capture loop until the shutdown flag is raised or the input
    /// handle fails. Injection failures drop the frame and keep going; a
    /// capture failure stops the loop and is fatal. Stats are reported on
    /// every exit path.
    pub fn run(self) -> Result<PipelineStats> {
        let Pipeline {
            machine,
            mut input,
            mut output,
            link_header_len,
            shutdown,
        } = self;

        let mut reports: Vec<MatchReport> = Vec::new();
        let mut out_buf: Vec<u8> = Vec::new();
        let mut stats = PipelineStats::default();
        let started = Instant::now();

        tracing::info!("sniffer is running");
        let result = loop {
            if shutdown.load(Ordering::Relaxed) {
                break Ok(());
            }
            let data = match input.next_packet() {
                Ok(captured) => captured.data,
                Err(pcap::Error::TimeoutExpired) => continue,
                Err(e) => break Err(e),
            };
            stats.packets += 1;

            let payload: &[u8] = match packet::parse(data, link_header_len) {
                Ok(parsed) => {
                    tracing::trace!(
                        src = %parsed.ip_src,
                        dst = %parsed.ip_dst,
                        id = parsed.ip_id,
                        tos = parsed.ip_tos,
                        ttl = parsed.ip_ttl,
                        proto = parsed.ip_proto,
                        transport = ?parsed.transport,
                        payload_len = parsed.payload_len(),
                        "captured packet"
                    );
                    parsed.payload
                }
                // Unparsable frames are forwarded untouched.
                Err(_) => &[],
            };

            reports.clear();
            if !payload.is_empty() {
                machine.scan(0, payload, &mut reports, MAX_REPORTS);
                if !reports.is_empty() {
                    tracing::debug!(matches = reports.len(), "payload matched");
                }
            }
            stats.payload_bytes += payload.len() as u64;

            frame::build_result_frame(&machine, data, payload, &reports, &mut out_buf);
            if let Err(e) = output.sendpacket(out_buf.as_slice()) {
                tracing::warn!("failed to inject frame: {}", e);
            }
        };

        report_stats(&stats, started.elapsed());
        match result {
            Ok(()) => Ok(stats),
            Err(e) => Err(e).context("error while sniffing"),
        }
    }
}

fn report_stats(stats: &PipelineStats, elapsed: Duration) {
    let secs = elapsed.as_secs_f64().max(f64::EPSILON);
    let mbps = stats.payload_bytes as f64 * 8.0 / secs / 1_000_000.0;
    tracing::info!(
        packets = stats.packets,
        payload_bytes = stats.payload_bytes,
        elapsed_secs = secs,
        throughput_mbps = mbps,
        "sniffer stopped"
    );
}
