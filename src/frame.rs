//! Result-frame assembly. Frames with no matches pass through verbatim;
//! otherwise the captured headers are followed by a big-endian report block
//! and the untouched L7 payload:
//!
//! ```text
//! [ captured bytes up to end of transport header ]
//! [ u16 magic 0xDEE4 ][ u16 report count ]
//! count * [ u32 rid ][ u32 start offset in payload ][ u32 reserved 0 ]
//! [ original L7 payload ]
//! ```

use bytes::BufMut;
use dpi_matcher::{MatchReport, TableMachine};

/// Magic tag opening the report block.
pub const MAGIC: u16 = 0xDEE4;

/// Bytes per report record: rid, start offset, reserved word.
pub const REPORT_RECORD_LEN: usize = 12;

/// Assembles the outgoing frame into `out` (cleared first).
///
/// `payload` must be the parsed L7 slice of `frame`. Each report contributes
/// the first rule of its accepting state; the start offset is the payload
/// offset of the match's first byte.
pub fn build_result_frame(
    machine: &TableMachine,
    frame: &[u8],
    payload: &[u8],
    reports: &[MatchReport],
    out: &mut Vec<u8>,
) {
    out.clear();
    if reports.is_empty() {
        out.extend_from_slice(frame);
        return;
    }

    let headers_len = frame.len() - payload.len();
    out.reserve(frame.len() + 4 + reports.len() * REPORT_RECORD_LEN);
    out.extend_from_slice(&frame[..headers_len]);

    let reported: Vec<(u32, u32)> = reports
        .iter()
        .filter_map(|report| {
            machine.rules_for(report.state).first().map(|rule| {
                let start = (report.position + 1).wrapping_sub(rule.len()) as u32;
                (rule.rid, start)
            })
        })
        .collect();

    out.put_u16(MAGIC);
    out.put_u16(reported.len() as u16);
    for (rid, start) in reported {
        out.put_u32(rid);
        out.put_u32(start);
        out.put_u32(0);
    }

    out.extend_from_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpi_matcher::{MatchRule, MAX_REPORTS, MIN_PATTERN_LENGTH};

    fn scan(machine: &TableMachine, payload: &[u8]) -> Vec<MatchReport> {
        let mut reports = Vec::new();
        machine.scan(0, payload, &mut reports, MAX_REPORTS);
        reports
    }

    fn frame_around(payload: &[u8]) -> Vec<u8> {
        // 14-byte link header + 20-byte IP + 20-byte TCP stand-in.
        let mut frame = vec![0xAAu8; 54];
        frame.extend_from_slice(payload);
        frame
    }

    #[test]
    fn no_matches_passes_the_frame_through() {
        let machine = TableMachine::from_rules(
            [MatchRule::new(b"ABCDEFGHIJKLMNOP".to_vec(), 7)],
            MIN_PATTERN_LENGTH,
        )
        .unwrap();
        let frame = frame_around(b"nothing to see");
        let mut out = Vec::new();
        build_result_frame(&machine, &frame, b"nothing to see", &[], &mut out);
        assert_eq!(out, frame);
    }

    #[test]
    fn single_match_emits_the_exact_report_block() {
        let machine = TableMachine::from_rules(
            [MatchRule::new(b"ABCDEFGHIJKLMNOP".to_vec(), 7)],
            MIN_PATTERN_LENGTH,
        )
        .unwrap();
        let payload = b"XABCDEFGHIJKLMNOPY";
        let frame = frame_around(payload);
        let reports = scan(&machine, payload);

        let mut out = Vec::new();
        build_result_frame(&machine, &frame, payload, &reports, &mut out);

        assert_eq!(&out[..54], &frame[..54]);
        assert_eq!(
            &out[54..70],
            &[
                0xDE, 0xE4, // magic
                0x00, 0x01, // one report
                0x00, 0x00, 0x00, 0x07, // rid 7
                0x00, 0x00, 0x00, 0x01, // match starts at payload offset 1
                0x00, 0x00, 0x00, 0x00, // reserved
            ]
        );
        assert_eq!(&out[70..], payload);
    }

    #[test]
    fn overlapping_matches_keep_scan_order() {
        let machine = TableMachine::from_rules(
            [
                MatchRule::new(b"ABCDEFGHIJKLMNOPQ".to_vec(), 1),
                MatchRule::new(b"HIJKLMNOPQRSTUVWX".to_vec(), 2),
            ],
            MIN_PATTERN_LENGTH,
        )
        .unwrap();
        let payload = b"ABCDEFGHIJKLMNOPQRSTUVWX";
        let frame = frame_around(payload);
        let reports = scan(&machine, payload);

        let mut out = Vec::new();
        build_result_frame(&machine, &frame, payload, &reports, &mut out);

        let block = &out[54..];
        assert_eq!(u16::from_be_bytes([block[0], block[1]]), MAGIC);
        assert_eq!(u16::from_be_bytes([block[2], block[3]]), 2);
        let first = &block[4..16];
        let second = &block[16..28];
        assert_eq!(first[..4], 1u32.to_be_bytes());
        assert_eq!(first[4..8], 0u32.to_be_bytes()); // starts at offset 0
        assert_eq!(second[..4], 2u32.to_be_bytes());
        assert_eq!(second[4..8], 7u32.to_be_bytes()); // starts at offset 7
    }

    #[test]
    fn annotated_frame_round_trips_back_to_the_payload() {
        let machine = TableMachine::from_rules(
            [MatchRule::new(b"ABCDEFGHIJKLMNOP".to_vec(), 7)],
            MIN_PATTERN_LENGTH,
        )
        .unwrap();
        let payload = b"ABCDEFGHIJKLMNOP trailing ABCDEFGHIJKLMNOP";
        let frame = frame_around(payload);
        let reports = scan(&machine, payload);
        assert!(reports.len() >= 2);

        let mut out = Vec::new();
        build_result_frame(&machine, &frame, payload, &reports, &mut out);

        // Decode: headers, magic, count, count records, then the payload.
        let headers_len = frame.len() - payload.len();
        let block = &out[headers_len..];
        assert_eq!(u16::from_be_bytes([block[0], block[1]]), MAGIC);
        let count = u16::from_be_bytes([block[2], block[3]]) as usize;
        assert_eq!(count, reports.len());
        let rest = &block[4 + count * REPORT_RECORD_LEN..];
        assert_eq!(rest, payload);
    }
}
