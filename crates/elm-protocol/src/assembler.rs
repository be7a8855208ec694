//! ELM327 Reply Reassembly
//!
//! The adapter's text replies reach us in whatever chunks the transport
//! happens to deliver. There is no length prefix and no reliable terminator,
//! so frame boundaries are found heuristically: a leading `>` prompt opens a
//! frame, and a handful of known trailing tokens close it.

use serde::{Deserialize, Serialize};

/// Prompt character that opens a new frame
const FRAME_START: char = '>';

/// Character offset of the body in a frame-start fragment
const START_BODY_OFFSET: usize = 11;

/// End (exclusive) of the identifier window in a frame-start fragment
const ID_END_OFFSET: usize = 19;

/// Character offset of the payload in a continuation fragment
const CONTINUATION_OFFSET: usize = 10;

/// Offset used when the requested one runs past the fragment
const FALLBACK_OFFSET: usize = 1;

/// Trailer some adapters append to the end of a response
const SENTINEL_TRAILER: &str = "0000555555";

/// Acknowledgement token for AT commands
const ACK_TOKEN: &str = "OK";

/// Adapter identification banner
const BANNER_TOKEN: &str = "ELM327";

/// A complete adapter reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reply {
    /// Header identifier captured when the frame started
    pub id: String,
    /// Text accumulated over the frame's fragments
    pub body: String,
}

/// Reassembles adapter replies from transport fragments
///
/// One assembler belongs to one connection. It keeps no timers and no
/// randomness, so the same fragment sequence always yields the same replies.
#[derive(Debug, Clone, Default)]
pub struct FrameAssembler {
    id: String,
    body: String,
    completed: u64,
}

impl FrameAssembler {
    /// Create an assembler with an empty frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment, returning the reply if it completes the frame
    ///
    /// Short fragments never fail: an out-of-range offset falls back to
    /// offset 1, and an out-of-range identifier window falls back to the
    /// whole fragment.
    pub fn on_fragment(&mut self, fragment: &str) -> Option<Reply> {
        if fragment.is_empty() {
            return None;
        }

        if fragment.starts_with(FRAME_START) {
            self.body = substring_from(fragment, START_BODY_OFFSET).to_string();
            self.id = substring_range(fragment, START_BODY_OFFSET, ID_END_OFFSET).to_string();
        } else {
            self.body.push_str(substring_from(fragment, CONTINUATION_OFFSET));
        }

        if !is_completion(fragment) {
            return None;
        }

        self.completed += 1;
        Some(Reply {
            id: self.id.clone(),
            body: self.body.clone(),
        })
    }

    /// Identifier of the frame being accumulated
    pub fn current_id(&self) -> &str {
        &self.id
    }

    /// Body accumulated since the last frame start
    pub fn current_body(&self) -> &str {
        &self.body
    }

    /// Number of replies emitted so far
    pub fn completed(&self) -> u64 {
        self.completed
    }
}

/// Check whether a raw fragment closes the current frame
///
/// Evaluated per fragment, not against the accumulated body: a token split
/// across two fragments is not recognised.
pub fn is_completion(fragment: &str) -> bool {
    fragment.contains(SENTINEL_TRAILER)
        || fragment.contains(ACK_TOKEN)
        || fragment.contains(BANNER_TOKEN)
        || is_voltage_readout(fragment)
}

/// Match a whole fragment of the form `>12.3V`
fn is_voltage_readout(fragment: &str) -> bool {
    let Some(reading) = fragment
        .strip_prefix(FRAME_START)
        .and_then(|rest| rest.strip_suffix('V'))
    else {
        return false;
    };
    let Some((whole, tenths)) = reading.split_once('.') else {
        return false;
    };

    !whole.is_empty()
        && whole.bytes().all(|b| b.is_ascii_digit())
        && tenths.len() == 1
        && tenths.bytes().all(|b| b.is_ascii_digit())
}

/// Byte index of the `n`th character boundary, if the string has one
///
/// The end of the string counts as a boundary, so `n == char count` is valid.
fn char_boundary(s: &str, n: usize) -> Option<usize> {
    s.char_indices()
        .map(|(idx, _)| idx)
        .chain(std::iter::once(s.len()))
        .nth(n)
}

/// Text from character `begin` on, or from character 1 if `begin` is past the end
fn substring_from(fragment: &str, begin: usize) -> &str {
    char_boundary(fragment, begin)
        .or_else(|| char_boundary(fragment, FALLBACK_OFFSET))
        .map_or("", |start| &fragment[start..])
}

/// Characters `[begin, end)`, or the whole fragment if the range does not fit
fn substring_range(fragment: &str, begin: usize, end: usize) -> &str {
    match (char_boundary(fragment, begin), char_boundary(fragment, end)) {
        (Some(start), Some(stop)) if start <= stop => &fragment[start..stop],
        _ => fragment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feed(assembler: &mut FrameAssembler, fragments: &[&str]) -> Vec<Reply> {
        fragments
            .iter()
            .filter_map(|f| assembler.on_fragment(f))
            .collect()
    }

    #[test]
    fn test_multi_fragment_frame() {
        let mut assembler = FrameAssembler::new();
        // Ten-character closing fragment contributes nothing past offset 10
        let replies = feed(
            &mut assembler,
            &[">ABCDEFGHIJKLMNOPQR", "0123456789DATA", "        OK"],
        );

        assert_eq!(
            replies,
            vec![Reply {
                id: "KLMNOPQR".to_string(),
                body: "KLMNOPQRDATA".to_string(),
            }]
        );
    }

    #[test]
    fn test_short_closing_fragment_uses_fallback() {
        let mut assembler = FrameAssembler::new();
        let replies = feed(&mut assembler, &[">ABCDEFGHIJKLMNOPQR", "0123456789DATA", "OK"]);

        // "OK" is shorter than the continuation offset, so only the marker position is dropped
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].body, "KLMNOPQRDATAK");
    }

    #[test]
    fn test_voltage_readout_completes_alone() {
        let mut assembler = FrameAssembler::new();
        let reply = assembler.on_fragment(">12.3V").unwrap();

        // Too short for the identifier window and body offset
        assert_eq!(reply.id, ">12.3V");
        assert_eq!(reply.body, "12.3V");
    }

    #[test]
    fn test_voltage_pattern_is_strict() {
        assert!(is_completion(">0.0V"));
        assert!(is_completion(">123.4V"));
        assert!(!is_completion(">12.34V"));
        assert!(!is_completion(">.3V"));
        assert!(!is_completion("12.3V"));
        assert!(!is_completion(">12.3V "));
        assert!(!is_completion(">12,3V"));
    }

    #[test]
    fn test_banner_completes_anywhere() {
        let mut assembler = FrameAssembler::new();
        assert!(assembler.on_fragment(">ATZ").is_none());
        assert!(assembler.on_fragment("garbage ELM327 v1.5 garbage").is_some());
    }

    #[test]
    fn test_sentinel_trailer_completes() {
        let mut assembler = FrameAssembler::new();
        assert!(assembler.on_fragment(">22F40D  7EC 10 0B 62").is_none());
        let reply = assembler.on_fragment("7EC 21 F4 0000555555").unwrap();
        assert_eq!(reply.id, "C 10 0B ");
        assert_eq!(reply.body, "C 10 0B 620000555555");
    }

    #[test]
    fn test_frames_are_isolated() {
        let mut assembler = FrameAssembler::new();
        let replies = feed(
            &mut assembler,
            &[
                ">HEADERONE-ID000001",
                "0123456789first",
                "0123456789OK",
                ">HEADERTWO-ID000002",
                "0123456789second",
                "0123456789OK",
            ],
        );

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].id, "ID000001");
        assert_eq!(replies[0].body, "ID000001firstOK");
        assert_eq!(replies[1].id, "ID000002");
        assert_eq!(replies[1].body, "ID000002secondOK");
        assert_eq!(assembler.completed(), 2);
    }

    #[test]
    fn test_empty_fragment_is_noop() {
        let mut assembler = FrameAssembler::new();
        assembler.on_fragment(">ABCDEFGHIJKLMNOPQR");
        let before = (assembler.current_id().to_string(), assembler.current_body().to_string());

        assert!(assembler.on_fragment("").is_none());
        assert_eq!(assembler.current_id(), before.0);
        assert_eq!(assembler.current_body(), before.1);
    }

    #[test]
    fn test_fallback_offsets() {
        assert_eq!(substring_from(">AB", START_BODY_OFFSET), "AB");
        assert_eq!(substring_from("x", CONTINUATION_OFFSET), "");
        // Offset equal to the length is in range
        assert_eq!(substring_from("0123456789", CONTINUATION_OFFSET), "");
        assert_eq!(substring_range(">short", START_BODY_OFFSET, ID_END_OFFSET), ">short");
        assert_eq!(substring_range(">0123456789ABC", START_BODY_OFFSET, ID_END_OFFSET), ">0123456789ABC");
    }

    #[test]
    fn test_offsets_count_characters() {
        let mut assembler = FrameAssembler::new();
        assembler.on_fragment(">°°°°°°°°°°ÄBCDEFGHIJ");
        assert_eq!(assembler.current_id(), "ÄBCDEFGH");
        assert_eq!(assembler.current_body(), "ÄBCDEFGHIJ");

        // Multi-byte first character with a short fragment
        assembler.on_fragment("éa");
        assert_eq!(assembler.current_body(), "ÄBCDEFGHIJa");
    }

    #[test]
    fn test_continuation_without_start() {
        let mut assembler = FrameAssembler::new();
        let reply = assembler.on_fragment("0123456789OK").unwrap();
        assert_eq!(reply.id, "");
        assert_eq!(reply.body, "OK");
    }

    proptest! {
        #[test]
        fn prop_never_panics(fragments in proptest::collection::vec(".{0,40}", 0..20)) {
            let mut assembler = FrameAssembler::new();
            for fragment in &fragments {
                let _ = assembler.on_fragment(fragment);
            }
        }

        #[test]
        fn prop_replay_is_deterministic(fragments in proptest::collection::vec("[>0-9A-Z. ]{0,30}", 0..20)) {
            let mut first = FrameAssembler::new();
            let mut second = FrameAssembler::new();
            let a: Vec<_> = fragments.iter().filter_map(|f| first.on_fragment(f)).collect();
            let b: Vec<_> = fragments.iter().filter_map(|f| second.on_fragment(f)).collect();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_short_start_falls_back(tail in "[A-Z0-9]{0,9}") {
            let fragment = format!(">{tail}");
            let mut assembler = FrameAssembler::new();
            assembler.on_fragment(&fragment);
            prop_assert_eq!(assembler.current_body(), tail.as_str());
            prop_assert_eq!(assembler.current_id(), fragment.as_str());
        }
    }
}
