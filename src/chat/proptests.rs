//! Property-based tests for stream decoding
//!
//! Whatever way the transport slices the body, the accumulated text is the
//! ordered concatenation of the delta fragments, and undecodable or
//! irrelevant lines never disturb it.

use super::testing::delta_line;
use super::types::StreamEvent;
use super::{StreamHandle, Termination};
use proptest::prelude::*;

/// Fragments mixing ASCII, Devanagari and the odd empty delta
fn arb_fragment() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => "[a-zA-Z0-9 .,!?]{0,12}",
        3 => "[\u{0900}-\u{097F} ]{0,8}",
        1 => Just(String::new()),
        1 => Just("\"quoted\" \\ back\nslash".to_string()),
    ]
}

/// Lines that must not contribute any text
fn arb_noise() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just(": keep-alive".to_string()),
        Just("event: message".to_string()),
        "[a-z]{1,10}: [a-z ]{0,10}",
    ]
}

/// Split `body` into chunks at the given byte offsets
fn chunked(body: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut offsets: Vec<usize> = cuts.iter().map(|c| c % (body.len() + 1)).collect();
    offsets.sort_unstable();
    offsets.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for offset in offsets {
        chunks.push(body[start..offset].to_vec());
        start = offset;
    }
    chunks.push(body[start..].to_vec());
    chunks
}

fn run(chunks: Vec<Vec<u8>>) -> (Vec<StreamEvent>, StreamHandle) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let mut handle = StreamHandle::from_chunks(chunks);
    let events = runtime.block_on(async {
        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await.unwrap() {
            events.push(event);
        }
        events
    });
    (events, handle)
}

proptest! {
    #[test]
    fn accumulates_exact_concatenation(
        fragments in proptest::collection::vec(arb_fragment(), 0..20),
        cuts in proptest::collection::vec(any::<usize>(), 0..12),
    ) {
        let mut body = String::new();
        for fragment in &fragments {
            body.push_str(&delta_line(fragment));
        }
        body.push_str("data: [DONE]\n");

        let (events, handle) = run(chunked(body.as_bytes(), &cuts));

        prop_assert_eq!(handle.finalize(), fragments.concat());
        prop_assert_eq!(events.len(), fragments.len() + 1);
        prop_assert_eq!(events.last(), Some(&StreamEvent::Done));
        prop_assert_eq!(handle.termination(), Some(Termination::Done));
    }

    #[test]
    fn noise_and_malformed_lines_leave_text_intact(
        items in proptest::collection::vec(
            prop_oneof![
                3 => arb_fragment().prop_map(Ok),
                1 => arb_noise().prop_map(Err),
                1 => Just(Err("data: {not json".to_string())),
            ],
            0..20,
        ),
        cuts in proptest::collection::vec(any::<usize>(), 0..8),
    ) {
        let mut body = String::new();
        let mut expected = String::new();
        let mut malformed = 0;
        for item in &items {
            match item {
                Ok(fragment) => {
                    body.push_str(&delta_line(fragment));
                    expected.push_str(fragment);
                }
                Err(line) => {
                    if line.starts_with("data: ") {
                        malformed += 1;
                    }
                    body.push_str(line);
                    body.push('\n');
                }
            }
        }

        let (events, handle) = run(chunked(body.as_bytes(), &cuts));

        prop_assert_eq!(handle.finalize(), expected);
        prop_assert_eq!(handle.malformed_count(), malformed);
        prop_assert_eq!(handle.termination(), Some(Termination::Closed));
        let deltas = events.iter().filter(|e| e.as_fragment().is_some()).count();
        prop_assert_eq!(deltas, items.iter().filter(|i| i.is_ok()).count());
    }
}
