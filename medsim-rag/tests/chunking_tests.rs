//! Property tests for overlapping character-window chunking.

use medsim_rag::FixedSizeChunker;
use proptest::prelude::*;

/// Valid `(chunk_size, chunk_overlap)` pairs.
fn arb_params() -> impl Strategy<Value = (usize, usize)> {
    (1usize..64).prop_flat_map(|size| (Just(size), 0..size))
}

fn chars(s: &str) -> Vec<char> {
    s.chars().collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn unique_regions_reconstruct_the_text(
        text in "[a-zäöü é\n]{1,300}",
        (size, overlap) in arb_params(),
    ) {
        let chunks = FixedSizeChunker::new(size, overlap).unwrap().split(&text);
        prop_assert!(!chunks.is_empty());

        let mut rebuilt: String = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.chars().skip(overlap));
        }
        prop_assert_eq!(&rebuilt, &text);

        for chunk in &chunks[..chunks.len() - 1] {
            prop_assert_eq!(chunk.chars().count(), size);
        }
        prop_assert!(chunks[chunks.len() - 1].chars().count() <= size);
    }

    #[test]
    fn consecutive_chunks_share_exactly_the_overlap(
        text in "[a-z0-9 ]{1,300}",
        (size, overlap) in arb_params(),
    ) {
        let chunks = FixedSizeChunker::new(size, overlap).unwrap().split(&text);
        for pair in chunks.windows(2) {
            let (a, b) = (chars(&pair[0]), chars(&pair[1]));
            prop_assert_eq!(&a[a.len() - overlap..], &b[..overlap]);
        }
    }

    #[test]
    fn larger_windows_never_yield_more_chunks(
        text in "[a-z ]{0,300}",
        overlap in 0usize..16,
        size in 1usize..48,
        grow in 0usize..32,
    ) {
        let size = size + overlap;
        let fewer_or_equal = FixedSizeChunker::new(size + grow + 1, overlap).unwrap().split(&text).len();
        let baseline = FixedSizeChunker::new(size + 1, overlap).unwrap().split(&text).len();
        prop_assert!(fewer_or_equal <= baseline);
    }

    #[test]
    fn empty_text_never_chunks((size, overlap) in arb_params()) {
        prop_assert!(FixedSizeChunker::new(size, overlap).unwrap().split("").is_empty());
    }
}
