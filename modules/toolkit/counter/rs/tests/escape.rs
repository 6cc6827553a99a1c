use gracov_counter_rs::escape::{
    escape, escape_delims, find_boundary, unescape, unescape_delims, DELIM1, DELIM2,
};
use proptest::prelude::*;

// Mostly delimiters, so that runs of every parity show up
fn bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![3 => Just(DELIM1), 2 => Just(DELIM2), 1 => any::<u8>()],
        0..64,
    )
}

proptest! {
    #[test]
    fn escape_is_a_bijection(raw in bytes()) {
        for delim in [DELIM1, DELIM2] {
            prop_assert_eq!(unescape(&escape(&raw, delim), delim).unwrap(), raw.clone());
        }
        prop_assert_eq!(unescape_delims(&escape_delims(&raw)).unwrap(), raw.clone());
    }

    #[test]
    fn escaped_text_has_no_boundary(raw in bytes()) {
        let escaped = escape_delims(&raw);
        prop_assert_eq!(find_boundary(&escaped, DELIM1, true), None);
        prop_assert_eq!(find_boundary(&escaped, DELIM2, true), None);
    }

    #[test]
    fn separator_ends_escaped_text(raw in bytes(), tail in bytes()) {
        // An escaped body followed by the start of a key and anything at all
        let mut text = escape_delims(&raw);
        let len = text.len();
        text.extend([DELIM1, DELIM2]);
        text.extend(tail);

        let boundary = find_boundary(&text, DELIM1, true).unwrap();
        prop_assert_eq!(boundary.end - 1, len);
        prop_assert_eq!(unescape_delims(&text[..boundary.end - 1]).unwrap(), raw);
    }
}
