use proptest::prelude::*;
use treatise_search::glossary::{GlossaryEntry, GlossaryTable, expand_markers};
use treatise_search::search::matcher::fold_case;
use treatise_search::search::{MatchOptions, find_matches};

fn text_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Zàèìòù ,.]{0,60}"
}

fn term_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Zàè]{1,4}"
}

proptest! {
    #[test]
    fn spans_are_sorted_and_disjoint(
        text in text_strategy(),
        primary in term_strategy(),
        extra in prop::collection::vec(term_strategy(), 0..4),
    ) {
        let spans = find_matches(&text, &primary, MatchOptions::default(), &extra);
        for pair in spans.windows(2) {
            prop_assert!(pair[0].start < pair[1].start);
            prop_assert!(pair[0].end <= pair[1].start);
        }
        for span in &spans {
            prop_assert!(span.start < span.end);
            prop_assert!(text.is_char_boundary(span.start));
            prop_assert!(text.is_char_boundary(span.end));
        }
    }

    #[test]
    fn empty_query_never_matches(text in text_strategy()) {
        prop_assert!(find_matches(&text, "", MatchOptions::default(), &[]).is_empty());
    }

    #[test]
    fn folded_slice_equals_folded_term(text in text_strategy(), primary in term_strategy()) {
        let spans = find_matches(&text, &primary, MatchOptions::default(), &[]);
        for span in spans {
            prop_assert_eq!(fold_case(&text[span.start..span.end]), fold_case(&primary));
        }
    }

    #[test]
    fn case_sensitive_slice_is_exact(text in text_strategy(), primary in term_strategy()) {
        let options = MatchOptions {
            match_case: true,
            ..MatchOptions::default()
        };
        for span in find_matches(&text, &primary, options, &[]) {
            prop_assert_eq!(&text[span.start..span.end], primary.as_str());
        }
    }

    #[test]
    fn whole_word_spans_have_no_alphanumeric_neighbours(
        text in text_strategy(),
        primary in term_strategy(),
    ) {
        let options = MatchOptions {
            match_whole_word: true,
            ..MatchOptions::default()
        };
        for span in find_matches(&text, &primary, options, &[]) {
            let before = text[..span.start].chars().next_back();
            let after = text[span.end..].chars().next();
            prop_assert!(!before.is_some_and(char::is_alphanumeric));
            prop_assert!(!after.is_some_and(char::is_alphanumeric));
        }
    }

    #[test]
    fn expansion_is_idempotent(text in "[ab{} x]{0,30}") {
        let glossary = GlossaryTable::from_entries([
            GlossaryEntry::new("a", "Alpha"),
            GlossaryEntry::new("b", "Beta"),
        ]);
        let once = expand_markers(&text, &glossary).into_owned();
        let twice = expand_markers(&once, &glossary).into_owned();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn text_without_markers_is_unchanged(text in "[a-z ,.]{0,40}") {
        let glossary = GlossaryTable::from_entries([GlossaryEntry::new("a", "Alpha")]);
        let expanded = expand_markers(&text, &glossary).into_owned();
        prop_assert_eq!(expanded, text);
    }
}
