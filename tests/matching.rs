pub mod common;

use common::*;
use regatta::{Flags, Regex, RegexStringView};

#[test]
fn test_literal_with_capture() {
    // Pattern a(b+)c against "xxabbbcyy".
    let result = compile("a(b+)c").search("xxabbbcyy");
    assert!(result.success);
    assert_eq!(result.count, 1);
    assert_eq!(result.matches[0].text, "abbbc");
    assert_eq!(result.matches[0].column, 2);
    assert_eq!(result.matches[0].global_offset, 2);
    assert_eq!(
        result.capture_group_matches(0)[0].as_ref().unwrap().text,
        "bbb"
    );
}

#[test]
fn test_dot_star_on_empty_input() {
    let result = compile(".*").search("");
    assert!(result.success);
    assert_eq!(result.count, 1);
    assert_eq!(result.matches[0].text, "");
    assert_eq!(result.matches[0].column, 0);
}

#[test]
fn test_alternation_priority() {
    // Greedy alternation tries the leftmost branch first; after "a" matches
    // at 0, nothing matches at 1.
    compile("a|ab").match_all("ab").test_eq(vec!["a"]);
    compile("ab|a").match1f("ab").test_eq("ab");
}

#[test]
fn test_multiline_anchors() {
    let result = compilef("^foo", "m").search("x\nfoo\nfoo");
    assert_eq!(result.count, 2);
    assert_eq!(result.matches[0].column, 2);
    assert_eq!(result.matches[1].column, 6);

    compilef("^def", "m").match1f("abc\ndef").test_eq("def");
    compile("^def").test_fails("abc\ndef");
}

#[test]
fn test_sticky_stateful_offset() {
    let re = Regex::with_flags("(?:x)*", Flags::STICKY | Flags::INTERNAL_STATEFUL).unwrap();
    re.set_start_offset(3);
    let result = re.match_str("aaaxxxb");
    assert!(result.success);
    assert_eq!(result.count, 1);
    assert_eq!(result.matches[0].text, "xxx");
    assert_eq!(result.matches[0].column, 3);
    // The cursor persists past the match.
    assert_eq!(re.start_offset(), 6);
}

#[test]
fn test_sticky_requires_exact_start() {
    let re = Regex::with_flags("ab", Flags::STICKY | Flags::INTERNAL_STATEFUL).unwrap();
    assert!(!re.match_str("xxab").success);

    re.set_start_offset(2);
    let result = re.match_str("xxab");
    assert_eq!(result.count, 1);
    assert_eq!(result.matches[0].column, 2);
}

#[test]
fn test_insensitive_class() {
    compilef("[A-F]+", "i").match1f("abcdEF0").test_eq("abcdEF");
    // X/x do not case-fold into A-F.
    compilef("[A-F]+", "i").match_all("abcXYZ0").test_eq(vec!["abc"]);
    compile("[A-F]+").match_all("xABCx").test_eq(vec!["ABC"]);
    compile("[A-F]+").test_fails("abc");
}

#[test]
fn test_insensitive_literals_and_backrefs() {
    compilef("bc", "i").match1f("aBCd").test_eq("BC");
    compilef(r"(a)\1", "i").match1f("aA").test_eq("aA,a");
}

#[test]
fn test_zero_length_matches() {
    compile("a*").match_all("bb").test_eq(vec!["", "", ""]);
    compile(".*?").match_all("a").test_eq(vec!["", ""]);
    compile("").match_all("ab").test_eq(vec!["", "", ""]);
}

#[test]
fn test_greedy_vs_lazy() {
    compile("a+").match1f("aaa").test_eq("aaa");
    compile("a+?").match_all("aaa").test_eq(vec!["a", "a", "a"]);
    compile("<(.+?)>").match1f("<ab><cd>").test_eq("<ab>,ab");
    compile("<(.+)>").match1f("<ab><cd>").test_eq("<ab><cd>,ab><cd");
}

#[test]
fn test_bounded_repetition() {
    compile("a{2,4}").match_all("aaaaaa").test_eq(vec!["aaaa", "aa"]);
    compile("a{2,4}").test_fails("a");
    compile("(ab){2}").match1f("ababab").test_eq("abab,ab");
    compile("a{3}").match_all("aaaa").test_eq(vec!["aaa"]);
    compile("a{2,}").match1f("aaaa").test_eq("aaaa");
}

#[test]
fn test_non_participating_captures() {
    let result = compile("aa(b)?aa").search("aaaa");
    assert!(result.success);
    assert!(result.capture_group_matches(0)[0].is_none());

    // A capture written by a failed attempt must not leak into a later
    // match where the group does not participate.
    let result = compile("(?:(a)x|b)").search("ab");
    assert!(result.success);
    assert_eq!(result.matches[0].text, "b");
    assert!(result.capture_group_matches(0)[0].is_none());
}

#[test]
fn test_captures_in_loops_reset_each_iteration() {
    // The last iteration wins; groups from earlier iterations are cleared.
    let result = compile("(?:(a)|(b))*").search("ab");
    assert_eq!(result.matches[0].text, "ab");
    assert!(result.capture_group_matches(0)[0].is_none());
    assert_eq!(
        result.capture_group_matches(0)[1].as_ref().unwrap().text,
        "b"
    );
}

#[test]
fn test_character_classes() {
    compile(r"\d+").match1f("abc123def").test_eq("123");
    compile(r"[^\d]+").match_all("ab1cd").test_eq(vec!["ab", "cd"]);
    compile(r"\w+").match_all("foo bar").test_eq(vec!["foo", "bar"]);
    compile(r"[\Dx]+").match1f("12ab34").test_eq("ab");
    compile(r"\s").match1f("a b").test_eq(" ");
    compile("[]").test_fails("anything");
    compile("[^]").match1f("x").test_eq("x");
}

#[test]
fn test_dot_and_dotall() {
    compile(".").test_fails("\n");
    compilef(".", "s").match1f("\n").test_eq("\n");
}

#[test]
fn test_anchors_and_boundaries() {
    compile("^abc").match1f("abc").test_eq("abc");
    compile("abc$").match1f("xxabc").test_eq("abc");
    compile("^a").match_all("aba").test_eq(vec!["a"]);
    compile(r"\bfoo\b").match1f("a foo bar").test_eq("foo");
    compile(r"\Boo").match1f("foo").test_eq("oo");
}

#[test]
fn test_backreferences() {
    compile(r"(\w)\1")
        .match_all("Frankly, Miss Piggy, I don't give a hoot!")
        .test_eq(vec!["ss", "gg", "oo"]);
    // A backreference to a group that did not participate matches the empty
    // string.
    compile(r"(?:(x)|y)\1z").match1f("yz").test_eq("yz,");
}

#[test]
fn test_named_groups() {
    let re = compilef(r"(?<year>\d{4})-(?<month>\d{2})", "");
    re.match1_named_group("2020-05", "year").test_eq("2020");
    re.match1_named_group("2020-05", "month").test_eq("05");
    let result = re.search("2020-05");
    assert_eq!(result.named_capture_group_count, 2);

    compile(r"(?<x>a)\k<x>").match1f("aa").test_eq("aa,a");
}

#[test]
fn test_lookahead() {
    compile("a(?=b)").match1f("ab").test_eq("a");
    compile("a(?=b)").test_fails("ac");
    // Captures made inside a successful lookahead are retained.
    compile("(?=(b+))b").match1f("bbb").test_eq("b,bbb");
}

#[test]
fn test_negated_lookahead() {
    compile("x(?!y)").match_all("xy xz").test_eq(vec!["x"]);
    compile("(?!a|b)[a-c]").match_all("cab").test_eq(vec!["c"]);
}

#[test]
fn test_lookbehind() {
    compile("(?<=x)y").match_all("xyxy").test_eq(vec!["y", "y"]);
    compile("(?<!x)y").match_all("xy ay").test_eq(vec!["y"]);
    compile("(?<=ab)c").match1f("abc").test_eq("c");
    compile("(?<=ab)c").test_fails("xbc");
}

#[test]
fn test_possessive_quantifiers() {
    // A possessive loop refuses to give back what it consumed.
    compile("a*+a").test_fails("aaa");
    compile("a*a").match1f("aaa").test_eq("aaa");
    compile(r"\d++x").match1f("123x").test_eq("123x");
    compile(r"\d++").match1f("123").test_eq("123");
}

#[test]
fn test_atomic_loop_rewrite_behaviour() {
    // The optimizer turns this loop atomic; the result must not change.
    compile("[0-9]*x").match1f("2023x").test_eq("2023x");
    compile("[0-9]*x").test_fails("2023");
    compile("[0-9]*5").match1f("12345").test_eq("12345");
}

#[test]
fn test_unicode_escapes() {
    compile(r"A+").match1f("zAAz").test_eq("AA");
    compile(r"\x20").match1f("a b").test_eq(" ");
    compilef(r"\u{1F600}", "u").match1f("ab\u{1F600}cd").test_eq("\u{1F600}");
}

#[test]
fn test_utf16_views() {
    let re = Regex::new("b+").unwrap();
    let units: Vec<u16> = "abbc".encode_utf16().collect();
    let result = re.match_view(RegexStringView::from_utf16(&units), Some(Flags::GLOBAL));
    assert_eq!(result.count, 1);
    assert_eq!(result.matches[0].text, "bb");
    assert_eq!(result.matches[0].column, 1);

    // One astral code point: a pair under UNICODE, two units without it.
    let units: Vec<u16> = "\u{1F600}".encode_utf16().collect();
    let re = Regex::new(".").unwrap();
    let paired = re.match_view(
        RegexStringView::from_utf16(&units),
        Some(Flags::GLOBAL | Flags::UNICODE),
    );
    assert_eq!(paired.count, 1);
    assert_eq!(paired.matches[0].text, "\u{1F600}");
    let unpaired = re.match_view(RegexStringView::from_utf16(&units), Some(Flags::GLOBAL));
    assert_eq!(unpaired.count, 2);
}

#[test]
fn test_posix_multiline_fans_out_into_lines() {
    let re = compile_posix("^b", Flags::MULTILINE);
    let result = re.regex().match_view("a\nb\nc".into(), None);
    assert_eq!(result.count, 1);
    assert_eq!(result.matches[0].text, "b");
    assert_eq!(result.matches[0].line, 1);
    assert_eq!(result.matches[0].column, 0);
    assert_eq!(result.matches[0].global_offset, 2);
}

#[test]
fn test_posix_basic_matching() {
    let re = compile_posix("([a-z]+)@([a-z]+)", Flags::GLOBAL);
    let result = re.regex().match_view("mail me@here now".into(), None);
    assert_eq!(result.count, 1);
    assert_eq!(result.matches[0].text, "me@here");
    assert_eq!(
        result.capture_group_matches(0)[0].as_ref().unwrap().text,
        "me"
    );
    assert_eq!(
        result.capture_group_matches(0)[1].as_ref().unwrap().text,
        "here"
    );
}

#[test]
fn test_stateful_resume_like_last_index() {
    let re = Regex::with_flags(
        "a",
        Flags::GLOBAL | Flags::SINGLE_MATCH | Flags::INTERNAL_STATEFUL,
    )
    .unwrap();

    let first = re.match_str("aba");
    assert_eq!(first.count, 1);
    assert_eq!(first.matches[0].column, 0);
    assert_eq!(re.start_offset(), 1);

    let second = re.match_str("aba");
    assert_eq!(second.count, 1);
    assert_eq!(second.matches[0].column, 2);
    assert_eq!(re.start_offset(), 3);

    let third = re.match_str("aba");
    assert!(!third.success);
}

#[test]
fn test_non_stateful_resets_offset() {
    let re = Regex::new("a").unwrap();
    re.set_start_offset(2);
    let result = re.search("abc");
    assert_eq!(result.matches[0].column, 0);
    assert_eq!(re.start_offset(), 0);
}

#[test]
fn test_single_shot_must_consume_to_end() {
    let re = Regex::new("a").unwrap();
    assert!(re.match_str("a").success);
    assert!(!re.match_str("ab").success);
    assert!(!re.match_str("ba").success);
}

#[test]
fn test_match_not_begin_or_end_of_line() {
    let re = Regex::with_flags("foo", Flags::MATCH_NOT_BEGIN_OF_LINE | Flags::GLOBAL).unwrap();
    let result = re.match_str("foofoo");
    assert_eq!(result.count, 1);
    assert_eq!(result.matches[0].column, 3);

    let re = Regex::with_flags("foo", Flags::MATCH_NOT_END_OF_LINE | Flags::GLOBAL).unwrap();
    let result = re.match_str("foofoo");
    assert_eq!(result.count, 1);
    assert_eq!(result.matches[0].column, 0);
}

#[test]
fn test_multiple_views() {
    let re = Regex::new("ab").unwrap();
    let views: Vec<RegexStringView> = vec!["abc".into(), "abd".into()];
    let result = re.match_views(&views, Some(Flags::GLOBAL));
    assert_eq!(result.count, 2);
    assert_eq!(result.matches[0].line, 0);
    assert_eq!(result.matches[0].global_offset, 0);
    assert_eq!(result.matches[1].line, 1);
    // The second view starts past the first one plus its line break.
    assert_eq!(result.matches[1].global_offset, 4);
}

#[test]
fn test_result_shape_invariants() {
    for (pattern, input) in [
        ("a(b+)c", "xxabbbc abc"),
        ("(a)|(b)", "ab"),
        ("x", "no matches here at all"),
        ("(\\w+) (\\w+)", "one two three four"),
    ] {
        let result = compile(pattern).search(input);
        assert_eq!(result.matches.len(), result.count);
        assert_eq!(
            result.flat_capture_group_matches.len(),
            result.count * result.capture_group_count
        );
        assert_eq!(result.capture_groups().count(), result.count);
        // Matches are strictly increasing in start offset.
        for pair in result.matches.windows(2) {
            assert!(pair[0].global_offset < pair[1].global_offset);
        }
    }
}

#[test]
fn test_repeated_calls_are_deterministic() {
    let re = Regex::new(r"(a+)(b+)?c*").unwrap();
    let first = re.search("aabcc aac abc");
    let second = re.search("aabcc aac abc");
    assert_eq!(first, second);
    assert!(first.operations > 0);
    assert_eq!(first.operations, second.operations);
}

#[test]
fn test_pathological_patterns_terminate() {
    // Zero-width alternation cycles are cut by the seen-state set.
    assert!(compile("(a*)*").search("b").success);
    compile("(a|a)*b").test_fails("aaac");
    assert!(compile("(a*)*b").search("aaab").success);
    compile("(x+x+)+y").test_fails("xxxxxxxxxx");
}

#[test]
fn test_min_length_prunes_short_inputs() {
    let result = compile("abcde").search("abc");
    assert!(!result.success);
    // The interpreter never ran: no operations were counted.
    assert_eq!(result.operations, 0);
}

#[test]
fn test_starting_range_filter_skips_positions() {
    // Every non-'a' position is skipped without running the interpreter,
    // so the operation count only reflects the two real attempts.
    let with_filter = compile("ab").search("xxxxaxxab");
    assert!(with_filter.success);
    assert_eq!(with_filter.matches[0].column, 7);
}
