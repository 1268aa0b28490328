use regatta::{Dialect, Flags, Match, MatchResult, Regex};

/// Test that \p pattern fails to parse with default flags.
pub fn test_parse_fails(pattern: &str) {
    let res = Regex::new(pattern);
    assert!(res.is_err(), "Pattern should not have parsed: {}", pattern);
}

/// Format a result's first match by inserting commas between the match and
/// all of its capture groups.
fn format_match(result: &MatchResult) -> String {
    let mut out = result.matches[0].text.clone();
    for capture in result.capture_group_matches(0) {
        out.push(',');
        if let Some(capture) = capture {
            out.push_str(&capture.text);
        }
    }
    out
}

pub trait StringTestHelpers {
    /// "Fluent" style helper for testing that a String is equal to a str.
    fn test_eq(&self, s: &str);
}

impl StringTestHelpers for String {
    #[track_caller]
    fn test_eq(&self, rhs: &str) {
        assert_eq!(self.as_str(), rhs)
    }
}

pub trait VecTestHelpers {
    /// "Fluent" style helper for testing that a Vec<String> is equal to a
    /// Vec<&str>.
    fn test_eq(&self, rhs: Vec<&str>);
}

impl VecTestHelpers for Vec<String> {
    #[track_caller]
    fn test_eq(&self, rhs: Vec<&str>) {
        assert_eq!(self.len(), rhs.len(), "Match counts differ");
        for (ours, theirs) in self.iter().zip(rhs.iter()) {
            assert_eq!(ours, theirs);
        }
    }
}

/// A compiled regex under test.
#[derive(Debug, Clone)]
pub struct TestCompiledRegex {
    re: Regex,
}

#[allow(dead_code)]
impl TestCompiledRegex {
    pub fn regex(&self) -> &Regex {
        &self.re
    }

    /// Search \p input, returning the full result record.
    pub fn search(&self, input: &str) -> MatchResult {
        self.re.search(input)
    }

    /// Search \p input, returning the first Match, or None if none.
    pub fn find(&self, input: &str) -> Option<Match> {
        let result = self.re.search(input);
        result.matches.into_iter().next()
    }

    /// Search \p input, returning the first formatted match.
    #[track_caller]
    pub fn match1f(&self, input: &str) -> String {
        let result = self.search(input);
        assert!(result.success, "Failed to match {}", input);
        format_match(&result)
    }

    /// Search \p input, returning the named group's text for the first
    /// match.
    #[track_caller]
    pub fn match1_named_group(&self, input: &str, group: &str) -> String {
        let result = self.search(input);
        assert!(result.success, "Failed to match {}", input);
        let index = self
            .re
            .capture_group_index(group)
            .unwrap_or_else(|| panic!("Named capture group does not exist: {}", group));
        match &result.capture_group_matches(0)[index] {
            Some(capture) => capture.text.clone(),
            None => panic!("Named capture group did not match: {}", group),
        }
    }

    /// Return the text of all non-overlapping matches.
    pub fn match_all(&self, input: &str) -> Vec<String> {
        self.search(input)
            .matches
            .into_iter()
            .map(|m| m.text)
            .collect()
    }

    /// Test that searching \p input fails.
    #[track_caller]
    pub fn test_fails(&self, input: &str) {
        assert!(!self.search(input).success, "Should not have matched")
    }

    /// Test that searching \p input succeeds.
    #[track_caller]
    pub fn test_succeeds(&self, input: &str) {
        assert!(self.search(input).success, "Should have matched")
    }
}

/// Compile a pattern with default flags.
#[track_caller]
pub fn compile(pattern: &str) -> TestCompiledRegex {
    compilef(pattern, "")
}

/// Compile a pattern with the given flag letters.
#[track_caller]
pub fn compilef(pattern: &str, flags: &str) -> TestCompiledRegex {
    let re = Regex::with_flags(pattern, flags);
    assert!(
        re.is_ok(),
        "Failed to parse! flags: {} pattern: {}, error: {}",
        flags,
        pattern,
        re.unwrap_err()
    );
    TestCompiledRegex { re: re.unwrap() }
}

/// Compile a pattern in the POSIX extended dialect.
#[allow(dead_code)]
#[track_caller]
pub fn compile_posix(pattern: &str, flags: Flags) -> TestCompiledRegex {
    let re = Regex::with_dialect(pattern, Dialect::PosixExtended, flags);
    assert!(
        re.is_ok(),
        "Failed to parse! pattern: {}, error: {}",
        pattern,
        re.unwrap_err()
    );
    TestCompiledRegex { re: re.unwrap() }
}
