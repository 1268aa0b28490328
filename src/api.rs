use crate::cache;
use crate::emit;
use crate::insn::CompiledProgram;
use crate::matcher::Matcher;
use crate::optimizer;
use crate::parse;

use core::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub use crate::input::RegexStringView;
pub use crate::parse::{Error, ErrorKind};

bitflags::bitflags! {
    /// Option flags controlling parsing and matching.
    ///
    /// A matcher's effective options are the bitwise or of its baseline mask
    /// and the mask passed to the match call.
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        /// Continue searching after each match.
        /// Equivalent to the 'g' flag in JavaScript.
        const GLOBAL = 1 << 0;

        /// Case-insensitive matching.
        /// Equivalent to the 'i' flag in JavaScript.
        const INSENSITIVE = 1 << 1;

        /// `^` and `$` match at line separators, not just the input
        /// boundaries. Equivalent to the 'm' flag in JavaScript.
        const MULTILINE = 1 << 2;

        /// `.` matches line separators as well as any other character.
        /// Equivalent to the 's' flag in JavaScript.
        const DOT_ALL = 1 << 3;

        /// Disable continued search; a match must start exactly at the
        /// pattern's start offset. Equivalent to the 'y' flag in JavaScript.
        const STICKY = 1 << 4;

        /// Stop after the first match, even under `GLOBAL`.
        const SINGLE_MATCH = 1 << 5;

        /// Interpret the input as code points, not code units.
        /// Equivalent to the 'u' flag in JavaScript.
        const UNICODE = 1 << 6;

        /// Interpret the input as code points with set notation.
        /// Equivalent to the 'v' flag in JavaScript.
        const UNICODE_SETS = 1 << 7;

        /// Reject matches anchored at the start of a line.
        const MATCH_NOT_BEGIN_OF_LINE = 1 << 8;

        /// Reject matches anchored at the end of a line.
        const MATCH_NOT_END_OF_LINE = 1 << 9;

        /// Persist the end of the last match into the pattern's
        /// `start_offset` across calls, JavaScript `lastIndex` style.
        const INTERNAL_STATEFUL = 1 << 10;
    }
}

impl Flags {
    /// Construct a Flags from a Unicode codepoints iterator, using
    /// JavaScript flag letters. Unknown letters are silently skipped.
    #[inline]
    pub fn from_letters<T: Iterator<Item = u32>>(chars: T) -> Self {
        let mut result = Self::default();
        for c in chars {
            match char::from_u32(c).unwrap_or('\0') {
                'g' => result |= Flags::GLOBAL,
                'i' => result |= Flags::INSENSITIVE,
                'm' => result |= Flags::MULTILINE,
                's' => result |= Flags::DOT_ALL,
                'u' => result |= Flags::UNICODE,
                'v' => result |= Flags::UNICODE_SETS,
                'y' => result |= Flags::STICKY,
                _ => {
                    // Silently skip unsupported flags.
                }
            }
        }
        result
    }
}

impl From<&str> for Flags {
    /// Construct a Flags from a string of JavaScript flag letters.
    #[inline]
    fn from(s: &str) -> Self {
        Self::from_letters(s.chars().map(u32::from))
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (flag, letter) in [
            (Flags::GLOBAL, 'g'),
            (Flags::INSENSITIVE, 'i'),
            (Flags::MULTILINE, 'm'),
            (Flags::DOT_ALL, 's'),
            (Flags::UNICODE, 'u'),
            (Flags::UNICODE_SETS, 'v'),
            (Flags::STICKY, 'y'),
        ] {
            if self.contains(flag) {
                f.write_fmt(format_args!("{}", letter))?;
            }
        }
        Ok(())
    }
}

/// The supported pattern dialects.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// ECMAScript-style syntax: the default.
    Ecma262,

    /// POSIX extended syntax: no `(?…)` extensions, no lazy or possessive
    /// quantifiers. Multiline matching fans the input out into lines.
    PosixExtended,
}

/// A single match: the matched text and where it was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Match {
    /// The matched text.
    pub text: String,

    /// Zero-based line of the view the match was found in.
    pub line: usize,

    /// Start position of the match within its view, in code units.
    pub column: usize,

    /// Start position of the match from the beginning of the first view.
    pub global_offset: usize,
}

impl Match {
    pub(crate) fn new(text: String, line: usize, column: usize, global_offset: usize) -> Match {
        Match {
            text,
            line,
            column,
            global_offset,
        }
    }
}

/// The outcome of a match call.
///
/// `flat_capture_group_matches` holds `count × capture_group_count` entries;
/// entry `i × capture_group_count + g` is capture group `g + 1` of match
/// `i`, or None if the group did not participate in that match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    /// Whether at least one match was found.
    pub success: bool,

    /// Number of matches found.
    pub count: usize,

    /// The matches, in order of their start position.
    pub matches: Vec<Match>,

    /// Capture groups of all matches, flattened.
    pub flat_capture_group_matches: Vec<Option<Match>>,

    /// Number of opcodes the interpreter executed.
    pub operations: usize,

    /// Number of capture groups in the pattern.
    pub capture_group_count: usize,

    /// Number of named capture groups in the pattern.
    pub named_capture_group_count: usize,
}

impl MatchResult {
    /// A failed result carrying only the operation count.
    pub(crate) fn failed(operations: usize) -> MatchResult {
        MatchResult {
            operations,
            ..MatchResult::default()
        }
    }

    /// The capture groups of match \p match_index, as a slice of length
    /// `capture_group_count`.
    pub fn capture_group_matches(&self, match_index: usize) -> &[Option<Match>] {
        let start = match_index * self.capture_group_count;
        &self.flat_capture_group_matches[start..start + self.capture_group_count]
    }

    /// Iterate over the per-match capture group slices.
    pub fn capture_groups(&self) -> impl Iterator<Item = &[Option<Match>]> {
        (0..self.count).map(move |index| self.capture_group_matches(index))
    }
}

/// A Regex is the compiled version of a pattern.
#[derive(Debug)]
pub struct Regex {
    source: String,
    flags: Flags,
    dialect: Dialect,
    pub(crate) program: Arc<CompiledProgram>,
    // Stateful-mode cursor; always 0 for non-stateful patterns.
    start_offset: AtomicUsize,
}

impl Clone for Regex {
    fn clone(&self) -> Self {
        Regex {
            source: self.source.clone(),
            flags: self.flags,
            dialect: self.dialect,
            program: Arc::clone(&self.program),
            start_offset: AtomicUsize::new(self.start_offset.load(Ordering::Relaxed)),
        }
    }
}

impl Regex {
    /// Construct a regex by parsing \p pattern as ECMAScript-style syntax
    /// with the default flags. An Error is returned if the syntax is
    /// invalid.
    #[inline]
    pub fn new(pattern: &str) -> Result<Regex, Error> {
        Self::with_flags(pattern, Flags::default())
    }

    /// Construct a regex by parsing \p pattern with \p flags.
    #[inline]
    pub fn with_flags<F>(pattern: &str, flags: F) -> Result<Regex, Error>
    where
        F: Into<Flags>,
    {
        Self::with_dialect(pattern, Dialect::Ecma262, flags)
    }

    /// Construct a regex in the given dialect.
    ///
    /// Compilation consults the process-wide program cache first; a hit
    /// shares the cached program, a miss parses, optimizes, and populates
    /// the cache.
    pub fn with_dialect<F>(pattern: &str, dialect: Dialect, flags: F) -> Result<Regex, Error>
    where
        F: Into<Flags>,
    {
        let flags = flags.into();
        let program = match cache::lookup(dialect, pattern, flags) {
            Some(program) => program,
            None => {
                let parsed = parse::parse(pattern, dialect, flags)?;
                let mut program = emit::emit(&parsed, flags, dialect);
                optimizer::run_optimization_passes(&mut program);
                let program = Arc::new(program);
                cache::insert(dialect, pattern, flags, Arc::clone(&program));
                program
            }
        };
        Ok(Regex {
            source: pattern.to_string(),
            flags,
            dialect,
            program,
            start_offset: AtomicUsize::new(0),
        })
    }

    /// The original pattern text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The baseline option mask the regex was constructed with.
    pub fn options(&self) -> Flags {
        self.flags
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Number of capture groups in the pattern.
    pub fn capture_group_count(&self) -> usize {
        self.program.capture_group_count
    }

    /// Resolve a named capture group to its zero-based group index.
    pub fn capture_group_index(&self, name: &str) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        self.program
            .group_names
            .iter()
            .position(|n| n.as_ref() == name)
    }

    /// The stateful-mode cursor: the position the next stateful match call
    /// resumes from.
    pub fn start_offset(&self) -> usize {
        self.start_offset.load(Ordering::Relaxed)
    }

    /// Set the stateful-mode cursor, JavaScript `lastIndex` style.
    pub fn set_start_offset(&self, offset: usize) {
        self.start_offset.store(offset, Ordering::Relaxed);
    }

    /// Construct a matcher bound to this regex with its baseline options.
    pub fn matcher(&self) -> Matcher<'_> {
        Matcher::new(self, self.flags)
    }

    /// Find all matches in \p text: matching with continued search enabled.
    pub fn search(&self, text: &str) -> MatchResult {
        self.matcher().match_view(text.into(), Some(Flags::GLOBAL))
    }

    /// Match \p text with the baseline options only. Note that without
    /// `GLOBAL` or `MULTILINE` a match must consume to the end of the input
    /// to be reported.
    pub fn match_str(&self, text: &str) -> MatchResult {
        self.matcher().match_view(text.into(), None)
    }

    /// Match a single view with optional extra options.
    pub fn match_view(&self, view: RegexStringView<'_>, options: Option<Flags>) -> MatchResult {
        self.matcher().match_view(view, options)
    }

    /// Match a sequence of views with optional extra options.
    pub fn match_views(
        &self,
        views: &[RegexStringView<'_>],
        options: Option<Flags>,
    ) -> MatchResult {
        self.matcher().match_views(views, options)
    }
}

/// Drop every cached compiled program.
/// Hosts that need deterministic compile behaviour between tests call this.
pub fn clear_cache() {
    cache::clear();
}
