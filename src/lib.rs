/*!

# regatta - a multi-dialect backtracking regex engine

This crate provides a regular expression engine built around an explicitly
backtracking bytecode interpreter, targeting ECMAScript-style syntax with a
POSIX-extended dialect alongside it.

# Example: test if a string contains a match

```rust
use regatta::Regex;
let re = Regex::new(r"\d{4}").unwrap();
let result = re.search("2020-20-05");
assert!(result.success);
assert_eq!(result.matches[0].text, "2020");
```

# Example: iterating over matches

```rust
use regatta::Regex;
let re = Regex::new(r"(\w)\1").unwrap();
let result = re.search("Frankly, Miss Piggy, I don't give a hoot!");
let doubled: Vec<&str> = result.matches.iter().map(|m| m.text.as_str()).collect();
assert_eq!(doubled, vec!["ss", "gg", "oo"]);
```

# Example: using capture groups

```rust
use regatta::Regex;
let re = Regex::new(r"a(b+)c").unwrap();
let result = re.search("xxabbbcyy");
assert_eq!(result.matches[0].column, 2);
assert_eq!(
    result.capture_group_matches(0)[0].as_ref().unwrap().text,
    "bbb"
);
```

# Architecture

regatta has a parser per dialect, an IR, a bytecode emitter, optimization
passes acting on the bytecode, and a backtracking interpreter.

The interpreter advances a match state through the program one opcode at a
time. Opcodes that hit a choice point queue alternative states onto a
priority-ordered work queue; failures pop the newest queued state, and a
hash set of state fingerprints discards states that were already tried, so
pathological zero-width alternations cannot loop forever. Possessive and
atomic loops overwrite their previously queued alternative in place instead
of stacking new ones.

The match driver seeds the interpreter at successive starting positions,
honouring anchoring, stickiness, and global/multiline search, and assembles
the result record. Compiled programs are memoised in a process-wide cache
bounded by total bytecode size, keyed by pattern source and option bits.

Matching is synchronous and single-threaded, and is not guaranteed to run
in linear time; the returned operation count lets callers budget for the
next call.

*/

#![warn(clippy::all)]
#![allow(clippy::upper_case_acronyms, clippy::match_like_matches_macro)]

pub use crate::api::*;
pub use crate::matcher::Matcher;

mod api;
mod cache;
mod emit;
mod folds;
mod input;
mod insn;
mod ir;
mod matcher;
mod optimizer;
mod parse;
mod state;
mod types;
