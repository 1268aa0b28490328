//! The backtracking interpreter and the match driver.

use crate::api::{Dialect, Flags, Match, MatchResult, Regex};
use crate::folds::to_ascii_lowercase;
use crate::input::RegexStringView;
use crate::insn::ExecutionResult;
use crate::state::{MatchInput, MatchState};
use crate::types::CharRange;

use core::cmp::Ordering;
use core::hash::{BuildHasherDefault, Hasher};
use std::collections::HashSet;

/// Hasher for state fingerprints. The fingerprints are already well mixed,
/// so folding the halves is sufficiently uniform.
#[derive(Default)]
struct SufficientlyUniformHasher(u64);

impl Hasher for SufficientlyUniformHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }

    #[inline]
    fn write_u64(&mut self, value: u64) {
        self.0 = (value >> 32) ^ value;
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 = (self.0 << 8) | byte as u64;
        }
        self.0 = (self.0 >> 32) ^ self.0;
    }
}

type SeenStateHashes = HashSet<u64, BuildHasherDefault<SufficientlyUniformHasher>>;

/// A matcher binds a compiled pattern to a baseline option mask.
/// It is stateless across calls except through the pattern's stateful
/// cursor, so a matcher may be reused freely.
#[derive(Debug, Copy, Clone)]
pub struct Matcher<'a> {
    pattern: &'a Regex,
    regex_options: Flags,
}

impl<'a> Matcher<'a> {
    pub fn new(pattern: &'a Regex, regex_options: Flags) -> Matcher<'a> {
        Matcher {
            pattern,
            regex_options,
        }
    }

    pub fn options(&self) -> Flags {
        self.regex_options
    }

    /// Match a single view.
    /// Outside the ECMA-262 dialect, multiline matching fans the view out
    /// into one view per line.
    pub fn match_view(
        &self,
        view: RegexStringView<'_>,
        regex_options: Option<Flags>,
    ) -> MatchResult {
        let options = self.regex_options | regex_options.unwrap_or_default();
        if self.pattern.program.dialect != Dialect::Ecma262
            && options.contains(Flags::MULTILINE)
        {
            return self.match_views(&view.lines(), regex_options);
        }
        self.match_views(&[view], regex_options)
    }

    /// Match a sequence of views, producing the assembled result record.
    pub fn match_views(
        &self,
        views: &[RegexStringView<'_>],
        regex_options: Option<Flags>,
    ) -> MatchResult {
        let program = &self.pattern.program;
        let options = self.regex_options | regex_options.unwrap_or_default();

        // If the pattern *itself* isn't stateful, reset any changes to
        // start_offset.
        if !self.regex_options.contains(Flags::INTERNAL_STATEFUL) {
            self.pattern.set_start_offset(0);
        }

        if views.is_empty() {
            return MatchResult::failed(0);
        }

        let unicode = options.intersects(Flags::UNICODE | Flags::UNICODE_SETS);
        let mut views: Vec<RegexStringView<'_>> = views.to_vec();
        for view in &mut views {
            view.set_unicode(unicode);
        }

        let mut match_count: usize = 0;
        let mut operations: usize = 0;
        let mut state = MatchState::new(
            program.capture_group_count,
            program.checkpoint_count,
            program.repeat_count,
        );
        let mut input = MatchInput::new(views[0], options, self.pattern.start_offset());

        let stateful = options.contains(Flags::INTERNAL_STATEFUL);

        // In stateful mode the carried offset may point past the first view;
        // advance through whole views until it lands in one.
        let mut lines_to_skip: usize = 0;
        if stateful && views.len() > 1 && input.start_offset > views[0].length_in_code_units() {
            for view in &views {
                if input.start_offset < view.length_in_code_units() + 1 {
                    break;
                }
                lines_to_skip += 1;
                input.start_offset -= view.length_in_code_units() + 1;
                input.global_offset += view.length_in_code_units() + 1;
            }
        }

        let mut continue_search = options.intersects(Flags::GLOBAL | Flags::MULTILINE);
        if options.contains(Flags::STICKY) {
            continue_search = false;
        }
        let single_match_only = options.contains(Flags::SINGLE_MATCH);
        let only_start_of_line =
            program.only_start_of_line && !options.contains(Flags::MULTILINE);
        let insensitive = options.contains(Flags::INSENSITIVE);

        for view in &views {
            if lines_to_skip != 0 {
                input.line += 1;
                lines_to_skip -= 1;
                continue;
            }
            input.view = *view;
            log::trace!(
                "Starting match with a view of {} code units",
                view.length_in_code_units()
            );

            let view_length = view.length_in_code_units();
            let mut view_index = input.start_offset;
            // Later views start at the beginning.
            input.start_offset = 0;
            state.string_position = view_index;
            state.string_position_in_code_units = view_index;
            let mut succeeded = false;

            if view_index == view_length && program.match_length_minimum == 0 {
                // Run the program once even though there is nothing left to
                // consume, so non-consuming patterns match the empty input.
                let mut temp_operations = operations;
                input.column = match_count;
                input.match_index = match_count;
                input.fail_counter = 0;
                input.fork_to_replace = None;
                state.reset_for_attempt(view_index, match_count);

                let success = self.execute(&mut input, &mut state, &mut temp_operations);
                // Acceptable only if it didn't read anything from the input.
                if success && state.string_position_in_code_units <= view_index {
                    operations = temp_operations;
                    if match_count == 0 {
                        append_match(&input, &mut state, view_index);
                        match_count += 1;

                        // Keep a pattern like ".*" from matching the empty
                        // view twice: once here and once in the loop below.
                        if view_index == 0 && view_length == 0 {
                            view_index += 1;
                        }
                    }
                }
            }

            while view_index <= view_length {
                if view_index == view_length && options.contains(Flags::MULTILINE) {
                    break;
                }

                let match_length_minimum = program.match_length_minimum;
                if match_length_minimum != 0 && match_length_minimum > view_length - view_index
                {
                    break;
                }

                let ranges = if insensitive {
                    &program.starting_ranges_insensitive
                } else {
                    &program.starting_ranges
                };
                let filtered_out = !ranges.is_empty()
                    && match input.view.code_point_at(view_index) {
                        Some((cp, _)) => {
                            let needle = if insensitive { to_ascii_lowercase(cp) } else { cp };
                            !range_set_contains(ranges, needle)
                        }
                        // Off a code point boundary: nothing can start here.
                        None => true,
                    };

                if !filtered_out {
                    input.column = match_count;
                    input.match_index = match_count;
                    input.fail_counter = 0;
                    input.fork_to_replace = None;
                    state.reset_for_attempt(view_index, match_count);

                    if self.execute(&mut input, &mut state, &mut operations) {
                        succeeded = true;
                        let end_units = state.string_position_in_code_units;

                        if options.contains(Flags::MATCH_NOT_END_OF_LINE)
                            && end_units == view_length
                        {
                            if !continue_search {
                                break;
                            }
                            view_index += 1;
                            continue;
                        }
                        if options.contains(Flags::MATCH_NOT_BEGIN_OF_LINE) && view_index == 0 {
                            if !continue_search {
                                break;
                            }
                            view_index += 1;
                            continue;
                        }

                        match_count += 1;

                        if continue_search {
                            append_match(&input, &mut state, view_index);

                            let has_zero_length = end_units == view_index;
                            view_index = end_units - if has_zero_length { 0 } else { 1 };
                            if single_match_only {
                                break;
                            }
                            view_index += 1;
                            continue;
                        }
                        if stateful {
                            append_match(&input, &mut state, view_index);
                            break;
                        }
                        if end_units < view_length {
                            // A single-shot match must consume to the end of
                            // the view.
                            return MatchResult::failed(operations);
                        }
                        append_match(&input, &mut state, view_index);
                        break;
                    }
                }

                if !continue_search || only_start_of_line {
                    break;
                }
                view_index += 1;
            }

            input.line += 1;
            input.global_offset += view_length + 1; // +1 includes the line break

            if stateful {
                self.pattern
                    .set_start_offset(state.string_position_in_code_units);
            }

            if succeeded && !continue_search {
                break;
            }
        }

        // Pad (or trim stale slots from failed attempts) so the capture rows
        // line up with the match count.
        let mut flat_capture_group_matches =
            core::mem::take(&mut state.flat_capture_group_matches);
        flat_capture_group_matches.resize(program.capture_group_count * match_count, None);

        let matches = core::mem::take(&mut state.matches);
        debug_assert!(matches.len() == match_count);

        MatchResult {
            success: match_count != 0,
            count: match_count,
            matches,
            flat_capture_group_matches,
            operations,
            capture_group_count: program.capture_group_count,
            named_capture_group_count: program.named_capture_group_count,
        }
    }

    /// Run the interpreter from the state's instruction position.
    ///
    /// The work queue is a LIFO of pending alternative states; fork results
    /// append to it (or overwrite a specific entry when the input carries a
    /// replacement token), and failures pop from it, skipping states whose
    /// fingerprint has been seen before. The queue and the seen set live
    /// only for this call.
    fn execute(
        &self,
        input: &mut MatchInput<'_>,
        state: &mut MatchState,
        operations: &mut usize,
    ) -> bool {
        let insns = &self.pattern.program.insns;
        let mut states_to_try_next: Vec<MatchState> = Vec::new();
        let mut seen_state_hashes: SeenStateHashes = HashSet::default();

        loop {
            let ip = state.instruction_position;
            let Some(opcode) = insns.get(ip) else {
                debug_assert!(false, "Instruction position out of bounds");
                return false;
            };
            *operations += 1;

            let result = if input.fail_counter > 0 {
                input.fail_counter -= 1;
                ExecutionResult::FailedExecuteLowPrioForks
            } else {
                opcode.execute(input, state)
            };

            // Advance before dispatch, so queued continuations already point
            // past this opcode.
            state.instruction_position += 1;

            match result {
                ExecutionResult::Continue => {}

                ExecutionResult::Succeeded => return true,

                ExecutionResult::ForkPrioHigh => {
                    let mut replaced = false;
                    if let Some(target) = input.fork_to_replace.take() {
                        for queued in states_to_try_next.iter_mut().rev() {
                            if queued.initiating_fork == target {
                                *queued = state.clone();
                                queued.initiating_fork = target;
                                replaced = true;
                                break;
                            }
                        }
                    }
                    if !replaced {
                        let mut queued = state.clone();
                        queued.initiating_fork = ip;
                        states_to_try_next.push(queued);
                    }
                    state.instruction_position = state.fork_at_position;
                }

                ExecutionResult::ForkPrioLow => {
                    let mut replaced = false;
                    if let Some(target) = input.fork_to_replace.take() {
                        for queued in states_to_try_next.iter_mut().rev() {
                            if queued.initiating_fork == target {
                                *queued = state.clone();
                                queued.instruction_position = state.fork_at_position;
                                queued.initiating_fork = target;
                                replaced = true;
                                break;
                            }
                        }
                    }
                    if !replaced {
                        let mut queued = state.clone();
                        queued.initiating_fork = ip;
                        queued.instruction_position = state.fork_at_position;
                        states_to_try_next.push(queued);
                    }
                }

                ExecutionResult::Failed | ExecutionResult::FailedExecuteLowPrioForks => loop {
                    let Some(next) = states_to_try_next.pop() else {
                        return false;
                    };
                    // Skip states we have already run; this cuts cycles in
                    // zero-width alternations.
                    if seen_state_hashes.insert(next.u64_hash()) {
                        *state = next;
                        break;
                    }
                },
            }
        }
    }
}

fn append_match(input: &MatchInput<'_>, state: &mut MatchState, start_position: usize) {
    if state.matches.len() == input.match_index {
        state.matches.push(Match::default());
    }
    let end = state.string_position_in_code_units;
    debug_assert!(end <= input.view.length_in_code_units());
    state.matches[input.match_index] = Match::new(
        input.view.substring(start_position, end),
        input.line,
        start_position,
        input.global_offset + start_position,
    );
}

/// Binary search a sorted, non-overlapping range set.
fn range_set_contains(ranges: &[CharRange], needle: u32) -> bool {
    ranges
        .binary_search_by(|range| {
            if needle < range.from {
                Ordering::Greater
            } else if needle > range.to {
                Ordering::Less
            } else {
                Ordering::Equal
            }
        })
        .is_ok()
}
