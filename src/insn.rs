//! Bytecode instructions for a compiled pattern.
//!
//! The program is a flat sequence of instructions; each occupies one slot,
//! and jump offsets are relative to the slot after the instruction (the
//! interpreter advances the instruction position before dispatching on the
//! result, so queued continuations already point past the current opcode).

use crate::api::{Dialect, Flags, Match};
use crate::folds::{fold_eq, simple_fold, simple_upper};
use crate::state::{MatchInput, MatchState};
use crate::types::{
    is_line_terminator, is_word_char, CaptureGroupID, CharRange, CharacterClassType, CheckpointID,
    RepeatID, IP,
};

/// What executing one opcode tells the interpreter to do next.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Advance past this opcode and proceed sequentially.
    Continue,

    /// The whole program succeeded; the match is complete.
    Succeeded,

    /// This path cannot succeed; pop the next queued state.
    Failed,

    /// As `Failed`, but this path is never retried.
    FailedExecuteLowPrioForks,

    /// Queue the current continuation; jump to `fork_at_position` now.
    ForkPrioHigh,

    /// Queue a jump to `fork_at_position` for later; continue sequentially.
    ForkPrioLow,
}

/// How `JumpNonEmpty` transfers control when the loop body consumed input.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ForkForm {
    Jump,
    ForkJump,
    ForkStay,
    ForkReplaceJump,
    ForkReplaceStay,
}

/// One element of a `Compare` instruction.
///
/// `Inverse` inverts the whole comparison; `TemporaryInverse` inverts only
/// the next element. `String` and `Reference` are emitted as the sole
/// element of their instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Inverse,
    TemporaryInverse,
    AnyChar,
    Char(u32),
    String(Box<[u32]>),
    CharClass(CharacterClassType),
    CharRange(CharRange),
    Reference(CaptureGroupID),
}

/// The instruction set.
#[derive(Debug, Clone)]
pub enum Insn {
    /// Match the current position against a comparison list, consuming what
    /// matched.
    Compare(Box<[Comparison]>),

    /// Match the start of the input (or of a line, under `MULTILINE`);
    /// emitted by `^`.
    CheckBegin,

    /// Match the end of the input (or of a line, under `MULTILINE`);
    /// emitted by `$`.
    CheckEnd,

    /// `\b` and `\B` word boundaries.
    CheckBoundary { inverted: bool },

    /// Transfer control unconditionally.
    Jump { offset: isize },

    /// Queue the continuation; take the branch now.
    ForkJump { offset: isize },

    /// Queue the branch for later; continue sequentially.
    ForkStay { offset: isize },

    /// As `ForkJump`, but overwrite the state this opcode queued previously
    /// instead of appending. Drives possessive and atomic loops.
    ForkReplaceJump { offset: isize },

    /// As `ForkStay`, with the same replacement rule.
    ForkReplaceStay { offset: isize },

    /// Record the left bound of a capture group.
    SaveLeftCaptureGroup(CaptureGroupID),

    /// Record the right bound of a capture group and store the capture.
    SaveRightCaptureGroup(CaptureGroupID),

    /// Reset a capture group to "did not participate".
    ClearCaptureGroup(CaptureGroupID),

    /// Record the current position for a later `JumpNonEmpty`.
    Checkpoint(CheckpointID),

    /// Loop back (or fork back) if input was consumed since the checkpoint;
    /// fall through on an empty iteration.
    JumpNonEmpty {
        offset: isize,
        checkpoint: CheckpointID,
        form: ForkForm,
    },

    /// Jump back `offset` unless the counter has reached `count`; used for
    /// exact `{n}` repetition.
    Repeat {
        offset: isize,
        count: usize,
        id: RepeatID,
    },

    /// Zero a repetition counter.
    ResetRepeat(RepeatID),

    /// Push the current position; entering a lookaround.
    SaveStringPosition,

    /// Pop and restore the saved position; a lookaround matched.
    RestoreStringPosition,

    /// Step backwards by a fixed number of code points; entering a
    /// lookbehind body.
    GoBack(usize),

    /// Fail this path and pre-schedule `count - 1` further synthesized
    /// failures via the input's fail counter.
    FailForks(usize),

    /// The match is complete.
    Exit,
}

impl Insn {
    /// Execute against the current input and state.
    /// Fork results have set `state.fork_at_position` on return.
    pub fn execute(&self, input: &mut MatchInput<'_>, state: &mut MatchState) -> ExecutionResult {
        let ip = state.instruction_position;
        match self {
            Insn::Compare(comparisons) => execute_compare(comparisons, input, state),

            Insn::CheckBegin => {
                let units = state.string_position_in_code_units;
                let multiline = input.regex_options.contains(Flags::MULTILINE);
                if units == 0 || (multiline && input.view.preceded_by_line_terminator(units)) {
                    ExecutionResult::Continue
                } else {
                    ExecutionResult::Failed
                }
            }

            Insn::CheckEnd => {
                let units = state.string_position_in_code_units;
                let multiline = input.regex_options.contains(Flags::MULTILINE);
                let at_end = units == input.view.length_in_code_units();
                let at_terminator = multiline
                    && input
                        .view
                        .code_point_at(units)
                        .is_some_and(|(cp, _)| is_line_terminator(cp));
                if at_end || at_terminator {
                    ExecutionResult::Continue
                } else {
                    ExecutionResult::Failed
                }
            }

            &Insn::CheckBoundary { inverted } => {
                let units = state.string_position_in_code_units;
                let prev_wordchar = input
                    .view
                    .code_point_before(units)
                    .is_some_and(|(cp, _)| is_word_char(cp));
                let curr_wordchar = input
                    .view
                    .code_point_at(units)
                    .is_some_and(|(cp, _)| is_word_char(cp));
                let is_boundary = prev_wordchar != curr_wordchar;
                if is_boundary != inverted {
                    ExecutionResult::Continue
                } else {
                    ExecutionResult::Failed
                }
            }

            &Insn::Jump { offset } => {
                // The interpreter's advance lands on the target.
                state.instruction_position = offset_ip(ip, offset);
                ExecutionResult::Continue
            }

            &Insn::ForkJump { offset } => {
                state.fork_at_position = jump_target(ip, offset);
                ExecutionResult::ForkPrioHigh
            }

            &Insn::ForkStay { offset } => {
                state.fork_at_position = jump_target(ip, offset);
                ExecutionResult::ForkPrioLow
            }

            &Insn::ForkReplaceJump { offset } => {
                input.fork_to_replace = Some(ip);
                state.fork_at_position = jump_target(ip, offset);
                ExecutionResult::ForkPrioHigh
            }

            &Insn::ForkReplaceStay { offset } => {
                input.fork_to_replace = Some(ip);
                state.fork_at_position = jump_target(ip, offset);
                ExecutionResult::ForkPrioLow
            }

            &Insn::SaveLeftCaptureGroup(group) => {
                state.capture_group_starts[group as usize] =
                    Some(state.string_position_in_code_units);
                ExecutionResult::Continue
            }

            &Insn::SaveRightCaptureGroup(group) => {
                let start = match state.capture_group_starts[group as usize] {
                    Some(start) => start,
                    None => {
                        debug_assert!(false, "Capture group closed before it was opened");
                        return ExecutionResult::Failed;
                    }
                };
                let units = state.string_position_in_code_units;
                let index = input.match_index * state.capture_group_count + group as usize;
                if state.flat_capture_group_matches.len() <= index {
                    state.flat_capture_group_matches.resize(index + 1, None);
                }
                let text = input.view.substring(start, units);
                state.flat_capture_group_matches[index] = Some(Match::new(
                    text,
                    input.line,
                    start,
                    input.global_offset + start,
                ));
                ExecutionResult::Continue
            }

            &Insn::ClearCaptureGroup(group) => {
                state.capture_group_starts[group as usize] = None;
                let index = input.match_index * state.capture_group_count + group as usize;
                if let Some(slot) = state.flat_capture_group_matches.get_mut(index) {
                    *slot = None;
                }
                ExecutionResult::Continue
            }

            &Insn::Checkpoint(id) => {
                state.checkpoints[id as usize] = state.string_position_in_code_units;
                ExecutionResult::Continue
            }

            &Insn::JumpNonEmpty {
                offset,
                checkpoint,
                form,
            } => {
                if state.string_position_in_code_units == state.checkpoints[checkpoint as usize] {
                    // Empty iteration: fall out of the loop.
                    return ExecutionResult::Continue;
                }
                match form {
                    ForkForm::Jump => {
                        state.instruction_position = offset_ip(ip, offset);
                        ExecutionResult::Continue
                    }
                    ForkForm::ForkJump => {
                        state.fork_at_position = jump_target(ip, offset);
                        ExecutionResult::ForkPrioHigh
                    }
                    ForkForm::ForkStay => {
                        state.fork_at_position = jump_target(ip, offset);
                        ExecutionResult::ForkPrioLow
                    }
                    ForkForm::ForkReplaceJump => {
                        input.fork_to_replace = Some(ip);
                        state.fork_at_position = jump_target(ip, offset);
                        ExecutionResult::ForkPrioHigh
                    }
                    ForkForm::ForkReplaceStay => {
                        input.fork_to_replace = Some(ip);
                        state.fork_at_position = jump_target(ip, offset);
                        ExecutionResult::ForkPrioLow
                    }
                }
            }

            &Insn::Repeat { offset, count, id } => {
                let mark = &mut state.repetition_marks[id as usize];
                if *mark == count {
                    *mark = 0;
                    ExecutionResult::Continue
                } else {
                    *mark += 1;
                    state.instruction_position = offset_ip(ip, offset);
                    ExecutionResult::Continue
                }
            }

            &Insn::ResetRepeat(id) => {
                state.repetition_marks[id as usize] = 0;
                ExecutionResult::Continue
            }

            Insn::SaveStringPosition => {
                input.saved_positions.push(state.string_position);
                input
                    .saved_code_unit_positions
                    .push(state.string_position_in_code_units);
                ExecutionResult::Continue
            }

            Insn::RestoreStringPosition => {
                // An empty stack means this path replays a continuation that
                // already restored; it cannot produce anything new.
                match (
                    input.saved_positions.pop(),
                    input.saved_code_unit_positions.pop(),
                ) {
                    (Some(points), Some(units)) => {
                        state.string_position = points;
                        state.string_position_in_code_units = units;
                        ExecutionResult::Continue
                    }
                    _ => ExecutionResult::Failed,
                }
            }

            &Insn::GoBack(count) => {
                let mut units = state.string_position_in_code_units;
                for _ in 0..count {
                    match input.view.code_point_before(units) {
                        Some((_, width)) => units -= width,
                        None => return ExecutionResult::Failed,
                    }
                }
                state.string_position_in_code_units = units;
                state.string_position = state.string_position.saturating_sub(count);
                ExecutionResult::Continue
            }

            &Insn::FailForks(count) => {
                debug_assert!(count > 0, "FailForks requires a positive count");
                input.fail_counter = count - 1;
                ExecutionResult::FailedExecuteLowPrioForks
            }

            Insn::Exit => ExecutionResult::Succeeded,
        }
    }
}

#[inline]
fn offset_ip(ip: IP, offset: isize) -> IP {
    (ip as isize + offset) as IP
}

#[inline]
fn jump_target(ip: IP, offset: isize) -> IP {
    (ip as isize + 1 + offset) as IP
}

fn execute_compare(
    comparisons: &[Comparison],
    input: &mut MatchInput<'_>,
    state: &mut MatchState,
) -> ExecutionResult {
    let insensitive = input.regex_options.contains(Flags::INSENSITIVE);
    let current = input
        .view
        .code_point_at(state.string_position_in_code_units);

    let mut current_inversion = false;
    let mut temporary_inversion = false;
    let mut matched = false;
    let mut width = 0;

    for comparison in comparisons {
        match comparison {
            Comparison::Inverse => {
                current_inversion = true;
                continue;
            }
            Comparison::TemporaryInverse => {
                temporary_inversion = true;
                continue;
            }
            Comparison::String(expected) => return compare_string(expected, input, state),
            Comparison::Reference(group) => return compare_reference(*group, input, state),
            _ => {}
        }

        let Some((cp, cp_width)) = current else {
            // Nothing left to consume.
            return ExecutionResult::Failed;
        };
        width = cp_width;

        let this_matched = match comparison {
            Comparison::AnyChar => true,
            &Comparison::Char(c) => {
                if insensitive {
                    fold_eq(cp, c)
                } else {
                    cp == c
                }
            }
            &Comparison::CharClass(class) => class.matches(cp),
            Comparison::CharRange(range) => {
                range.contains(cp)
                    || (insensitive
                        && (range.contains(simple_fold(cp)) || range.contains(simple_upper(cp))))
            }
            _ => unreachable!("Comparison handled above"),
        };

        let inverted = temporary_inversion;
        temporary_inversion = false;
        if this_matched != inverted {
            matched = true;
            break;
        }
    }

    if matched != current_inversion && width != 0 {
        state.string_position += 1;
        state.string_position_in_code_units += width;
        ExecutionResult::Continue
    } else {
        ExecutionResult::Failed
    }
}

fn compare_string(
    expected: &[u32],
    input: &mut MatchInput<'_>,
    state: &mut MatchState,
) -> ExecutionResult {
    let insensitive = input.regex_options.contains(Flags::INSENSITIVE);
    for &want in expected {
        let Some((cp, width)) = input
            .view
            .code_point_at(state.string_position_in_code_units)
        else {
            return ExecutionResult::Failed;
        };
        let eq = if insensitive {
            fold_eq(cp, want)
        } else {
            cp == want
        };
        if !eq {
            return ExecutionResult::Failed;
        }
        state.string_position += 1;
        state.string_position_in_code_units += width;
    }
    ExecutionResult::Continue
}

fn compare_reference(
    group: CaptureGroupID,
    input: &mut MatchInput<'_>,
    state: &mut MatchState,
) -> ExecutionResult {
    let index = input.match_index * state.capture_group_count + group as usize;
    let captured: Vec<u32> = match state
        .flat_capture_group_matches
        .get(index)
        .and_then(|c| c.as_ref())
    {
        // A backreference to a group that did not participate matches the
        // empty string.
        None => return ExecutionResult::Continue,
        Some(capture) => capture.text.chars().map(u32::from).collect(),
    };
    compare_string(&captured, input, state)
}

/// A compiled pattern: the instruction sequence plus everything the match
/// driver needs to know about it.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub insns: Vec<Insn>,

    pub capture_group_count: usize,
    pub named_capture_group_count: usize,

    /// Capture group names, in group order; unnamed groups have an empty
    /// string. Empty if there are no named groups.
    pub group_names: Box<[Box<str>]>,

    /// Smallest number of code units any successful match consumes.
    pub match_length_minimum: usize,

    pub checkpoint_count: usize,
    pub repeat_count: usize,

    /// Sorted, non-overlapping code point ranges a match may begin with;
    /// empty means unknown, do not filter.
    pub starting_ranges: Vec<CharRange>,

    /// The case-insensitive counterpart, ASCII case widened.
    pub starting_ranges_insensitive: Vec<CharRange>,

    /// Matches can only begin at position 0, or after a line terminator
    /// under `MULTILINE`.
    pub only_start_of_line: bool,

    /// Option bits baked in at compile time.
    pub flags: Flags,

    pub dialect: Dialect,
}

impl CompiledProgram {
    /// Approximate heap footprint of the bytecode, for cache accounting.
    pub fn byte_size(&self) -> usize {
        let mut size = self.insns.len() * core::mem::size_of::<Insn>();
        for insn in &self.insns {
            if let Insn::Compare(comparisons) = insn {
                size += comparisons.len() * core::mem::size_of::<Comparison>();
                for comparison in comparisons.iter() {
                    if let Comparison::String(s) = comparison {
                        size += s.len() * core::mem::size_of::<u32>();
                    }
                }
            }
        }
        size
    }
}
