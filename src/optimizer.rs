//! Optimization passes over emitted bytecode: the starting-range prefilter,
//! the start-of-line hint, and the atomic-loop rewrite.

use crate::insn::{CompiledProgram, Comparison, ForkForm, Insn};
use crate::types::{CharRange, IP};

pub fn run_optimization_passes(program: &mut CompiledProgram) {
    let ranges = collect_starting_ranges(program).unwrap_or_default();
    program.starting_ranges_insensitive = widen_ascii_case(&ranges).unwrap_or_default();
    program.starting_ranges = ranges;
    program.only_start_of_line = compute_only_start_of_line(program);
    attempt_rewrite_loops_as_atomic_groups(program);
}

#[inline]
fn jump_target(ip: IP, offset: isize) -> IP {
    (ip as isize + 1 + offset) as IP
}

/// Walk every path from the entry and union the code point ranges the first
/// consuming compare accepts. \return None when any path starts with a
/// comparison whose first character is unknowable (inversion, any-char,
/// backreference, lookbehind) or can succeed without consuming at all.
fn collect_starting_ranges(program: &CompiledProgram) -> Option<Vec<CharRange>> {
    let insns = &program.insns;
    let mut ranges: Vec<CharRange> = Vec::new();
    let mut visited = vec![false; insns.len()];
    let mut work: Vec<IP> = vec![0];

    while let Some(start) = work.pop() {
        let mut ip = start;
        loop {
            if ip >= insns.len() {
                return None;
            }
            if visited[ip] {
                break;
            }
            visited[ip] = true;
            match &insns[ip] {
                Insn::Compare(comparisons) => {
                    append_comparison_ranges(comparisons, &mut ranges)?;
                    break;
                }
                // Zero-width checks and bookkeeping are transparent.
                Insn::CheckBegin
                | Insn::CheckEnd
                | Insn::CheckBoundary { .. }
                | Insn::SaveLeftCaptureGroup(..)
                | Insn::SaveRightCaptureGroup(..)
                | Insn::ClearCaptureGroup(..)
                | Insn::Checkpoint(..)
                | Insn::ResetRepeat(..)
                | Insn::SaveStringPosition
                | Insn::RestoreStringPosition => ip += 1,
                &Insn::Jump { offset } => ip = jump_target(ip, offset),
                &Insn::ForkJump { offset }
                | &Insn::ForkStay { offset }
                | &Insn::ForkReplaceJump { offset }
                | &Insn::ForkReplaceStay { offset }
                | &Insn::JumpNonEmpty { offset, .. }
                | &Insn::Repeat { offset, .. } => {
                    work.push(jump_target(ip, offset));
                    ip += 1;
                }
                // A lookbehind reads before the start position.
                Insn::GoBack(..) => return None,
                // A dead path contributes nothing.
                Insn::FailForks(..) => break,
                // Succeeding without consuming means any position is viable.
                Insn::Exit => return None,
            }
        }
    }
    Some(normalize_ranges(ranges))
}

fn append_comparison_ranges(
    comparisons: &[Comparison],
    out: &mut Vec<CharRange>,
) -> Option<()> {
    for comparison in comparisons {
        match comparison {
            Comparison::Inverse
            | Comparison::TemporaryInverse
            | Comparison::AnyChar
            | Comparison::Reference(..) => return None,
            &Comparison::Char(c) => out.push(CharRange::new(c, c)),
            Comparison::String(s) => {
                let &first = s.first()?;
                out.push(CharRange::new(first, first));
            }
            &Comparison::CharClass(class) => out.extend_from_slice(class.ranges()),
            &Comparison::CharRange(range) => out.push(range),
        }
    }
    Some(())
}

/// Sort and merge overlapping or adjacent ranges.
fn normalize_ranges(mut ranges: Vec<CharRange>) -> Vec<CharRange> {
    ranges.sort_by_key(|r| r.from);
    let mut merged: Vec<CharRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.from <= last.to.saturating_add(1) => {
                last.to = last.to.max(range.to);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Widen ASCII letter ranges to cover both cases, for the insensitive twin
/// of the prefilter. \return None when a range reaches beyond ASCII, where
/// simple widening is not sound; the caller disables the filter instead.
fn widen_ascii_case(ranges: &[CharRange]) -> Option<Vec<CharRange>> {
    let mut widened: Vec<CharRange> = Vec::new();
    for &range in ranges {
        if range.to > 0x7F {
            return None;
        }
        widened.push(range);
        if let Some(overlap) = intersect(range, CharRange::new(0x41, 0x5A)) {
            widened.push(CharRange::new(overlap.from + 0x20, overlap.to + 0x20));
        }
        if let Some(overlap) = intersect(range, CharRange::new(0x61, 0x7A)) {
            widened.push(CharRange::new(overlap.from - 0x20, overlap.to - 0x20));
        }
    }
    Some(normalize_ranges(widened))
}

fn intersect(a: CharRange, b: CharRange) -> Option<CharRange> {
    let from = a.from.max(b.from);
    let to = a.to.min(b.to);
    if from <= to {
        Some(CharRange::new(from, to))
    } else {
        None
    }
}

/// \return whether every path performs a start-of-line check before
/// consuming input or succeeding.
fn compute_only_start_of_line(program: &CompiledProgram) -> bool {
    let insns = &program.insns;
    let mut visited = vec![false; insns.len()];
    let mut work: Vec<IP> = vec![0];

    while let Some(start) = work.pop() {
        let mut ip = start;
        loop {
            if ip >= insns.len() {
                return false;
            }
            if visited[ip] {
                break;
            }
            visited[ip] = true;
            match &insns[ip] {
                Insn::CheckBegin => break,
                Insn::Compare(..) | Insn::CheckEnd | Insn::GoBack(..) | Insn::Exit => {
                    return false
                }
                Insn::CheckBoundary { .. }
                | Insn::SaveLeftCaptureGroup(..)
                | Insn::SaveRightCaptureGroup(..)
                | Insn::ClearCaptureGroup(..)
                | Insn::Checkpoint(..)
                | Insn::ResetRepeat(..)
                | Insn::SaveStringPosition
                | Insn::RestoreStringPosition => ip += 1,
                &Insn::Jump { offset } => ip = jump_target(ip, offset),
                &Insn::ForkJump { offset }
                | &Insn::ForkStay { offset }
                | &Insn::ForkReplaceJump { offset }
                | &Insn::ForkReplaceStay { offset }
                | &Insn::JumpNonEmpty { offset, .. }
                | &Insn::Repeat { offset, .. } => {
                    work.push(jump_target(ip, offset));
                    ip += 1;
                }
                Insn::FailForks(..) => break,
            }
        }
    }
    true
}

/// Upgrade greedy single-compare loops to fork replacement when the loop
/// body and the following compare cannot match the same character: once the
/// body stops matching, no earlier exit can succeed either, so each
/// iteration may overwrite the previously queued exit instead of stacking
/// alternatives.
fn attempt_rewrite_loops_as_atomic_groups(program: &mut CompiledProgram) {
    // Case-insensitive matching may be requested at match time, so the
    // disjointness check also covers ASCII case widening; bail entirely on
    // non-ASCII operands.
    for ip in 0..program.insns.len() {
        let Some(Insn::Checkpoint(..)) = program.insns.get(ip) else {
            continue;
        };
        let Some(&Insn::ForkStay { offset }) = program.insns.get(ip + 1) else {
            continue;
        };
        if jump_target(ip + 1, offset) != ip + 4 {
            continue;
        }
        let Some(Insn::Compare(body)) = program.insns.get(ip + 2) else {
            continue;
        };
        let Some(&Insn::JumpNonEmpty {
            offset: back_offset,
            form: ForkForm::Jump,
            ..
        }) = program.insns.get(ip + 3)
        else {
            continue;
        };
        if jump_target(ip + 3, back_offset) != ip {
            continue;
        }
        let Some(Insn::Compare(follow)) = program.insns.get(ip + 4) else {
            continue;
        };

        let mut body_ranges = Vec::new();
        let mut follow_ranges = Vec::new();
        if append_comparison_ranges(body, &mut body_ranges).is_none()
            || append_comparison_ranges(follow, &mut follow_ranges).is_none()
        {
            continue;
        }
        let (Some(body_ranges), Some(follow_ranges)) = (
            widen_ascii_case(&body_ranges),
            widen_ascii_case(&follow_ranges),
        ) else {
            continue;
        };
        let disjoint = body_ranges
            .iter()
            .all(|a| follow_ranges.iter().all(|b| intersect(*a, *b).is_none()));
        if disjoint {
            program.insns[ip + 1] = Insn::ForkReplaceStay { offset };
        }
    }
}
