//! Per-call input and per-path match state.

use crate::api::{Flags, Match};
use crate::input::RegexStringView;
use crate::types::IP;
use smallvec::SmallVec;

/// Per-call mutable bookkeeping shared by every state of one match call.
#[derive(Debug)]
pub struct MatchInput<'a> {
    /// The view currently being matched.
    pub view: RegexStringView<'a>,

    /// Zero-based line of the current view.
    pub line: usize,

    pub column: usize,

    /// Index of the match being attempted; selects the capture group row.
    pub match_index: usize,

    /// Offset of the current view from the beginning of the first view.
    pub global_offset: usize,

    /// The effective option mask for this call.
    pub regex_options: Flags,

    /// Start position within the first attempted view.
    pub start_offset: usize,

    /// While non-zero, the next executed opcode reports
    /// `FailedExecuteLowPrioForks` instead of running; set by `FailForks`
    /// to pre-schedule a retry depth.
    pub fail_counter: usize,

    /// When set, the next fork overwrites the newest queued state whose
    /// `initiating_fork` equals this value, instead of appending.
    pub fork_to_replace: Option<IP>,

    /// Position stack for lookaround save/restore, in code points and code
    /// units.
    pub saved_positions: SmallVec<[usize; 8]>,
    pub saved_code_unit_positions: SmallVec<[usize; 8]>,
}

impl<'a> MatchInput<'a> {
    pub fn new(view: RegexStringView<'a>, regex_options: Flags, start_offset: usize) -> Self {
        MatchInput {
            view,
            line: 0,
            column: 0,
            match_index: 0,
            global_offset: 0,
            regex_options,
            start_offset,
            fail_counter: 0,
            fork_to_replace: None,
            saved_positions: SmallVec::new(),
            saved_code_unit_positions: SmallVec::new(),
        }
    }
}

/// The state of one candidate path through the program.
///
/// States are cheap-ish to clone; every fork queues a clone, so the hot
/// fields live in small vectors.
#[derive(Debug, Clone)]
pub struct MatchState {
    /// Current position, in code points.
    pub string_position: usize,

    /// Current position, in code units. Equal to `string_position` except
    /// after consuming a multi-unit code point.
    pub string_position_in_code_units: usize,

    /// Offset of the next opcode to execute.
    pub instruction_position: IP,

    /// Branch target of the most recent fork opcode.
    pub fork_at_position: IP,

    /// Offset of the opcode that queued this state; the identity token for
    /// fork replacement.
    pub initiating_fork: IP,

    /// Per-loop iteration counters.
    pub repetition_marks: SmallVec<[usize; 4]>,

    /// Per-loop entry positions, used to reject empty iterations.
    pub checkpoints: SmallVec<[usize; 4]>,

    /// Open capture groups: the code-unit position their left bound was
    /// recorded at.
    pub capture_group_starts: Vec<Option<usize>>,

    pub capture_group_count: usize,

    /// Completed matches, one per match index.
    pub matches: Vec<Match>,

    /// Capture groups of all matches, flattened; grown on demand.
    pub flat_capture_group_matches: Vec<Option<Match>>,
}

impl MatchState {
    pub fn new(capture_group_count: usize, checkpoint_count: usize, repeat_count: usize) -> Self {
        MatchState {
            string_position: 0,
            string_position_in_code_units: 0,
            instruction_position: 0,
            fork_at_position: 0,
            initiating_fork: 0,
            repetition_marks: smallvec::smallvec![0; repeat_count],
            checkpoints: smallvec::smallvec![0; checkpoint_count],
            capture_group_starts: vec![None; capture_group_count],
            capture_group_count,
            matches: Vec::new(),
            flat_capture_group_matches: Vec::new(),
        }
    }

    /// Reset for a fresh attempt at \p position, recording into the capture
    /// row of \p match_index. The row is cleared so a previous failed
    /// attempt cannot leak captures into this one.
    pub fn reset_for_attempt(&mut self, position: usize, match_index: usize) {
        self.string_position = position;
        self.string_position_in_code_units = position;
        self.instruction_position = 0;
        self.repetition_marks.fill(0);
        self.capture_group_starts.fill(None);
        let row = match_index * self.capture_group_count;
        for index in row..(row + self.capture_group_count) {
            if let Some(slot) = self.flat_capture_group_matches.get_mut(index) {
                *slot = None;
            }
        }
    }

    /// A fingerprint of every field that affects future execution.
    /// Two states with equal fingerprints are treated as equivalent for
    /// cycle cutting, so under-hashing here risks dropping live paths while
    /// over-hashing only costs retries.
    pub fn u64_hash(&self) -> u64 {
        let mut h = Fnv::new();
        h.add(self.string_position as u64);
        h.add(self.string_position_in_code_units as u64);
        h.add(self.instruction_position as u64);
        h.add(self.fork_at_position as u64);
        for &mark in &self.repetition_marks {
            h.add(mark as u64);
        }
        for &checkpoint in &self.checkpoints {
            h.add(checkpoint as u64);
        }
        for start in &self.capture_group_starts {
            h.add(match start {
                Some(position) => *position as u64 + 1,
                None => 0,
            });
        }
        h.add(self.matches.len() as u64);
        for capture in &self.flat_capture_group_matches {
            match capture {
                Some(m) => {
                    h.add(m.column as u64 + 1);
                    h.add(m.text.len() as u64);
                }
                None => h.add(0),
            }
        }
        h.finish()
    }
}

/// FNV-1a over u64 words.
struct Fnv(u64);

impl Fnv {
    fn new() -> Fnv {
        Fnv(0xcbf2_9ce4_8422_2325)
    }

    #[inline]
    fn add(&mut self, value: u64) {
        for byte in value.to_le_bytes() {
            self.0 ^= byte as u64;
            self.0 = self.0.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_reflects_positions() {
        let mut a = MatchState::new(1, 1, 1);
        let b = a.clone();
        assert_eq!(a.u64_hash(), b.u64_hash());

        a.string_position += 1;
        a.string_position_in_code_units += 1;
        assert_ne!(a.u64_hash(), b.u64_hash());
    }

    #[test]
    fn fingerprint_reflects_marks_and_captures() {
        let mut a = MatchState::new(1, 1, 1);
        let b = a.clone();
        a.repetition_marks[0] = 2;
        assert_ne!(a.u64_hash(), b.u64_hash());

        let mut c = b.clone();
        c.capture_group_starts[0] = Some(0);
        assert_ne!(b.u64_hash(), c.u64_hash());

        let mut d = b.clone();
        d.flat_capture_group_matches
            .push(Some(Match::new("x".to_string(), 0, 0, 0)));
        assert_ne!(b.u64_hash(), d.u64_hash());
    }
}
