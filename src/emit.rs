//! Lowering from IR to bytecode.

use crate::api::{Dialect, Flags};
use crate::insn::{CompiledProgram, Comparison, ForkForm, Insn};
use crate::ir::{AnchorType, BracketContents, ClassItem, LookAround, Node, Quantifier};
use crate::parse::ParseResult;
use crate::types::{CaptureGroupID, CheckpointID, RepeatID, IP, MAX_LOOPS};

/// Emit the program for a parsed pattern.
/// The starting-range fields are left empty for the optimizer to fill.
pub fn emit(parsed: &ParseResult, flags: Flags, dialect: Dialect) -> CompiledProgram {
    let mut emitter = Emitter {
        insns: Vec::new(),
        flags,
        next_checkpoint: 0,
        next_repeat: 0,
    };
    emitter.compile_node(&parsed.node);
    emitter.insns.push(Insn::Exit);

    let group_names: Box<[Box<str>]> = parsed
        .group_names
        .iter()
        .map(|name| name.clone().into_boxed_str())
        .collect();

    CompiledProgram {
        insns: emitter.insns,
        capture_group_count: parsed.capture_group_count,
        named_capture_group_count: parsed.named_capture_group_count,
        group_names,
        match_length_minimum: parsed.node.match_length_minimum(),
        checkpoint_count: emitter.next_checkpoint,
        repeat_count: emitter.next_repeat,
        starting_ranges: Vec::new(),
        starting_ranges_insensitive: Vec::new(),
        only_start_of_line: false,
        flags,
        dialect,
    }
}

struct Emitter {
    insns: Vec<Insn>,
    flags: Flags,
    next_checkpoint: usize,
    next_repeat: usize,
}

impl Emitter {
    fn here(&self) -> IP {
        self.insns.len()
    }

    fn push(&mut self, insn: Insn) -> IP {
        let ip = self.insns.len();
        self.insns.push(insn);
        ip
    }

    /// Point the control-transfer instruction at \p ip to \p target.
    /// All offsets are relative to the slot after the instruction.
    fn patch(&mut self, ip: IP, target: IP) {
        let relative = target as isize - ip as isize - 1;
        match &mut self.insns[ip] {
            Insn::Jump { offset }
            | Insn::ForkJump { offset }
            | Insn::ForkStay { offset }
            | Insn::ForkReplaceJump { offset }
            | Insn::ForkReplaceStay { offset }
            | Insn::JumpNonEmpty { offset, .. }
            | Insn::Repeat { offset, .. } => *offset = relative,
            other => unreachable!("Not a control transfer: {:?}", other),
        }
    }

    fn allocate_checkpoint(&mut self) -> CheckpointID {
        debug_assert!(self.next_checkpoint < MAX_LOOPS);
        let id = self.next_checkpoint as CheckpointID;
        self.next_checkpoint += 1;
        id
    }

    fn allocate_repeat(&mut self) -> RepeatID {
        debug_assert!(self.next_repeat < MAX_LOOPS);
        let id = self.next_repeat as RepeatID;
        self.next_repeat += 1;
        id
    }

    fn compile_node(&mut self, node: &Node) {
        match node {
            Node::Empty => {}

            &Node::Char(c) => {
                self.push(Insn::Compare(Box::new([Comparison::Char(c)])));
            }

            Node::AnyChar => {
                if self.flags.contains(Flags::DOT_ALL) {
                    self.push(Insn::Compare(Box::new([Comparison::AnyChar])));
                } else {
                    self.push(Insn::Compare(Box::new([
                        Comparison::Inverse,
                        Comparison::Char(0xA),
                        Comparison::Char(0xD),
                        Comparison::Char(0x2028),
                        Comparison::Char(0x2029),
                    ])));
                }
            }

            Node::Bracket(contents) => {
                self.push(Insn::Compare(compile_bracket(contents)));
            }

            Node::Anchor(AnchorType::StartOfLine) => {
                self.push(Insn::CheckBegin);
            }

            Node::Anchor(AnchorType::EndOfLine) => {
                self.push(Insn::CheckEnd);
            }

            &Node::WordBoundary { invert } => {
                self.push(Insn::CheckBoundary { inverted: invert });
            }

            Node::Cat(nodes) => {
                // Coalesce literal runs into single string compares.
                let mut run: Vec<u32> = Vec::new();
                for node in nodes {
                    if let Node::Char(c) = node {
                        run.push(*c);
                        continue;
                    }
                    self.flush_literal_run(&mut run);
                    self.compile_node(node);
                }
                self.flush_literal_run(&mut run);
            }

            Node::Alt(alternatives) => {
                let mut end_jumps: Vec<IP> = Vec::new();
                for (index, alternative) in alternatives.iter().enumerate() {
                    if index + 1 < alternatives.len() {
                        let fork = self.push(Insn::ForkStay { offset: 0 });
                        self.compile_node(alternative);
                        end_jumps.push(self.push(Insn::Jump { offset: 0 }));
                        let next = self.here();
                        self.patch(fork, next);
                    } else {
                        self.compile_node(alternative);
                    }
                }
                let end = self.here();
                for jump in end_jumps {
                    self.patch(jump, end);
                }
            }

            Node::Loop { loopee, quant } => self.compile_loop(loopee, *quant),

            Node::CaptureGroup(body, group) | Node::NamedCaptureGroup(body, group, _) => {
                self.push(Insn::SaveLeftCaptureGroup(*group));
                self.compile_node(body);
                self.push(Insn::SaveRightCaptureGroup(*group));
            }

            Node::Group(body) => self.compile_node(body),

            &Node::BackRef(group) => {
                self.push(Insn::Compare(Box::new([Comparison::Reference(group)])));
            }

            Node::LookaroundAssertion { kind, contents } => {
                self.compile_lookaround(*kind, contents);
            }
        }
    }

    fn flush_literal_run(&mut self, run: &mut Vec<u32>) {
        match run.len() {
            0 => {}
            1 => {
                self.push(Insn::Compare(Box::new([Comparison::Char(run[0])])));
            }
            _ => {
                self.push(Insn::Compare(Box::new([Comparison::String(
                    run.as_slice().into(),
                )])));
            }
        }
        run.clear();
    }

    fn compile_loop(&mut self, loopee: &Node, quant: Quantifier) {
        let mut enclosed: Vec<CaptureGroupID> = Vec::new();
        loopee.collect_capture_groups(&mut enclosed);

        match quant.max {
            Some(max) => {
                self.emit_exact(loopee, &enclosed, quant.min);
                let optional = max - quant.min;
                let mut forks: Vec<IP> = Vec::new();
                for _ in 0..optional {
                    let fork = if quant.greedy {
                        self.push(Insn::ForkStay { offset: 0 })
                    } else {
                        self.push(Insn::ForkJump { offset: 0 })
                    };
                    forks.push(fork);
                    self.emit_loop_body(loopee, &enclosed);
                }
                let end = self.here();
                for fork in forks {
                    self.patch(fork, end);
                }
            }
            None => {
                if quant.min == 0 {
                    self.emit_star(loopee, &enclosed, quant);
                } else {
                    self.emit_exact(loopee, &enclosed, quant.min - 1);
                    self.emit_min_one(loopee, &enclosed, quant);
                }
            }
        }
    }

    /// The loop body, with each contained capture group reset first so an
    /// iteration never observes captures from the previous one.
    fn emit_loop_body(&mut self, loopee: &Node, enclosed: &[CaptureGroupID]) {
        for &group in enclosed {
            self.push(Insn::ClearCaptureGroup(group));
        }
        self.compile_node(loopee);
    }

    /// Emit exactly \p count iterations.
    fn emit_exact(&mut self, loopee: &Node, enclosed: &[CaptureGroupID], count: usize) {
        match count {
            0 => {}
            1 => self.emit_loop_body(loopee, enclosed),
            _ => {
                let id = self.allocate_repeat();
                self.push(Insn::ResetRepeat(id));
                let body = self.here();
                self.emit_loop_body(loopee, enclosed);
                let repeat = self.push(Insn::Repeat {
                    offset: 0,
                    count: count - 1,
                    id,
                });
                self.patch(repeat, body);
            }
        }
    }

    /// `{0,∞}`:
    ///   START: CHECKPOINT c
    ///          FORKSTAY END          (greedy; FORKJUMP when lazy,
    ///                                 FORKREPLACESTAY when possessive)
    ///          <body>
    ///          JUMP_NONEMPTY c START
    ///   END:
    fn emit_star(&mut self, loopee: &Node, enclosed: &[CaptureGroupID], quant: Quantifier) {
        let checkpoint = self.allocate_checkpoint();
        let start = self.here();
        self.push(Insn::Checkpoint(checkpoint));
        let fork = if quant.possessive {
            self.push(Insn::ForkReplaceStay { offset: 0 })
        } else if quant.greedy {
            self.push(Insn::ForkStay { offset: 0 })
        } else {
            self.push(Insn::ForkJump { offset: 0 })
        };
        self.emit_loop_body(loopee, enclosed);
        let back = self.push(Insn::JumpNonEmpty {
            offset: 0,
            checkpoint,
            form: ForkForm::Jump,
        });
        self.patch(back, start);
        let end = self.here();
        self.patch(fork, end);
    }

    /// `{1,∞}`, single body emission:
    ///   START: CHECKPOINT c
    ///          <body>
    ///          JUMP_NONEMPTY c START (ForkJump when greedy, ForkStay when
    ///                                 lazy, ForkReplaceJump when possessive)
    fn emit_min_one(&mut self, loopee: &Node, enclosed: &[CaptureGroupID], quant: Quantifier) {
        let checkpoint = self.allocate_checkpoint();
        let start = self.here();
        self.push(Insn::Checkpoint(checkpoint));
        self.emit_loop_body(loopee, enclosed);
        let form = if quant.possessive {
            ForkForm::ForkReplaceJump
        } else if quant.greedy {
            ForkForm::ForkJump
        } else {
            ForkForm::ForkStay
        };
        let back = self.push(Insn::JumpNonEmpty {
            offset: 0,
            checkpoint,
            form,
        });
        self.patch(back, start);
    }

    fn compile_lookaround(&mut self, kind: LookAround, contents: &Node) {
        match kind {
            LookAround::LookAhead => {
                self.push(Insn::SaveStringPosition);
                self.compile_node(contents);
                self.push(Insn::RestoreStringPosition);
            }
            LookAround::LookBehind => {
                self.push(Insn::SaveStringPosition);
                self.push(Insn::GoBack(contents.match_length_minimum()));
                self.compile_node(contents);
                self.push(Insn::RestoreStringPosition);
            }
            LookAround::NegatedLookAhead | LookAround::NegatedLookBehind => {
                // Distribute a top-level alternation so each negated branch
                // runs the two-level fail protocol on its own.
                match contents {
                    Node::Alt(branches) => {
                        for branch in branches {
                            self.emit_negated_branch(branch, kind.is_behind());
                        }
                    }
                    _ => self.emit_negated_branch(contents, kind.is_behind()),
                }
            }
        }
    }

    /// One negated lookaround branch:
    ///   JUMP _A
    ///   _L: [GOBACK n] <body> FAILFORKS 2
    ///   _A: SAVE
    ///       FORKJUMP _L
    ///       RESTORE
    ///
    /// If the body matches, `FAILFORKS 2` fails that path and spends the
    /// queued restore continuation through the fail counter; if the body
    /// fails, the restore continuation resumes after the assertion.
    fn emit_negated_branch(&mut self, body: &Node, behind: bool) {
        let jump_over = self.push(Insn::Jump { offset: 0 });
        let body_label = self.here();
        if behind {
            self.push(Insn::GoBack(body.match_length_minimum()));
        }
        self.compile_node(body);
        self.push(Insn::FailForks(2));
        let after = self.here();
        self.patch(jump_over, after);
        self.push(Insn::SaveStringPosition);
        let fork = self.push(Insn::ForkJump { offset: 0 });
        self.patch(fork, body_label);
        self.push(Insn::RestoreStringPosition);
    }
}

fn compile_bracket(contents: &BracketContents) -> Box<[Comparison]> {
    // An inverted empty bracket matches any character.
    if contents.invert && contents.items.is_empty() {
        return Box::new([Comparison::AnyChar]);
    }
    let mut comparisons: Vec<Comparison> = Vec::new();
    if contents.invert {
        comparisons.push(Comparison::Inverse);
    }
    for item in &contents.items {
        match item {
            &ClassItem::Char(c) => comparisons.push(Comparison::Char(c)),
            &ClassItem::Range(range) => comparisons.push(Comparison::CharRange(range)),
            &ClassItem::Class {
                class_type,
                positive,
            } => {
                if !positive {
                    comparisons.push(Comparison::TemporaryInverse);
                }
                comparisons.push(Comparison::CharClass(class_type));
            }
        }
    }
    comparisons.into_boxed_slice()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn emit_pattern(pattern: &str) -> CompiledProgram {
        let parsed = parse::parse(pattern, Dialect::Ecma262, Flags::default()).unwrap();
        emit(&parsed, Flags::default(), Dialect::Ecma262)
    }

    #[test]
    fn programs_end_with_exit() {
        for pattern in ["", "a", "a|b", "a(b+)c", "(?=x)y"] {
            let program = emit_pattern(pattern);
            assert!(matches!(program.insns.last(), Some(Insn::Exit)));
        }
    }

    #[test]
    fn literal_runs_coalesce() {
        let program = emit_pattern("abc");
        let compares: Vec<_> = program
            .insns
            .iter()
            .filter(|insn| matches!(insn, Insn::Compare(..)))
            .collect();
        assert_eq!(compares.len(), 1);
        match compares[0] {
            Insn::Compare(args) => {
                assert!(matches!(&args[0], Comparison::String(s) if s.len() == 3))
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn star_emits_checkpointed_loop() {
        let program = emit_pattern("a*");
        assert!(program
            .insns
            .iter()
            .any(|insn| matches!(insn, Insn::Checkpoint(..))));
        assert!(program
            .insns
            .iter()
            .any(|insn| matches!(insn, Insn::JumpNonEmpty { .. })));
        assert_eq!(program.checkpoint_count, 1);
    }

    #[test]
    fn exact_repetition_uses_repeat() {
        let program = emit_pattern("a{3}");
        assert!(program
            .insns
            .iter()
            .any(|insn| matches!(insn, Insn::Repeat { count: 2, .. })));
        assert_eq!(program.repeat_count, 1);
    }

    #[test]
    fn possessive_star_uses_fork_replace() {
        let parsed = parse::parse("a*+b", Dialect::Ecma262, Flags::default()).unwrap();
        let program = emit(&parsed, Flags::default(), Dialect::Ecma262);
        assert!(program
            .insns
            .iter()
            .any(|insn| matches!(insn, Insn::ForkReplaceStay { .. })));
    }

    #[test]
    fn min_match_lengths() {
        assert_eq!(emit_pattern("a(b+)c").match_length_minimum, 3);
        assert_eq!(emit_pattern(".*").match_length_minimum, 0);
        assert_eq!(emit_pattern("x{2,4}").match_length_minimum, 2);
    }
}
