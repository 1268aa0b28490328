//! Parsers from pattern text to IR.

use crate::api::{Dialect, Flags};
use crate::ir::{
    make_alt, make_cat, AnchorType, BracketContents, ClassItem, LookAround, Node, NodeList,
};
use crate::types::{CaptureGroupID, CharRange, CharacterClassType, MAX_CAPTURE_GROUPS};

use core::fmt;

/// The kinds of compile error, with their diagnostic messages.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("Pattern ended unexpectedly")]
    UnexpectedEnd,
    #[error("Mismatching parenthesis")]
    MismatchingParen,
    #[error("Mismatching bracket")]
    MismatchingBracket,
    #[error("Invalid character class")]
    InvalidCharacterClass,
    #[error("Invalid range in character class")]
    InvalidRange,
    #[error("Invalid repetition marker")]
    InvalidRepetitionMarker,
    #[error("Invalid capture group")]
    InvalidCaptureGroup,
    #[error("Invalid name for capture group")]
    InvalidNameForCaptureGroup,
    #[error("Duplicate named capture group")]
    DuplicateNamedCaptureGroup,
    #[error("Reference to undefined group")]
    InvalidBackReference,
    #[error("Lookbehind contents are not fixed length")]
    VariableLengthLookBehind,
    #[error("Trailing escape")]
    InvalidTrailingEscape,
    #[error("Invalid escape")]
    InvalidEscape,
    #[error("Too many capture groups")]
    TooManyCaptureGroups,
}

/// Represents an error encountered during pattern compilation.
/// Carries the offending pattern and the position of the error token so the
/// diagnostic can point at it.
#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub position: usize,
    pub pattern: String,
}

impl Error {
    /// Render the pointer-annotated diagnostic:
    /// a header, the pattern, and a caret line with the message (\p message
    /// overrides the kind's default text).
    pub fn error_string(&self, message: Option<&str>) -> String {
        let mut out = String::new();
        out.push_str("Error during parsing of regular expression:\n");
        out.push_str("    ");
        out.push_str(&self.pattern);
        out.push_str("\n    ");
        for _ in 0..self.position {
            out.push(' ');
        }
        match message {
            Some(message) => out.push_str(&format!("^---- {}", message)),
            None => out.push_str(&format!("^---- {}", self.kind)),
        }
        out
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.error_string(None))
    }
}

impl std::error::Error for Error {}

/// The output of a successful parse.
#[derive(Debug)]
pub struct ParseResult {
    pub node: Node,
    pub capture_group_count: usize,
    pub named_capture_group_count: usize,
    /// Group names in group order, empty strings for unnamed groups;
    /// empty when there are no named groups at all.
    pub group_names: Vec<String>,
}

/// Parse \p pattern in the given dialect.
pub fn parse(pattern: &str, dialect: Dialect, flags: Flags) -> Result<ParseResult, Error> {
    let input: Vec<char> = pattern.chars().collect();
    let (group_count, group_names) = prescan_groups(pattern, &input, dialect)?;
    let named_capture_group_count = group_names.iter().filter(|n| !n.is_empty()).count();
    let mut parser = Parser {
        input,
        position: 0,
        pattern,
        dialect,
        flags,
        total_groups: group_count,
        group_names: &group_names,
        next_group: 0,
    };
    let node = parser.parse_disjunction()?;
    if !parser.at_end() {
        // The only way to stop early is an unbalanced ')'.
        return parser.error(ErrorKind::MismatchingParen);
    }
    debug_assert!(parser.next_group == group_count, "Group prescan mismatch");
    Ok(ParseResult {
        node,
        capture_group_count: group_count,
        named_capture_group_count,
        group_names: if named_capture_group_count == 0 {
            Vec::new()
        } else {
            group_names
        },
    })
}

/// Count capture groups and collect group names ahead of the parse, so
/// forward references (`\2(b)`, `\k<late>(?<late>x)`) resolve in one pass.
fn prescan_groups(
    pattern: &str,
    input: &[char],
    dialect: Dialect,
) -> Result<(usize, Vec<String>), Error> {
    let mut names: Vec<String> = Vec::new();
    let mut in_class = false;
    let mut i = 0;
    while i < input.len() {
        match input[i] {
            '\\' => i += 2,
            '[' if !in_class => {
                in_class = true;
                i += 1;
            }
            ']' if in_class => {
                in_class = false;
                i += 1;
            }
            '(' if !in_class => {
                i += 1;
                if dialect == Dialect::PosixExtended {
                    names.push(String::new());
                    continue;
                }
                if input.get(i) != Some(&'?') {
                    names.push(String::new());
                    continue;
                }
                // A named group is "(?<" not followed by '=' or '!'.
                if input.get(i + 1) == Some(&'<')
                    && !matches!(input.get(i + 2), Some('=') | Some('!'))
                {
                    let name_start = i + 2;
                    let mut j = name_start;
                    while j < input.len() && input[j] != '>' {
                        j += 1;
                    }
                    if j == input.len() {
                        return Err(Error {
                            kind: ErrorKind::InvalidNameForCaptureGroup,
                            position: name_start,
                            pattern: pattern.to_string(),
                        });
                    }
                    let name: String = input[name_start..j].iter().collect();
                    if !is_valid_group_name(&name) {
                        return Err(Error {
                            kind: ErrorKind::InvalidNameForCaptureGroup,
                            position: name_start,
                            pattern: pattern.to_string(),
                        });
                    }
                    if names.iter().any(|n| *n == name) {
                        return Err(Error {
                            kind: ErrorKind::DuplicateNamedCaptureGroup,
                            position: name_start,
                            pattern: pattern.to_string(),
                        });
                    }
                    names.push(name);
                    i = j + 1;
                }
            }
            _ => i += 1,
        }
    }
    if names.len() > MAX_CAPTURE_GROUPS {
        return Err(Error {
            kind: ErrorKind::TooManyCaptureGroups,
            position: 0,
            pattern: pattern.to_string(),
        });
    }
    Ok((names.len(), names))
}

fn is_valid_group_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if first.is_ascii_digit() {
        return false;
    }
    core::iter::once(first)
        .chain(chars)
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

struct Parser<'p> {
    input: Vec<char>,
    position: usize,
    pattern: &'p str,
    dialect: Dialect,
    flags: Flags,
    total_groups: usize,
    group_names: &'p [String],
    next_group: usize,
}

impl<'p> Parser<'p> {
    fn at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_at(&self, lookahead: usize) -> Option<char> {
        self.input.get(self.position + lookahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += 1;
        Some(c)
    }

    fn try_eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn error<T>(&self, kind: ErrorKind) -> Result<T, Error> {
        self.error_at(kind, self.position)
    }

    fn error_at<T>(&self, kind: ErrorKind, position: usize) -> Result<T, Error> {
        Err(Error {
            kind,
            position: position.min(self.input.len()),
            pattern: self.pattern.to_string(),
        })
    }

    fn parse_disjunction(&mut self) -> Result<Node, Error> {
        let mut alternatives: NodeList = vec![self.parse_alternative()?];
        while self.try_eat('|') {
            alternatives.push(self.parse_alternative()?);
        }
        Ok(make_alt(alternatives))
    }

    fn parse_alternative(&mut self) -> Result<Node, Error> {
        let mut nodes: NodeList = Vec::new();
        while let Some(node) = self.parse_term()? {
            nodes.push(node);
        }
        Ok(make_cat(nodes))
    }

    /// Parse one term, or None at the end of an alternative.
    fn parse_term(&mut self) -> Result<Option<Node>, Error> {
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        match c {
            '|' | ')' => return Ok(None),
            '^' => {
                self.position += 1;
                self.reject_quantifier()?;
                return Ok(Some(Node::Anchor(AnchorType::StartOfLine)));
            }
            '$' => {
                self.position += 1;
                self.reject_quantifier()?;
                return Ok(Some(Node::Anchor(AnchorType::EndOfLine)));
            }
            _ => {}
        }

        // Assertions are not quantifiable; everything else may carry a
        // quantifier.
        let (atom, quantifiable) = self.parse_atom()?;
        if !quantifiable {
            self.reject_quantifier()?;
            return Ok(Some(atom));
        }
        Ok(Some(self.parse_quantifier(atom)?))
    }

    /// \return a quantifier-position error if a quantifier follows.
    fn reject_quantifier(&self) -> Result<(), Error> {
        match self.peek() {
            Some('*') | Some('+') | Some('?') => self.error(ErrorKind::InvalidRepetitionMarker),
            Some('{') if self.scan_brace_quantifier().is_some() => {
                self.error(ErrorKind::InvalidRepetitionMarker)
            }
            _ => Ok(()),
        }
    }

    /// Parse one atom. \return the node and whether it is quantifiable.
    fn parse_atom(&mut self) -> Result<(Node, bool), Error> {
        let start = self.position;
        let c = match self.bump() {
            Some(c) => c,
            None => return self.error(ErrorKind::UnexpectedEnd),
        };
        match c {
            '(' => self.parse_group(start),
            '[' => Ok((self.parse_class(start)?, true)),
            '\\' => self.parse_atom_escape(start),
            '.' => Ok((Node::AnyChar, true)),
            '*' | '+' | '?' => self.error_at(ErrorKind::InvalidRepetitionMarker, start),
            '{' => {
                self.position = start;
                if self.scan_brace_quantifier().is_some() {
                    return self.error_at(ErrorKind::InvalidRepetitionMarker, start);
                }
                // Not a valid bound: '{' is a literal.
                self.position = start + 1;
                Ok((Node::Char('{' as u32), true))
            }
            ']' | '}' => Ok((Node::Char(c as u32), true)),
            _ => Ok((Node::Char(c as u32), true)),
        }
    }

    fn parse_group(&mut self, start: usize) -> Result<(Node, bool), Error> {
        if self.dialect == Dialect::PosixExtended {
            // ERE has no "(?" extensions; a '?' here has nothing to repeat.
            if self.peek() == Some('?') {
                return self.error(ErrorKind::InvalidRepetitionMarker);
            }
            let group = self.allocate_group(start)?;
            let body = self.parse_disjunction()?;
            if !self.try_eat(')') {
                return self.error_at(ErrorKind::MismatchingParen, start);
            }
            return Ok((Node::CaptureGroup(Box::new(body), group), true));
        }

        if !self.try_eat('?') {
            let group = self.allocate_group(start)?;
            let body = self.parse_disjunction()?;
            if !self.try_eat(')') {
                return self.error_at(ErrorKind::MismatchingParen, start);
            }
            return Ok((Node::CaptureGroup(Box::new(body), group), true));
        }

        match self.peek() {
            Some(':') => {
                self.position += 1;
                let body = self.parse_disjunction()?;
                if !self.try_eat(')') {
                    return self.error_at(ErrorKind::MismatchingParen, start);
                }
                Ok((Node::Group(Box::new(body)), true))
            }
            Some('=') => {
                self.position += 1;
                self.parse_lookaround(start, LookAround::LookAhead)
            }
            Some('!') => {
                self.position += 1;
                self.parse_lookaround(start, LookAround::NegatedLookAhead)
            }
            Some('<') => match self.peek_at(1) {
                Some('=') => {
                    self.position += 2;
                    self.parse_lookaround(start, LookAround::LookBehind)
                }
                Some('!') => {
                    self.position += 2;
                    self.parse_lookaround(start, LookAround::NegatedLookBehind)
                }
                _ => {
                    // A named group; the name was validated by the prescan.
                    self.position += 1;
                    let name_start = self.position;
                    while self.peek() != Some('>') {
                        if self.at_end() {
                            return self.error_at(
                                ErrorKind::InvalidNameForCaptureGroup,
                                name_start,
                            );
                        }
                        self.position += 1;
                    }
                    let name: String = self.input[name_start..self.position].iter().collect();
                    self.position += 1;
                    let group = self.allocate_group(start)?;
                    let body = self.parse_disjunction()?;
                    if !self.try_eat(')') {
                        return self.error_at(ErrorKind::MismatchingParen, start);
                    }
                    Ok((
                        Node::NamedCaptureGroup(Box::new(body), group, name),
                        true,
                    ))
                }
            },
            _ => self.error(ErrorKind::InvalidCaptureGroup),
        }
    }

    fn parse_lookaround(
        &mut self,
        start: usize,
        kind: LookAround,
    ) -> Result<(Node, bool), Error> {
        let body = self.parse_disjunction()?;
        if !self.try_eat(')') {
            return self.error_at(ErrorKind::MismatchingParen, start);
        }
        if kind.is_behind() {
            let min = body.match_length_minimum();
            if body.match_length_maximum() != Some(min) {
                return self.error_at(ErrorKind::VariableLengthLookBehind, start);
            }
        }
        Ok((
            Node::LookaroundAssertion {
                kind,
                contents: Box::new(body),
            },
            false,
        ))
    }

    fn allocate_group(&mut self, start: usize) -> Result<CaptureGroupID, Error> {
        if self.next_group >= self.total_groups {
            // The prescan and the parser disagree; treat as malformed.
            return self.error_at(ErrorKind::InvalidCaptureGroup, start);
        }
        let id = self.next_group as CaptureGroupID;
        self.next_group += 1;
        Ok(id)
    }

    /// Scan a `{n}`/`{n,}`/`{n,m}` bound without consuming it.
    /// \return the position one past the closing brace and the bounds, or
    /// None if the text at the cursor is not a valid bound.
    fn scan_brace_quantifier(&self) -> Option<(usize, usize, Option<usize>)> {
        let mut i = self.position;
        if self.input.get(i) != Some(&'{') {
            return None;
        }
        i += 1;
        let (min, next) = scan_number(&self.input, i)?;
        i = next;
        let max = match self.input.get(i) {
            Some('}') => Some(min),
            Some(',') => {
                i += 1;
                match self.input.get(i) {
                    Some('}') => None,
                    _ => {
                        let (max, next) = scan_number(&self.input, i)?;
                        i = next;
                        if self.input.get(i) != Some(&'}') {
                            return None;
                        }
                        Some(max)
                    }
                }
            }
            _ => return None,
        };
        Some((i + 1, min, max))
    }

    fn parse_quantifier(&mut self, atom: Node) -> Result<Node, Error> {
        let start = self.position;
        let (min, max) = match self.peek() {
            Some('*') => {
                self.position += 1;
                (0, None)
            }
            Some('+') => {
                self.position += 1;
                (1, None)
            }
            Some('?') => {
                self.position += 1;
                (0, Some(1))
            }
            Some('{') => match self.scan_brace_quantifier() {
                Some((end, min, max)) => {
                    self.position = end;
                    (min, max)
                }
                None => return Ok(atom),
            },
            _ => return Ok(atom),
        };

        if let Some(max) = max {
            if min > max {
                return self.error_at(ErrorKind::InvalidRepetitionMarker, start);
            }
        }

        let mut greedy = true;
        let mut possessive = false;
        if self.dialect == Dialect::Ecma262 {
            if self.try_eat('?') {
                greedy = false;
            } else if max.is_none() && self.try_eat('+') {
                // Possessive suffix, accepted on unbounded loops only.
                possessive = true;
            }
        }

        // A second quantifier has nothing to repeat.
        self.reject_quantifier()?;

        Ok(Node::Loop {
            loopee: Box::new(atom),
            quant: crate::ir::Quantifier {
                min,
                max,
                greedy,
                possessive,
            },
        })
    }

    fn parse_atom_escape(&mut self, start: usize) -> Result<(Node, bool), Error> {
        let c = match self.bump() {
            Some(c) => c,
            None => return self.error_at(ErrorKind::InvalidTrailingEscape, start),
        };
        match c {
            'b' => Ok((Node::WordBoundary { invert: false }, false)),
            'B' => Ok((Node::WordBoundary { invert: true }, false)),
            'd' | 'D' | 'w' | 'W' | 's' | 'S' => {
                Ok((class_escape_node(c), true))
            }
            '1'..='9' => {
                self.position -= 1;
                let (number, next) = match scan_number(&self.input, self.position) {
                    Some(scanned) => scanned,
                    None => return self.error_at(ErrorKind::InvalidBackReference, start),
                };
                self.position = next;
                if number == 0 || number > self.total_groups {
                    return self.error_at(ErrorKind::InvalidBackReference, start);
                }
                Ok((Node::BackRef((number - 1) as CaptureGroupID), true))
            }
            'k' if self.dialect == Dialect::Ecma262 => {
                if !self.try_eat('<') {
                    return self.error_at(ErrorKind::InvalidBackReference, start);
                }
                let name_start = self.position;
                while self.peek() != Some('>') {
                    if self.at_end() {
                        return self.error_at(ErrorKind::InvalidBackReference, start);
                    }
                    self.position += 1;
                }
                let name: String = self.input[name_start..self.position].iter().collect();
                self.position += 1;
                match self.group_names.iter().position(|n| *n == name) {
                    Some(index) => Ok((Node::BackRef(index as CaptureGroupID), true)),
                    None => self.error_at(ErrorKind::InvalidBackReference, start),
                }
            }
            _ => Ok((
                Node::Char(self.parse_character_escape(c, start, false)?),
                true,
            )),
        }
    }

    /// Escapes shared between atoms and bracket expressions.
    fn parse_character_escape(
        &mut self,
        c: char,
        start: usize,
        in_class: bool,
    ) -> Result<u32, Error> {
        match c {
            'n' => Ok(0xA),
            'r' => Ok(0xD),
            't' => Ok(0x9),
            'f' => Ok(0xC),
            'v' => Ok(0xB),
            '0' => Ok(0x0),
            'b' if in_class => Ok(0x8),
            'c' => match self.bump() {
                Some(letter) if letter.is_ascii_alphabetic() => Ok(letter as u32 % 32),
                _ => self.error_at(ErrorKind::InvalidEscape, start),
            },
            'x' => self.parse_hex_digits(2, start),
            'u' => {
                if self.flags.contains(Flags::UNICODE) && self.try_eat('{') {
                    let digit_start = self.position;
                    while self.peek().is_some_and(|d| d.is_ascii_hexdigit()) {
                        self.position += 1;
                    }
                    if self.position == digit_start || !self.try_eat('}') {
                        return self.error_at(ErrorKind::InvalidEscape, start);
                    }
                    let digits: String = self.input[digit_start..self.position - 1].iter().collect();
                    match u32::from_str_radix(&digits, 16) {
                        Ok(cp) if cp <= 0x10FFFF => Ok(cp),
                        _ => self.error_at(ErrorKind::InvalidEscape, start),
                    }
                } else {
                    self.parse_hex_digits(4, start)
                }
            }
            _ => {
                // Identity escape.
                Ok(c as u32)
            }
        }
    }

    fn parse_hex_digits(&mut self, count: usize, start: usize) -> Result<u32, Error> {
        let mut value = 0u32;
        for _ in 0..count {
            let digit = match self.bump().and_then(|d| d.to_digit(16)) {
                Some(digit) => digit,
                None => return self.error_at(ErrorKind::InvalidEscape, start),
            };
            value = value * 16 + digit;
        }
        Ok(value)
    }

    fn parse_class(&mut self, start: usize) -> Result<Node, Error> {
        let invert = self.try_eat('^');
        let mut items: Vec<ClassItem> = Vec::new();

        // POSIX bracket expressions treat a leading ']' as a literal.
        if self.dialect == Dialect::PosixExtended && self.peek() == Some(']') {
            self.position += 1;
            items.push(ClassItem::Char(']' as u32));
        }

        loop {
            if self.at_end() {
                return self.error_at(ErrorKind::MismatchingBracket, start);
            }
            if self.try_eat(']') {
                break;
            }
            // Named classes like [[:alpha:]] are not supported.
            if self.peek() == Some('[') && self.peek_at(1) == Some(':') {
                return self.error(ErrorKind::InvalidCharacterClass);
            }
            let atom_start = self.position;
            let atom = self.parse_class_atom(atom_start)?;

            // Try to extend a plain character into a range.
            let lhs = match atom {
                ClassAtom::Char(from) => {
                    if self.peek() == Some('-')
                        && self.peek_at(1).is_some()
                        && self.peek_at(1) != Some(']')
                    {
                        self.position += 1;
                        let rhs_start = self.position;
                        match self.parse_class_atom(rhs_start)? {
                            ClassAtom::Char(to) => {
                                if from > to {
                                    return self
                                        .error_at(ErrorKind::InvalidRange, atom_start);
                                }
                                items.push(ClassItem::Range(CharRange::new(from, to)));
                                continue;
                            }
                            ClassAtom::Class {
                                class_type,
                                positive,
                            } => {
                                // A class cannot close a range; all three
                                // pieces are literals.
                                items.push(ClassItem::Char(from));
                                items.push(ClassItem::Char('-' as u32));
                                items.push(ClassItem::Class {
                                    class_type,
                                    positive,
                                });
                                continue;
                            }
                        }
                    }
                    ClassItem::Char(from)
                }
                ClassAtom::Class {
                    class_type,
                    positive,
                } => {
                    // A class cannot open a range either; a following '-'
                    // is a literal.
                    if self.peek() == Some('-') && self.peek_at(1) != Some(']') {
                        self.position += 1;
                        items.push(ClassItem::Class {
                            class_type,
                            positive,
                        });
                        items.push(ClassItem::Char('-' as u32));
                        continue;
                    }
                    ClassItem::Class {
                        class_type,
                        positive,
                    }
                }
            };
            items.push(lhs);
        }

        Ok(Node::Bracket(BracketContents { invert, items }))
    }

    fn parse_class_atom(&mut self, start: usize) -> Result<ClassAtom, Error> {
        let c = match self.bump() {
            Some(c) => c,
            None => return self.error_at(ErrorKind::MismatchingBracket, start),
        };
        if c != '\\' {
            return Ok(ClassAtom::Char(c as u32));
        }
        let escaped = match self.bump() {
            Some(escaped) => escaped,
            None => return self.error_at(ErrorKind::InvalidTrailingEscape, start),
        };
        match escaped {
            'd' | 'D' | 'w' | 'W' | 's' | 'S' => Ok(class_atom_for_escape(escaped)),
            _ => Ok(ClassAtom::Char(
                self.parse_character_escape(escaped, start, true)?,
            )),
        }
    }
}

enum ClassAtom {
    Char(u32),
    Class {
        class_type: CharacterClassType,
        positive: bool,
    },
}

fn class_atom_for_escape(c: char) -> ClassAtom {
    let (class_type, positive) = classify_escape(c);
    ClassAtom::Class {
        class_type,
        positive,
    }
}

fn class_escape_node(c: char) -> Node {
    let (class_type, positive) = classify_escape(c);
    Node::Bracket(BracketContents {
        invert: false,
        items: vec![ClassItem::Class {
            class_type,
            positive,
        }],
    })
}

fn classify_escape(c: char) -> (CharacterClassType, bool) {
    match c {
        'd' => (CharacterClassType::Digits, true),
        'D' => (CharacterClassType::Digits, false),
        'w' => (CharacterClassType::Words, true),
        'W' => (CharacterClassType::Words, false),
        's' => (CharacterClassType::Spaces, true),
        'S' => (CharacterClassType::Spaces, false),
        _ => unreachable!("Not a class escape: {}", c),
    }
}

/// Scan an unsigned decimal number at \p start.
/// \return the value and the position after it.
fn scan_number(input: &[char], start: usize) -> Option<(usize, usize)> {
    let mut i = start;
    let mut value: usize = 0;
    while let Some(digit) = input.get(i).and_then(|c| c.to_digit(10)) {
        value = value.checked_mul(10)?.checked_add(digit as usize)?;
        i += 1;
    }
    if i == start {
        None
    } else {
        Some((value, i))
    }
}
