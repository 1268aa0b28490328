//! Input views over the supported string encodings.
//!
//! A view addresses its contents by *code unit* index (bytes for UTF-8,
//! 16-bit units for UTF-16, 32-bit units for UTF-32) and decodes *code
//! points* on demand. The Unicode option toggles surrogate-pair decoding for
//! UTF-16 views; without it they are treated as UCS-2, matching the
//! ECMAScript non-unicode string model.

use crate::types::is_line_terminator;

#[derive(Debug, Copy, Clone)]
enum ViewData<'a> {
    Utf8(&'a str),
    Utf16(&'a [u16]),
    Utf32(&'a [u32]),
}

/// A read-only view of input text in one of the supported encodings.
#[derive(Debug, Copy, Clone)]
pub struct RegexStringView<'a> {
    data: ViewData<'a>,
    unicode: bool,
}

impl<'a> From<&'a str> for RegexStringView<'a> {
    fn from(s: &'a str) -> Self {
        RegexStringView {
            data: ViewData::Utf8(s),
            unicode: false,
        }
    }
}

impl<'a> RegexStringView<'a> {
    /// Construct a view over UTF-16 (or UCS-2) code units.
    pub fn from_utf16(units: &'a [u16]) -> Self {
        RegexStringView {
            data: ViewData::Utf16(units),
            unicode: false,
        }
    }

    /// Construct a view over UTF-32 code points.
    pub fn from_utf32(units: &'a [u32]) -> Self {
        RegexStringView {
            data: ViewData::Utf32(units),
            unicode: false,
        }
    }

    /// Switch the decoder between code-unit and code-point interpretation.
    /// Only meaningful for UTF-16 views; UTF-8 is always decoded.
    pub fn set_unicode(&mut self, unicode: bool) {
        self.unicode = unicode;
    }

    pub fn length_in_code_units(&self) -> usize {
        match self.data {
            ViewData::Utf8(s) => s.len(),
            ViewData::Utf16(s) => s.len(),
            ViewData::Utf32(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.length_in_code_units() == 0
    }

    /// Decode the code point starting at code-unit index \p index.
    /// \return the code point and the number of code units it occupies, or
    /// None at the end of the view or off a code point boundary.
    pub fn code_point_at(&self, index: usize) -> Option<(u32, usize)> {
        match self.data {
            ViewData::Utf8(s) => {
                let c = s.get(index..)?.chars().next()?;
                Some((c as u32, c.len_utf8()))
            }
            ViewData::Utf16(s) => {
                let unit = *s.get(index)?;
                if self.unicode && (0xD800..0xDC00).contains(&unit) {
                    if let Some(&low) = s.get(index + 1) {
                        if (0xDC00..0xE000).contains(&low) {
                            let cp = 0x10000
                                + ((unit as u32 - 0xD800) << 10)
                                + (low as u32 - 0xDC00);
                            return Some((cp, 2));
                        }
                    }
                }
                Some((unit as u32, 1))
            }
            ViewData::Utf32(s) => Some((*s.get(index)?, 1)),
        }
    }

    /// Decode the code point *ending* at code-unit index \p index.
    /// \return the code point and its width, or None at the start of the
    /// view.
    pub fn code_point_before(&self, index: usize) -> Option<(u32, usize)> {
        if index == 0 || index > self.length_in_code_units() {
            return None;
        }
        match self.data {
            ViewData::Utf8(s) => {
                let c = s.get(..index)?.chars().next_back()?;
                Some((c as u32, c.len_utf8()))
            }
            ViewData::Utf16(s) => {
                let unit = s[index - 1];
                if self.unicode && (0xDC00..0xE000).contains(&unit) && index >= 2 {
                    let high = s[index - 2];
                    if (0xD800..0xDC00).contains(&high) {
                        let cp = 0x10000
                            + ((high as u32 - 0xD800) << 10)
                            + (unit as u32 - 0xDC00);
                        return Some((cp, 2));
                    }
                }
                Some((unit as u32, 1))
            }
            ViewData::Utf32(s) => Some((s[index - 1], 1)),
        }
    }

    /// Extract the code-unit range `from..to` as an owned string.
    /// Unpaired surrogates and invalid code points are replaced.
    pub fn substring(&self, from: usize, to: usize) -> String {
        debug_assert!(from <= to && to <= self.length_in_code_units());
        match self.data {
            ViewData::Utf8(s) => s.get(from..to).unwrap_or_default().to_string(),
            ViewData::Utf16(_) => {
                let mut out = String::new();
                let mut index = from;
                while index < to {
                    match self.code_point_at(index) {
                        Some((cp, width)) => {
                            out.push(char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER));
                            index += width;
                        }
                        None => break,
                    }
                }
                out
            }
            ViewData::Utf32(s) => s[from..to]
                .iter()
                .map(|&cp| char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect(),
        }
    }

    /// Split the view into one view per line, at `\n` code units.
    ///
    /// Note the split is single-unit: a host using `\r\n` line endings
    /// should normalise them before matching, or the `\r` stays attached to
    /// the preceding line and offsets shift accordingly.
    pub fn lines(&self) -> Vec<RegexStringView<'a>> {
        let unicode = self.unicode;
        match self.data {
            ViewData::Utf8(s) => s
                .split('\n')
                .map(|line| RegexStringView {
                    data: ViewData::Utf8(line),
                    unicode,
                })
                .collect(),
            ViewData::Utf16(s) => s
                .split(|&unit| unit == 0xA)
                .map(|line| RegexStringView {
                    data: ViewData::Utf16(line),
                    unicode,
                })
                .collect(),
            ViewData::Utf32(s) => s
                .split(|&unit| unit == 0xA)
                .map(|line| RegexStringView {
                    data: ViewData::Utf32(line),
                    unicode,
                })
                .collect(),
        }
    }

    /// \return whether the code point ending at \p index is a line
    /// terminator; false at the start of the view.
    pub fn preceded_by_line_terminator(&self, index: usize) -> bool {
        self.code_point_before(index)
            .is_some_and(|(cp, _)| is_line_terminator(cp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_decoding() {
        let view = RegexStringView::from("a\u{0251}b");
        assert_eq!(view.length_in_code_units(), 4);
        assert_eq!(view.code_point_at(0), Some(('a' as u32, 1)));
        assert_eq!(view.code_point_at(1), Some((0x251, 2)));
        // Off-boundary decode yields None.
        assert_eq!(view.code_point_at(2), None);
        assert_eq!(view.code_point_before(3), Some((0x251, 2)));
    }

    #[test]
    fn utf16_surrogates() {
        // U+1F600 as a surrogate pair.
        let units = [0xD83D, 0xDE00, 0x61];
        let mut view = RegexStringView::from_utf16(&units);
        assert_eq!(view.code_point_at(0), Some((0xD83D, 1)));
        view.set_unicode(true);
        assert_eq!(view.code_point_at(0), Some((0x1F600, 2)));
        assert_eq!(view.code_point_at(2), Some((0x61, 1)));
        assert_eq!(view.code_point_before(2), Some((0x1F600, 2)));
    }

    #[test]
    fn line_splitting() {
        let view = RegexStringView::from("one\ntwo\n\nfour");
        let lines = view.lines();
        let texts: Vec<String> = lines
            .iter()
            .map(|l| l.substring(0, l.length_in_code_units()))
            .collect();
        assert_eq!(texts, vec!["one", "two", "", "four"]);
    }

    #[test]
    fn substrings() {
        let view = RegexStringView::from("hello");
        assert_eq!(view.substring(1, 4), "ell");
        let units: Vec<u16> = "hello".encode_utf16().collect();
        let view = RegexStringView::from_utf16(&units);
        assert_eq!(view.substring(0, 5), "hello");
    }
}
