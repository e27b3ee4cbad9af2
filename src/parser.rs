//! Roster text parser.
//!
//! Input is the text extracted from a roster PDF: whitespace separated
//! tokens, usually one student per visual row but with no reliable line
//! structure. Two record shapes are recognized:
//!
//! ```text
//! 3 1 1 김민수 2011.07.23. 남 634.17 2 5 28     continuing student
//! 2 1 29 하늘이 2012.02.10. 여 984.01 전입       transfer-in student
//! ```
//!
//! Both shapes share the prefix up to the score and are tried as
//! alternatives at the same cursor. A match consumes its tokens; anything
//! else advances the cursor by one token. A student is therefore produced at
//! most once, never as both shapes.

use crate::model::{ClassKey, Gender, Roster, Student, TRANSFER_IN};
use std::ops::Range;

const GRADE_MARKER: &str = "학년";
const MAX_NAME_TOKENS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Continuing,
    TransferIn,
}

/// Where a record was found: token indices and byte offsets into the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpan {
    pub kind: RecordKind,
    pub tokens: Range<usize>,
    pub bytes: Range<usize>,
}

#[derive(Debug, Clone)]
pub struct ParsedRecord {
    pub class_key: ClassKey,
    pub student: Student,
    pub span: RecordSpan,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseSummary {
    pub continuing: usize,
    pub transfer_in: usize,
}

impl ParseSummary {
    pub fn total(&self) -> usize {
        self.continuing + self.transfer_in
    }
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    text: &'a str,
    start: usize,
}

impl Token<'_> {
    fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                out.push(Token {
                    text: &text[s..i],
                    start: s,
                });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push(Token {
            text: &text[s..],
            start: s,
        });
    }
    out
}

/// Lazy sequence of records found in the text, in encounter order.
pub struct Scanner<'a> {
    tokens: Vec<Token<'a>>,
    cursor: usize,
}

pub fn scan(text: &str) -> Scanner<'_> {
    Scanner {
        tokens: tokenize(text),
        cursor: 0,
    }
}

impl Iterator for Scanner<'_> {
    type Item = ParsedRecord;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.tokens.len() {
            if let Some(rec) = match_record(&self.tokens, self.cursor) {
                self.cursor = rec.span.tokens.end;
                return Some(rec);
            }
            self.cursor += 1;
        }
        None
    }
}

/// Parses raw roster text. Never fails: unmatched text yields no records and
/// an input without any record yields an empty roster.
pub fn parse(text: &str) -> Roster {
    parse_with_summary(text).0
}

pub fn parse_with_summary(text: &str) -> (Roster, ParseSummary) {
    let mut roster = Roster::new();
    let mut summary = ParseSummary::default();
    for rec in scan(text) {
        match rec.span.kind {
            RecordKind::Continuing => summary.continuing += 1,
            RecordKind::TransferIn => summary.transfer_in += 1,
        }
        roster.push(rec.class_key, rec.student);
    }
    (roster, summary)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// A digit run, optionally followed by the `학년` marker either attached
/// (`3학년`) or as its own token (`3 학년`). Returns the digits and the next
/// token index.
fn grade_field<'a>(tokens: &[Token<'a>], i: usize) -> Option<(&'a str, usize)> {
    let t = tokens.get(i)?.text;
    if let Some(d) = t.strip_suffix(GRADE_MARKER) {
        return is_digits(d).then_some((d, i + 1));
    }
    if !is_digits(t) {
        return None;
    }
    match tokens.get(i + 1) {
        Some(next) if next.text == GRADE_MARKER => Some((t, i + 2)),
        _ => Some((t, i + 1)),
    }
}

fn digit_field<'a>(tokens: &[Token<'a>], i: usize) -> Option<&'a str> {
    let t = tokens.get(i)?.text;
    is_digits(t).then_some(t)
}

/// `YYYY.MM.DD` with an optional trailing period.
fn is_birth_date(s: &str) -> bool {
    let b = s.as_bytes();
    let core = match b.len() {
        10 => b,
        11 if b[10] == b'.' => &b[..10],
        _ => return false,
    };
    core.iter().enumerate().all(|(i, c)| match i {
        4 | 7 => *c == b'.',
        _ => c.is_ascii_digit(),
    })
}

fn normalize_birth_date(s: &str) -> String {
    if s.ends_with('.') {
        s.to_string()
    } else {
        format!("{s}.")
    }
}

fn is_score(s: &str) -> bool {
    let mut dots = 0;
    let mut digits = 0;
    for b in s.bytes() {
        match b {
            b'.' => dots += 1,
            b'0'..=b'9' => digits += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

fn is_name_token(s: &str) -> bool {
    !s.bytes().any(|b| b.is_ascii_digit())
}

fn match_record(tokens: &[Token<'_>], start: usize) -> Option<ParsedRecord> {
    let (grade_text, i) = grade_field(tokens, start)?;
    let grade: u32 = grade_text.parse().ok()?;
    let class: u32 = digit_field(tokens, i)?.parse().ok()?;
    let number = digit_field(tokens, i + 1)?;
    let name_start = i + 2;

    // Shortest name run that is followed by a birth date.
    let mut date_at = None;
    for len in 1..=MAX_NAME_TOKENS {
        let Some(tok) = tokens.get(name_start + len - 1) else {
            break;
        };
        if !is_name_token(tok.text) {
            break;
        }
        if tokens
            .get(name_start + len)
            .is_some_and(|t| is_birth_date(t.text))
        {
            date_at = Some(name_start + len);
            break;
        }
    }
    let date_at = date_at?;
    let name = tokens[name_start..date_at]
        .iter()
        .map(|t| t.text)
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    let birth_date = normalize_birth_date(tokens[date_at].text);
    let gender = Gender::from_token(tokens.get(date_at + 1)?.text)?;
    let score_tok = tokens.get(date_at + 2)?.text;
    if !is_score(score_tok) {
        return None;
    }
    let after_score = date_at + 3;

    let (kind, prev_grade, prev_class, prev_number, prev_summary, end) =
        if tokens.get(after_score)?.text == TRANSFER_IN {
            (
                RecordKind::TransferIn,
                grade.saturating_sub(1).to_string(),
                "0".to_string(),
                "0".to_string(),
                TRANSFER_IN.to_string(),
                after_score + 1,
            )
        } else {
            let (pg, j) = grade_field(tokens, after_score)?;
            let pc = digit_field(tokens, j)?;
            let pn = digit_field(tokens, j + 1)?;
            (
                RecordKind::Continuing,
                pg.to_string(),
                pc.to_string(),
                pn.to_string(),
                format!("{pg} {pc} {pn}"),
                j + 2,
            )
        };

    let student = Student {
        number: number.to_string(),
        name,
        birth_date,
        gender,
        score: score_tok.to_string(),
        prev_summary,
        prev_grade,
        prev_class,
        prev_number,
        note: None,
    };

    Some(ParsedRecord {
        class_key: ClassKey::new(grade, class),
        student,
        span: RecordSpan {
            kind,
            tokens: start..end,
            bytes: tokens[start].start..tokens[end - 1].end(),
        },
    })
}
