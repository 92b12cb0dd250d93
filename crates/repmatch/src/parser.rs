// Stract is an open source web search engine.
// Copyright (C) 2024 Stract ApS
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till},
    IResult,
};

use crate::pattern::escape_pattern;

/// Per-line byte cap. Certain browsers limit URLs to 2083 bytes, so a valid
/// robots.txt line is not going to be more than a few times that; bytes past
/// the cap are dropped for the line and the line is flagged as too long.
pub const MAX_LINE_LEN: usize = 2083 * 8;

/// Diagnostics gathered for a single physical line. Reported through
/// [`ParseHandler::on_line_metadata`] for every line, whether or not the line
/// carried a directive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LineMetadata {
    /// The line contains nothing but whitespace and no comment.
    pub is_empty: bool,
    /// A `#` appears somewhere on the line.
    pub has_comment: bool,
    /// The line carries nothing but a comment.
    pub is_comment: bool,
    /// A key/value pair was extracted and emitted.
    pub has_directive: bool,
    /// The key matched one of the accepted typo spellings.
    pub is_acceptable_typo: bool,
    /// The raw line exceeded [`MAX_LINE_LEN`] and was truncated.
    pub is_line_too_long: bool,
    /// No colon was present; the space-or-tab fallback separator was used.
    pub is_missing_colon_separator: bool,
}

/// Sink for directives found in robots.txt. The parser calls these in the
/// order the lines appear in the document: `on_start` once, then per line an
/// optional directive callback followed by `on_line_metadata`, then `on_end`
/// once. All methods default to doing nothing, so implementors only override
/// what they consume.
pub trait ParseHandler {
    fn on_start(&mut self) {}
    fn on_end(&mut self) {}

    fn on_user_agent(&mut self, _line_num: u32, _value: &[u8]) {}
    fn on_allow(&mut self, _line_num: u32, _value: &[u8]) {}
    fn on_disallow(&mut self, _line_num: u32, _value: &[u8]) {}
    fn on_sitemap(&mut self, _line_num: u32, _value: &[u8]) {}

    /// Any other unrecognized key/value pair, with the raw key preserved.
    fn on_unknown_action(&mut self, _line_num: u32, _key: &[u8], _value: &[u8]) {}

    fn on_line_metadata(&mut self, _line_num: u32, _metadata: LineMetadata) {}
}

#[derive(Debug, Clone, Copy)]
pub struct ParseParams {
    /// Accept common misspellings of directive names, such as `disalow` or
    /// `user agent`.
    pub allow_frequent_typos: bool,
}

impl Default for ParseParams {
    fn default() -> Self {
        Self {
            allow_frequent_typos: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    UserAgent,
    Allow,
    Disallow,
    Sitemap,
    Unknown,
}

fn starts_with_ignore_case(key: &[u8], token: &[u8]) -> bool {
    key.len() >= token.len() && key[..token.len()].eq_ignore_ascii_case(token)
}

/// Classifies a raw directive key. The key only needs to start with a
/// recognized token, so e.g. `user-agents` still parses. Returns the key kind
/// and whether a typo spelling matched.
fn classify_key(key: &[u8], allow_frequent_typos: bool) -> (Key, bool) {
    const DISALLOW_TYPOS: [&[u8]; 5] = [
        b"dissallow",
        b"dissalow",
        b"disalow",
        b"diasllow",
        b"disallaw",
    ];

    if starts_with_ignore_case(key, b"user-agent") {
        (Key::UserAgent, false)
    } else if allow_frequent_typos
        && (starts_with_ignore_case(key, b"useragent")
            || starts_with_ignore_case(key, b"user agent"))
    {
        (Key::UserAgent, true)
    } else if starts_with_ignore_case(key, b"allow") {
        (Key::Allow, false)
    } else if starts_with_ignore_case(key, b"disallow") {
        (Key::Disallow, false)
    } else if allow_frequent_typos
        && DISALLOW_TYPOS
            .iter()
            .any(|typo| starts_with_ignore_case(key, typo))
    {
        (Key::Disallow, true)
    } else if starts_with_ignore_case(key, b"sitemap") {
        (Key::Sitemap, false)
    } else if allow_frequent_typos && starts_with_ignore_case(key, b"site-map") {
        (Key::Sitemap, true)
    } else {
        (Key::Unknown, false)
    }
}

fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// Splits a comment-stripped, trimmed line into key and value. A line without
/// a colon is still accepted when a space or tab splits it into exactly two
/// fields, since webmasters sometimes forget the separator.
fn key_and_value<'a>(line: &'a [u8], metadata: &mut LineMetadata) -> Option<(&'a [u8], &'a [u8])> {
    match line.iter().position(|&b| b == b':') {
        Some(sep) => {
            let key = line[..sep].trim_ascii();
            let value = line[sep + 1..].trim_ascii();
            if key.is_empty() {
                return None;
            }
            Some((key, value))
        }
        None => {
            // Only space and tab are accepted in the colon's stead.
            let sep = line.iter().position(|&b| is_blank(b))?;
            let after_blanks = line[sep..].iter().take_while(|&&b| is_blank(b)).count();
            let value = &line[sep + after_blanks..];
            if value.iter().any(|&b| is_blank(b)) {
                // Only accept a blank as a separator when there are exactly
                // two runs of non-blank characters.
                return None;
            }
            metadata.is_missing_colon_separator = true;
            Some((&line[..sep], value.trim_ascii()))
        }
    }
}

fn line_break(input: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((tag(&b"\r\n"[..]), tag(&b"\r"[..]), tag(&b"\n"[..])))(input)
}

// A UTF-8 byte order mark should never appear in a robots.txt file, but they
// do nevertheless. Partial marks are dropped too; a broken mark (e.g.
// EF 11 BF) keeps its unmatched tail bytes as content of the first line.
fn utf8_bom_prefix(input: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((
        tag(&b"\xEF\xBB\xBF"[..]),
        tag(&b"\xEF\xBB"[..]),
        tag(&b"\xEF"[..]),
    ))(input)
}

fn raw_line(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, line) = take_till(|b| b == b'\n' || b == b'\r')(input)?;
    let (input, _) = line_break(input)?;
    Ok((input, line))
}

/// Parses the body of a robots.txt and emits parse callbacks in document
/// order. Accepts any input: anything that does not look like a directive is
/// reported through line metadata instead of failing, and the parse always
/// runs to completion.
pub fn parse<H: ParseHandler>(robots: &[u8], handler: &mut H) {
    parse_with_params(robots, handler, ParseParams::default())
}

/// Like [`parse`], with explicit tolerance settings.
pub fn parse_with_params<H: ParseHandler>(robots: &[u8], handler: &mut H, params: ParseParams) {
    handler.on_start();

    let mut rest = match utf8_bom_prefix(robots) {
        Ok((rest, _)) => rest,
        Err(_) => robots,
    };

    let mut line_num = 0;
    loop {
        match raw_line(rest) {
            Ok((tail, line)) => {
                line_num += 1;
                parse_and_emit_line(line_num, line, handler, params);
                rest = tail;
            }
            // No line break left; whatever remains is the final line. A
            // document ending in a newline gets a trailing empty line.
            Err(_) => break,
        }
    }
    line_num += 1;
    parse_and_emit_line(line_num, rest, handler, params);

    handler.on_end();
}

fn parse_and_emit_line<H: ParseHandler>(
    line_num: u32,
    raw: &[u8],
    handler: &mut H,
    params: ParseParams,
) {
    let mut metadata = LineMetadata::default();

    let line = if raw.len() > MAX_LINE_LEN {
        metadata.is_line_too_long = true;
        &raw[..MAX_LINE_LEN]
    } else {
        raw
    };

    // Everything from the first '#' onward is a comment.
    let line = match line.iter().position(|&b| b == b'#') {
        Some(comment) => {
            metadata.has_comment = true;
            &line[..comment]
        }
        None => line,
    };
    let line = line.trim_ascii();

    if line.is_empty() {
        if metadata.has_comment {
            metadata.is_comment = true;
        } else {
            metadata.is_empty = true;
        }
        handler.on_line_metadata(line_num, metadata);
        return;
    }

    let Some((key, value)) = key_and_value(line, &mut metadata) else {
        handler.on_line_metadata(line_num, metadata);
        return;
    };

    let (kind, is_typo) = classify_key(key, params.allow_frequent_typos);
    metadata.has_directive = true;
    metadata.is_acceptable_typo = is_typo;

    match kind {
        Key::UserAgent => handler.on_user_agent(line_num, value),
        Key::Allow => handler.on_allow(line_num, &escape_pattern(value)),
        Key::Disallow => handler.on_disallow(line_num, &escape_pattern(value)),
        Key::Sitemap => handler.on_sitemap(line_num, value),
        Key::Unknown => handler.on_unknown_action(line_num, key, value),
    }

    handler.on_line_metadata(line_num, metadata);
}
