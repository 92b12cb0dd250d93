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

use crate::parser::{LineMetadata, ParseHandler};

/// Popular robots.txt tags that carry no crawling semantics here. Other
/// consumers of a robots.txt may still use them, so the reporter tells them
/// apart from plain unknown keys (say, `unicorn: /value`). Matched
/// case-insensitively against the exact key.
const DEFAULT_UNUSED_KEYS: &[&str] = &[
    "clean-param",
    "crawl-delay",
    "host",
    "noarchive",
    "noindex",
    "nofollow",
];

/// Tag assigned to a parsed robots.txt line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTag {
    /// No directive, or a key nobody is known to use.
    Unknown,
    UserAgent,
    Allow,
    Disallow,
    Sitemap,
    /// A recognized-but-ignored tag such as `crawl-delay`.
    Unused,
}

/// Parse outcome of a single physical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedLine {
    pub line_num: u32,
    pub tag: ParsedTag,
    pub metadata: LineMetadata,
}

/// A [`ParseHandler`] that records what the parser saw: one [`ParsedLine`]
/// per physical line plus aggregate counters. Useful for robots.txt
/// validators and diagnostics tooling.
#[derive(Debug, Default)]
pub struct ParsingReporter {
    unused_keys: Vec<String>,
    lines: Vec<ParsedLine>,
    pending_tag: Option<(u32, ParsedTag)>,
    last_line_seen: u32,
    valid_directives: u32,
    unused_directives: u32,
}

impl ParsingReporter {
    pub fn new() -> Self {
        Self::with_unused_keys(DEFAULT_UNUSED_KEYS.iter().map(|key| key.to_string()))
    }

    /// A reporter with a custom set of keys to report as [`ParsedTag::Unused`].
    pub fn with_unused_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            unused_keys: keys.into_iter().map(|key| key.to_lowercase()).collect(),
            ..Default::default()
        }
    }

    /// Highest line number reported so far.
    pub fn last_line_seen(&self) -> u32 {
        self.last_line_seen
    }

    /// Number of user-agent, allow, disallow and sitemap directives seen.
    pub fn valid_directives(&self) -> u32 {
        self.valid_directives
    }

    /// Number of directives with unknown or known-but-unused keys.
    pub fn unused_directives(&self) -> u32 {
        self.unused_directives
    }

    /// One entry per physical line, in order.
    pub fn parse_results(&self) -> &[ParsedLine] {
        &self.lines
    }

    fn digest(&mut self, line_num: u32, tag: ParsedTag) {
        if !matches!(tag, ParsedTag::Unknown | ParsedTag::Unused) {
            self.valid_directives += 1;
        }
        self.pending_tag = Some((line_num, tag));
    }
}

impl ParseHandler for ParsingReporter {
    fn on_start(&mut self) {
        self.lines.clear();
        self.pending_tag = None;
        self.last_line_seen = 0;
        self.valid_directives = 0;
        self.unused_directives = 0;
    }

    fn on_user_agent(&mut self, line_num: u32, _value: &[u8]) {
        self.digest(line_num, ParsedTag::UserAgent);
    }

    fn on_allow(&mut self, line_num: u32, _value: &[u8]) {
        self.digest(line_num, ParsedTag::Allow);
    }

    fn on_disallow(&mut self, line_num: u32, _value: &[u8]) {
        self.digest(line_num, ParsedTag::Disallow);
    }

    fn on_sitemap(&mut self, line_num: u32, _value: &[u8]) {
        self.digest(line_num, ParsedTag::Sitemap);
    }

    fn on_unknown_action(&mut self, line_num: u32, key: &[u8], _value: &[u8]) {
        let key = String::from_utf8_lossy(key).to_lowercase();
        let tag = if self.unused_keys.iter().any(|unused| *unused == key) {
            ParsedTag::Unused
        } else {
            ParsedTag::Unknown
        };
        self.unused_directives += 1;
        self.digest(line_num, tag);
    }

    fn on_line_metadata(&mut self, line_num: u32, metadata: LineMetadata) {
        if line_num > self.last_line_seen {
            self.last_line_seen = line_num;
        }

        let tag = match self.pending_tag.take() {
            Some((directive_line, tag)) if directive_line == line_num => tag,
            _ => ParsedTag::Unknown,
        };
        self.lines.push(ParsedLine {
            line_num,
            tag,
            metadata,
        });
    }
}
