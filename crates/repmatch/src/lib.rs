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

//! A robots.txt parser and matcher compatible with [RFC 9309](https://www.rfc-editor.org/rfc/rfc9309.html)
//! and [Google's robots.txt parser](https://github.com/google/robotstxt).
//!
//! Parsing is byte-oriented and deliberately forgiving: common key typos
//! (`disalow`, `user agent`), missing colon separators, UTF-8 byte order
//! marks and over-long lines are all tolerated the way Google's crawler
//! tolerates them, and anything unparseable is reported through per-line
//! metadata rather than failing the parse. Matching uses longest-match
//! arbitration between `Allow` and `Disallow` rules, with ties going to
//! `Allow`.
//!
//! ```
//! use repmatch::RobotsMatcher;
//!
//! let robots = b"user-agent: FooBot\ndisallow: /private\n";
//!
//! let mut matcher = RobotsMatcher::new();
//! assert!(!matcher.is_allowed_one(robots, "FooBot", "https://example.com/private/data"));
//! assert!(matcher.is_allowed_one(robots, "FooBot", "https://example.com/public"));
//! ```
//!
//! The lower-level [`parse`] entry point emits the raw directive stream into
//! any [`ParseHandler`]; [`RobotsMatcher`] and [`ParsingReporter`] are two
//! such handlers.

mod matcher;
mod parser;
mod pattern;
mod reporter;

pub use matcher::{is_valid_user_agent, RobotsMatcher};
pub use parser::{parse, parse_with_params, LineMetadata, ParseHandler, ParseParams, MAX_LINE_LEN};
pub use reporter::{ParsedLine, ParsedTag, ParsingReporter};
