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

use url::Url;

use crate::parser::{self, ParseHandler, ParseParams};
use crate::pattern;

const NO_MATCH_PRIORITY: i32 = -1;

/// Longest-match priority of `pattern` against `path`: the byte length of a
/// matching pattern, or a negative value for no match. A zero-length match
/// is still a match and outranks no match at all.
fn match_priority(path: &[u8], pattern: &[u8]) -> i32 {
    if pattern::matches(path, pattern) {
        pattern.len() as i32
    } else {
        NO_MATCH_PRIORITY
    }
}

// C's isspace set; unlike u8::is_ascii_whitespace this includes vertical tab.
fn is_c_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | 0x0B | 0x0C | b'\r')
}

/// The matchable part of a user-agent value: the leading run of `[a-zA-Z_-]`
/// bytes, so `Googlebot/2.1` still matches `Googlebot`.
fn extract_user_agent(user_agent: &[u8]) -> &[u8] {
    let end = user_agent
        .iter()
        .position(|&b| !(b.is_ascii_alphabetic() || b == b'-' || b == b'_'))
        .unwrap_or(user_agent.len());
    &user_agent[..end]
}

/// Verifies that `user_agent` is valid to be matched against robots.txt.
/// Valid user agent strings are non-empty and only contain the characters
/// `[a-zA-Z_-]`.
pub fn is_valid_user_agent(user_agent: &str) -> bool {
    !user_agent.is_empty() && extract_user_agent(user_agent.as_bytes()) == user_agent.as_bytes()
}

/// Instead of a boolean per rule, we keep the maximum number of pattern bytes
/// matched plus the line the pattern came from. The priority starts negative
/// so that a match of priority 0 still ranks above no match at all.
#[derive(Debug, Clone, Copy)]
struct Match {
    priority: i32,
    line: u32,
}

impl Default for Match {
    fn default() -> Self {
        Self {
            priority: NO_MATCH_PRIORITY,
            line: 0,
        }
    }
}

impl Match {
    fn set(&mut self, priority: i32, line: u32) {
        self.priority = priority;
        self.line = line;
    }

    fn clear(&mut self) {
        self.set(NO_MATCH_PRIORITY, 0);
    }

    fn higher_priority(a: Match, b: Match) -> Match {
        if a.priority > b.priority {
            a
        } else {
            b
        }
    }
}

/// Global (`*` groups) and specific (queried agents) scores for one verdict
/// kind.
#[derive(Debug, Default, Clone, Copy)]
struct MatchHierarchy {
    global: Match,
    specific: Match,
}

impl MatchHierarchy {
    fn clear(&mut self) {
        self.global.clear();
        self.specific.clear();
    }
}

/// Matches robots.txt documents against URLs using longest-match
/// arbitration: in case of conflicting Allow and Disallow matches, the one
/// that matched the most bytes wins, and ties go to Allow. This is what
/// webmasters writing
///
/// ```text
/// Allow: /
/// Disallow: /cgi-bin
/// ```
///
/// mean, as opposed to the first-match strategy of the expired internet
/// draft.
///
/// The matcher can be reused across documents; every call to
/// [`RobotsMatcher::is_allowed`] starts from a clean slate. It is not meant
/// to be shared across threads.
pub struct RobotsMatcher {
    allow: MatchHierarchy,
    disallow: MatchHierarchy,
    /// True while the current group is a `*` group.
    seen_global_agent: bool,
    /// True while the current group names one of the queried agents.
    seen_specific_agent: bool,
    /// True if any group ever named one of the queried agents.
    ever_seen_specific_agent: bool,
    /// True once the current group has carried a rule; the next user-agent
    /// line then starts a new group.
    seen_separator: bool,
    path: Vec<u8>,
    user_agents: Vec<String>,
    params: ParseParams,
}

impl Default for RobotsMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RobotsMatcher {
    pub fn new() -> Self {
        Self::with_params(ParseParams::default())
    }

    pub fn with_params(params: ParseParams) -> Self {
        Self {
            allow: MatchHierarchy::default(),
            disallow: MatchHierarchy::default(),
            seen_global_agent: false,
            seen_specific_agent: false,
            ever_seen_specific_agent: false,
            seen_separator: false,
            path: Vec::new(),
            user_agents: Vec::new(),
            params,
        }
    }

    /// Returns true iff `url` may be fetched by any member of `user_agents`
    /// according to `robots`. The url must already be %-encoded per RFC 3986;
    /// it is not normalized here.
    pub fn is_allowed<A: AsRef<str>>(
        &mut self,
        robots: &[u8],
        user_agents: &[A],
        url: &str,
    ) -> bool {
        self.path = pattern::path_params_query(url).into_bytes();
        self.user_agents = user_agents
            .iter()
            .map(|agent| agent.as_ref().to_owned())
            .collect();

        let params = self.params;
        parser::parse_with_params(robots, self, params);
        !self.disallow()
    }

    /// Robots check for `url` when there is only one user agent.
    pub fn is_allowed_one(&mut self, robots: &[u8], user_agent: &str, url: &str) -> bool {
        self.is_allowed(robots, &[user_agent], url)
    }

    /// Convenience for callers that already hold a parsed [`Url`].
    pub fn is_url_allowed<A: AsRef<str>>(
        &mut self,
        robots: &[u8],
        user_agents: &[A],
        url: &Url,
    ) -> bool {
        self.is_allowed(robots, user_agents, url.as_str())
    }

    /// True if the last parsed document disallows the matched URL.
    pub fn disallow(&self) -> bool {
        if self.allow.specific.priority > 0 || self.disallow.specific.priority > 0 {
            return self.disallow.specific.priority > self.allow.specific.priority;
        }

        if self.ever_seen_specific_agent {
            // A group for the agent existed but carried no matching rule, or
            // only an empty one.
            return false;
        }

        if self.disallow.global.priority > 0 || self.allow.global.priority > 0 {
            return self.disallow.global.priority > self.allow.global.priority;
        }

        false
    }

    /// Like [`RobotsMatcher::disallow`], but ignores any rules specified for
    /// the default user agent and bases the verdict only on the queried
    /// agents.
    pub fn disallow_ignore_global(&self) -> bool {
        if self.allow.specific.priority > 0 || self.disallow.specific.priority > 0 {
            return self.disallow.specific.priority > self.allow.specific.priority;
        }
        false
    }

    /// True iff the last parsed document referred explicitly to one of the
    /// queried user agents.
    pub fn ever_seen_specific_agent(&self) -> bool {
        self.ever_seen_specific_agent
    }

    /// Line number of the decisive match, or 0 if nothing matched.
    pub fn matching_line(&self) -> u32 {
        if self.ever_seen_specific_agent {
            Match::higher_priority(self.disallow.specific, self.allow.specific).line
        } else {
            Match::higher_priority(self.disallow.global, self.allow.global).line
        }
    }

    fn seen_any_agent(&self) -> bool {
        self.seen_global_agent || self.seen_specific_agent
    }
}

impl ParseHandler for RobotsMatcher {
    fn on_start(&mut self) {
        self.allow.clear();
        self.disallow.clear();

        self.seen_global_agent = false;
        self.seen_specific_agent = false;
        self.ever_seen_specific_agent = false;
        self.seen_separator = false;
    }

    fn on_user_agent(&mut self, _line_num: u32, value: &[u8]) {
        if self.seen_separator {
            self.seen_specific_agent = false;
            self.seen_global_agent = false;
            self.seen_separator = false;
        }

        // A '*' followed by whitespace and more characters still denotes the
        // global group.
        if value.first() == Some(&b'*') && (value.len() == 1 || is_c_whitespace(value[1])) {
            self.seen_global_agent = true;
        } else {
            let token = extract_user_agent(value);
            for agent in &self.user_agents {
                if token.eq_ignore_ascii_case(agent.as_bytes()) {
                    self.ever_seen_specific_agent = true;
                    self.seen_specific_agent = true;
                    break;
                }
            }
        }
    }

    fn on_allow(&mut self, line_num: u32, value: &[u8]) {
        if !self.seen_any_agent() {
            return;
        }

        self.seen_separator = true;
        let priority = match_priority(&self.path, value);
        if priority >= 0 {
            let record = if self.seen_specific_agent {
                &mut self.allow.specific
            } else {
                &mut self.allow.global
            };
            if record.priority < priority {
                record.set(priority, line_num);
            }
        } else if let Some(slash) = value.iter().rposition(|&b| b == b'/') {
            // 'index.htm' and 'index.html' at the end of a pattern also stand
            // for the directory itself.
            if value[slash..].starts_with(b"/index.htm") {
                let mut aliased = value[..slash + 1].to_vec();
                aliased.push(b'$');
                self.on_allow(line_num, &aliased);
            }
        }
    }

    fn on_disallow(&mut self, line_num: u32, value: &[u8]) {
        if !self.seen_any_agent() {
            return;
        }

        self.seen_separator = true;
        let priority = match_priority(&self.path, value);
        if priority >= 0 {
            let record = if self.seen_specific_agent {
                &mut self.disallow.specific
            } else {
                &mut self.disallow.global
            };
            if record.priority < priority {
                record.set(priority, line_num);
            }
        }
    }

    // Sitemap and unknown lines neither open nor close a group, so the
    // matcher ignores them entirely.
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_matcher(robots: &str, agent: &str, url: &str) -> RobotsMatcher {
        let mut matcher = RobotsMatcher::new();
        matcher.is_allowed_one(robots.as_bytes(), agent, url);
        matcher
    }

    #[test]
    fn test_valid_user_agents() {
        assert!(is_valid_user_agent("FooBot"));
        assert!(is_valid_user_agent("Foobot-Bar"));
        assert!(is_valid_user_agent("Foo_Bar"));

        assert!(!is_valid_user_agent(""));
        assert!(!is_valid_user_agent(" "));
        assert!(!is_valid_user_agent("🦀"));

        assert!(!is_valid_user_agent("Foobot*"));
        assert!(!is_valid_user_agent(" FooBot "));
        assert!(!is_valid_user_agent("FooBot/1.0"));

        assert!(!is_valid_user_agent("Foobot Bar"));
    }

    #[test]
    fn test_extract_user_agent() {
        assert_eq!(extract_user_agent(b"Googlebot/2.1"), b"Googlebot");
        assert_eq!(extract_user_agent(b"Foo Bar"), b"Foo");
        assert_eq!(extract_user_agent(b"Foo_Bar-Baz"), b"Foo_Bar-Baz");
        assert_eq!(extract_user_agent(b"007"), b"");
    }

    #[test]
    fn test_matching_line_reports_decisive_rule() {
        let robots = "user-agent: FooBot\ndisallow: /x/\nallow: /x/y/\n";

        let matcher = run_matcher(robots, "FooBot", "http://foo.bar/x/y/z");
        assert!(!matcher.disallow());
        assert_eq!(matcher.matching_line(), 3);

        let matcher = run_matcher(robots, "FooBot", "http://foo.bar/x/w");
        assert!(matcher.disallow());
        assert_eq!(matcher.matching_line(), 2);

        let matcher = run_matcher(robots, "FooBot", "http://foo.bar/other");
        assert!(!matcher.disallow());
        assert_eq!(matcher.matching_line(), 0);
    }

    #[test]
    fn test_matching_line_prefers_specific_hierarchy() {
        let robots = "user-agent: *\ndisallow: /x/\nuser-agent: FooBot\ndisallow: /x/y/\n";

        let matcher = run_matcher(robots, "FooBot", "http://foo.bar/x/y/z");
        assert_eq!(matcher.matching_line(), 4);

        let matcher = run_matcher(robots, "BarBot", "http://foo.bar/x/y/z");
        assert_eq!(matcher.matching_line(), 2);
    }

    #[test]
    fn test_first_line_wins_on_equal_priority() {
        let robots = "user-agent: FooBot\ndisallow: /x/\ndisallow: /x*\n";

        // Both rules match /x/ with priority 3; the earlier line is kept.
        let matcher = run_matcher(robots, "FooBot", "http://foo.bar/x/");
        assert_eq!(matcher.matching_line(), 2);
    }

    #[test]
    fn test_disallow_ignore_global() {
        let robots = "user-agent: *\ndisallow: /\nuser-agent: FooBot\ndisallow: /x/\n";

        let matcher = run_matcher(robots, "FooBot", "http://foo.bar/x/y");
        assert!(matcher.disallow());
        assert!(matcher.disallow_ignore_global());

        let matcher = run_matcher(robots, "FooBot", "http://foo.bar/z");
        assert!(!matcher.disallow());
        assert!(!matcher.disallow_ignore_global());

        // BarBot only has global rules, which are ignored here.
        let matcher = run_matcher(robots, "BarBot", "http://foo.bar/x/y");
        assert!(matcher.disallow());
        assert!(!matcher.disallow_ignore_global());
    }

    #[test]
    fn test_global_agent_with_trailing_garbage() {
        // A '*' followed by whitespace (vertical tab included) and more
        // characters is still the global group.
        for robots in [
            "user-agent: * trailing\ndisallow: /\n",
            "user-agent: *\x0Bfoo\ndisallow: /\n",
        ] {
            let matcher = run_matcher(robots, "FooBot", "http://foo.bar/x");
            assert!(matcher.disallow(), "robots: {robots:?}");
        }

        // Without whitespace after the '*' the value is not a global marker,
        // and its matchable token is empty.
        let matcher = run_matcher("user-agent: *foo\ndisallow: /\n", "FooBot", "http://foo.bar/x");
        assert!(!matcher.disallow());
    }

    #[test]
    fn test_ever_seen_specific_agent() {
        let robots = "user-agent: FooBot\ndisallow: /\n";

        let matcher = run_matcher(robots, "FooBot", "http://foo.bar/x");
        assert!(matcher.ever_seen_specific_agent());

        let matcher = run_matcher(robots, "BarBot", "http://foo.bar/x");
        assert!(!matcher.ever_seen_specific_agent());
    }

    #[test]
    fn test_matcher_is_reusable() {
        let mut matcher = RobotsMatcher::new();

        assert!(!matcher.is_allowed_one(b"user-agent: *\ndisallow: /\n", "FooBot", "http://a/b"));
        // A fresh parse resets all verdict state.
        assert!(matcher.is_allowed_one(b"", "FooBot", "http://a/b"));
        assert_eq!(matcher.matching_line(), 0);
    }

    #[test]
    fn test_url_entry_point() {
        let url = Url::parse("http://foo.bar/x/y").unwrap();
        let mut matcher = RobotsMatcher::new();

        assert!(!matcher.is_url_allowed(b"user-agent: *\ndisallow: /x/\n", &["FooBot"], &url));
        assert!(matcher.is_url_allowed(b"user-agent: *\ndisallow: /z/\n", &["FooBot"], &url));
    }

    #[test]
    fn test_empty_agent_list_only_matches_global() {
        let agents: &[&str] = &[];
        let mut matcher = RobotsMatcher::new();

        assert!(!matcher.is_allowed(b"user-agent: *\ndisallow: /\n", agents, "http://a/b"));
        assert!(matcher.is_allowed(b"user-agent: FooBot\ndisallow: /\n", agents, "http://a/b"));
    }
}
