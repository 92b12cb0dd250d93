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

use std::borrow::Cow;

/// Returns true iff `pattern` matches `path`, anchored at the beginning of
/// the path. `*` matches any run of bytes (including none) and `$` anchors
/// the end of the path when it is the final pattern byte; any other byte,
/// including a non-terminal `$`, matches itself.
///
/// Both path and pattern are externally determined (by the webmaster), so the
/// scan keeps a sorted array of candidate path positions instead of
/// backtracking, bounding the worst case at O(|path| * |pattern|).
pub(crate) fn matches(path: &[u8], pattern: &[u8]) -> bool {
    // pos[..numpos] holds the sorted positions in `path` at which the pattern
    // bytes consumed so far can end. Empty means the match failed; reaching
    // the end of the pattern with at least one position means it succeeded.
    let mut pos = vec![0usize; path.len() + 1];
    let mut numpos = 1;

    for (idx, &pat) in pattern.iter().enumerate() {
        if pat == b'$' && idx + 1 == pattern.len() {
            return pos[numpos - 1] == path.len();
        }
        if pat == b'*' {
            numpos = path.len() - pos[0] + 1;
            for i in 1..numpos {
                pos[i] = pos[i - 1] + 1;
            }
        } else {
            let mut newnumpos = 0;
            for i in 0..numpos {
                if pos[i] < path.len() && path[pos[i]] == pat {
                    pos[newnumpos] = pos[i] + 1;
                    newnumpos += 1;
                }
            }
            numpos = newnumpos;
            if numpos == 0 {
                return false;
            }
        }
    }

    true
}

fn is_hex_escape(src: &[u8], i: usize) -> bool {
    src[i] == b'%'
        && i + 2 < src.len()
        && src[i + 1].is_ascii_hexdigit()
        && src[i + 2].is_ascii_hexdigit()
}

/// Canonicalizes an allowed/disallowed path pattern: existing `%XX` escapes
/// are uppercased and octets outside the ASCII range are percent-encoded,
/// e.g. `/SanJoséSellers` becomes `/SanJos%C3%A9Sellers` and `%aa` becomes
/// `%AA`. Escapes are never decoded, so `%62` stays `%62` rather than
/// becoming `b`. Idempotent; borrows when the pattern needs no change.
pub(crate) fn escape_pattern(src: &[u8]) -> Cow<'_, [u8]> {
    let mut num_to_escape = 0;
    let mut need_capitalize = false;

    // Scan first; most patterns need no changes.
    let mut i = 0;
    while i < src.len() {
        if is_hex_escape(src, i) {
            if src[i + 1].is_ascii_lowercase() || src[i + 2].is_ascii_lowercase() {
                need_capitalize = true;
            }
            i += 3;
        } else {
            if src[i] & 0x80 != 0 {
                num_to_escape += 1;
            }
            i += 1;
        }
    }

    if num_to_escape == 0 && !need_capitalize {
        return Cow::Borrowed(src);
    }

    let mut dst = Vec::with_capacity(src.len() + num_to_escape * 2);
    let mut i = 0;
    while i < src.len() {
        if is_hex_escape(src, i) {
            dst.push(b'%');
            dst.push(src[i + 1].to_ascii_uppercase());
            dst.push(src[i + 2].to_ascii_uppercase());
            i += 3;
        } else if src[i] & 0x80 != 0 {
            dst.extend_from_slice(percent_encoding::percent_encode_byte(src[i]).as_bytes());
            i += 1;
        } else {
            dst.push(src[i]);
            i += 1;
        }
    }

    Cow::Owned(dst)
}

fn find_first_of(url: &str, from: usize) -> Option<usize> {
    url[from..].find(['/', '?', ';']).map(|i| i + from)
}

/// Extracts the path (with params) and query part from a URL, dropping
/// scheme, authority and fragment. The result always starts with `/`;
/// URLs without a path component yield `/`.
pub(crate) fn path_params_query(url: &str) -> String {
    // Initial two slashes are ignored.
    let search_start = if url.starts_with("//") { 2 } else { 0 };

    let early_path = find_first_of(url, search_start);
    let protocol_end = match url[search_start..].find("://").map(|i| i + search_start) {
        // A path, param or query before the "://" means it is not a scheme
        // delimiter after all.
        Some(p) if early_path.map_or(true, |e| e >= p) => p + 3,
        _ => search_start,
    };

    let Some(path_start) = find_first_of(url, protocol_end) else {
        return "/".to_string();
    };

    let hash_pos = url[search_start..].find('#').map(|i| i + search_start);
    if hash_pos.map_or(false, |h| h < path_start) {
        return "/".to_string();
    }
    let path_end = hash_pos.unwrap_or(url.len());

    let path = &url[path_start..path_end];
    if path.starts_with('/') {
        path.to_string()
    } else {
        // Prepend a slash if the result would start e.g. with '?'.
        format!("/{path}")
    }
}
