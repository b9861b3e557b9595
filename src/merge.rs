//! Combining a cell's fragment with the upstream cumulative query.
//!
//! `merge` is the single place cumulative query text is produced. It is a
//! pure function: the same `(upstream, fragment)` pair always yields the same
//! string, which is what makes pipeline re-resolution idempotent.

use crate::fragment::{ClauseKind, Fragment, UPSTREAM_SLOT, WRAP_ALIAS};

/// Errors the merger can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeError {
    /// The fragment references an upstream query but none is resolved.
    MissingUpstream,

    /// A same-kind clause appears more than once at the top level of the
    /// upstream, so no safe replacement span exists.
    Conflict { keyword: &'static str },

    /// The upstream query has unbalanced parentheses or quoting; the scanner
    /// cannot locate top-level clauses in it.
    UnbalancedQuery,
}

impl std::fmt::Display for MergeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeError::MissingUpstream => {
                write!(f, "fragment requires an upstream query, but none is resolved")
            }
            MergeError::Conflict { keyword } => {
                write!(f, "upstream query has conflicting {} clauses", keyword)
            }
            MergeError::UnbalancedQuery => {
                write!(f, "upstream query has unbalanced parentheses or quotes")
            }
        }
    }
}

impl std::error::Error for MergeError {}

/// Merge an upstream cumulative query with a new cell's fragment.
///
/// Policy, by fragment variant:
/// - `Clause(ORDER BY)` replaces any top-level ORDER BY already present (the
///   later cell's ordering is the current desired state; exactly one ORDER BY
///   survives).
/// - `Clause(WHERE)` appends when the upstream has no top-level WHERE and no
///   aggregation/set operation; otherwise the upstream is nested first so
///   both conditions keep applying and the result stays a row-subset of the
///   upstream.
/// - `WrapRequired` always nests the upstream as [`WRAP_ALIAS`].
/// - `Override` substitutes the upstream into the template's
///   [`UPSTREAM_SLOT`] and uses the template as the new cumulative query.
///
/// # Examples
///
/// ```
/// use cellpipe::fragment::{ClauseKind, Fragment};
/// use cellpipe::merge::merge;
///
/// let fragment = Fragment::Clause {
///     kind: ClauseKind::Where,
///     text: "\"price\" > 10".to_string(),
/// };
/// let merged = merge("SELECT * FROM \"sales\"", &fragment).unwrap();
/// assert_eq!(merged, "SELECT * FROM \"sales\" WHERE \"price\" > 10");
/// ```
pub fn merge(upstream: &str, fragment: &Fragment) -> Result<String, MergeError> {
    let upstream = upstream.trim();
    match fragment {
        Fragment::Override { template } => {
            if !template.contains(UPSTREAM_SLOT) {
                return Ok(template.clone());
            }
            if upstream.is_empty() {
                return Err(MergeError::MissingUpstream);
            }
            Ok(template.replace(UPSTREAM_SLOT, upstream))
        }

        Fragment::WrapRequired { select } => {
            if upstream.is_empty() {
                return Err(MergeError::MissingUpstream);
            }
            Ok(wrap(upstream, select))
        }

        Fragment::Clause { kind, text } => {
            if upstream.is_empty() {
                return Err(MergeError::MissingUpstream);
            }
            match kind {
                ClauseKind::Where => merge_where(upstream, text),
                ClauseKind::OrderBy => merge_order_by(upstream, text),
            }
        }
    }
}

/// Nest `upstream` as the [`WRAP_ALIAS`] CTE and apply `select` over it.
fn wrap(upstream: &str, select: &str) -> String {
    format!("WITH {} AS ({}) {}", WRAP_ALIAS, upstream, select)
}

fn merge_where(upstream: &str, text: &str) -> Result<String, MergeError> {
    // A PIVOT statement or free-form raw query cannot take an appended
    // clause; nest it instead.
    if !is_clause_appendable(upstream) {
        return Ok(wrap(
            upstream,
            &format!("SELECT * FROM {} WHERE {}", WRAP_ALIAS, text),
        ));
    }
    let has_where = find_clause(upstream, "WHERE")?.is_some();
    let past_projection = ["GROUP BY", "HAVING", "QUALIFY", "UNION", "INTERSECT", "EXCEPT"]
        .iter()
        .any(|kw| top_level_positions(upstream, kw).map(|p| !p.is_empty()).unwrap_or(false));
    if has_where || past_projection {
        // Appending would either collide with the existing WHERE or land
        // after aggregation; nesting keeps every earlier condition applying.
        return Ok(wrap(
            upstream,
            &format!("SELECT * FROM {} WHERE {}", WRAP_ALIAS, text),
        ));
    }
    // Insert before any trailing ORDER BY / LIMIT.
    let insert_at = first_position(upstream, &["ORDER BY", "LIMIT"])?;
    Ok(splice(upstream, insert_at, &format!("WHERE {}", text)))
}

fn merge_order_by(upstream: &str, text: &str) -> Result<String, MergeError> {
    if !is_clause_appendable(upstream) {
        return Ok(wrap(
            upstream,
            &format!("SELECT * FROM {} ORDER BY {}", WRAP_ALIAS, text),
        ));
    }
    match find_clause(upstream, "ORDER BY")? {
        Some(start) => {
            // Replace the existing ordering; keep anything after a trailing
            // LIMIT. Each cell states the current desired ordering, so the
            // later one wins rather than both being emitted.
            let tail = &upstream[start..];
            let keep = find_clause(tail, "LIMIT")?.map(|p| &tail[p..]);
            let head = upstream[..start].trim_end();
            match keep {
                Some(limit) => Ok(format!("{} ORDER BY {} {}", head, text, limit)),
                None => Ok(format!("{} ORDER BY {}", head, text)),
            }
        }
        None => {
            let insert_at = first_position(upstream, &["LIMIT"])?;
            Ok(splice(upstream, insert_at, &format!("ORDER BY {}", text)))
        }
    }
}

/// Insert `clause` at `at` (or append when `at` is `None`), normalizing the
/// surrounding whitespace.
fn splice(upstream: &str, at: Option<usize>, clause: &str) -> String {
    match at {
        Some(pos) => {
            let head = upstream[..pos].trim_end();
            let tail = &upstream[pos..];
            format!("{} {} {}", head, clause, tail)
        }
        None => format!("{} {}", upstream.trim_end(), clause),
    }
}

/// Whether the query is SELECT-shaped, i.e. accepts appended clauses at all.
fn is_clause_appendable(query: &str) -> bool {
    let re = regex::Regex::new(r"(?i)^\s*(select|with)\b").unwrap();
    re.is_match(query)
}

/// Earliest top-level occurrence of any of `keywords`, if present.
fn first_position(query: &str, keywords: &[&'static str]) -> Result<Option<usize>, MergeError> {
    let mut earliest: Option<usize> = None;
    for kw in keywords {
        if let Some(pos) = find_clause(query, kw)? {
            earliest = Some(earliest.map_or(pos, |e| e.min(pos)));
        }
    }
    Ok(earliest)
}

/// Locate the single top-level occurrence of `keyword`, erroring if there is
/// more than one (no safe replacement span).
fn find_clause(query: &str, keyword: &'static str) -> Result<Option<usize>, MergeError> {
    let positions = top_level_positions(query, keyword)?;
    match positions.len() {
        0 => Ok(None),
        1 => Ok(Some(positions[0])),
        _ => Err(MergeError::Conflict { keyword }),
    }
}

/// Scan for `keyword` (possibly multi-word) outside parentheses, string
/// literals, and quoted identifiers. Byte positions of each match.
fn top_level_positions(query: &str, keyword: &str) -> Result<Vec<usize>, MergeError> {
    let bytes = query.as_bytes();
    let words: Vec<&str> = keyword.split(' ').collect();
    let mut positions = Vec::new();
    let mut depth: i32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                i = skip_quoted(bytes, i, b'\'').ok_or(MergeError::UnbalancedQuery)?;
            }
            b'"' => {
                i = skip_quoted(bytes, i, b'"').ok_or(MergeError::UnbalancedQuery)?;
            }
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(MergeError::UnbalancedQuery);
                }
                i += 1;
            }
            _ => {
                if depth == 0 {
                    if let Some(end) = match_keyword(bytes, i, &words) {
                        positions.push(i);
                        i = end;
                        continue;
                    }
                }
                i += 1;
            }
        }
    }
    if depth != 0 {
        return Err(MergeError::UnbalancedQuery);
    }
    Ok(positions)
}

/// Skip a quoted region starting at `start` (which holds the quote char),
/// honoring doubled-quote escapes. Returns the index just past the closing
/// quote, or `None` if it never closes.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if i + 1 < bytes.len() && bytes[i + 1] == quote {
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Case-insensitive word-bounded match of `words` at `at`, with arbitrary
/// whitespace between words. Returns the index just past the last word.
fn match_keyword(bytes: &[u8], at: usize, words: &[&str]) -> Option<usize> {
    if at > 0 && is_ident_byte(bytes[at - 1]) {
        return None;
    }
    let mut i = at;
    for (w, word) in words.iter().enumerate() {
        if w > 0 {
            let ws_start = i;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i == ws_start {
                return None;
            }
        }
        let wb = word.as_bytes();
        if i + wb.len() > bytes.len() {
            return None;
        }
        for (j, &c) in wb.iter().enumerate() {
            if !bytes[i + j].eq_ignore_ascii_case(&c) {
                return None;
            }
        }
        i += wb.len();
    }
    if i < bytes.len() && is_ident_byte(bytes[i]) {
        return None;
    }
    Some(i)
}
