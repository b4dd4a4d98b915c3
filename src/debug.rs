//! Failure localization for non-matching inputs
//!
//! Given a pattern and an input it fails to match, produce one
//! human-actionable diagnostic string. Two phases:
//!
//! 1. **Sub-pattern rejection.** The original expression is recompiled in
//!    debug mode, where every reference substitution is marked optional.
//!    Running that against the input reveals which reference-introduced
//!    fields cannot participate at all, independent of surrounding context.
//! 2. **Structural bisection.** The original expression is partitioned into
//!    maximal runs sharing the same outermost open marker (`(`, `[`, `{`,
//!    with `%{` opening at the `{`'s depth), and prefixes of 1..k segments
//!    are tested in order. The first failing prefix names the earliest point
//!    of divergence. This is a linear scan, not a binary search: regex
//!    matching is not independent per segment, so only contiguous prefix
//!    testing is sound.

use crate::collection::GrokCollection;
use crate::error::GrokError;
use crate::pattern::{GrokPattern, UNWANTED};

impl GrokCollection {
    /// Explain why `pattern` does not match `input`.
    ///
    /// Auxiliary patterns built here (the debug-mode recompile and the
    /// prefix trials) are resolved through this collection but never
    /// registered in it.
    pub fn debug(&mut self, pattern: &GrokPattern, input: &str) -> Result<String, GrokError> {
        // Phase 1: which sub-patterns cannot match the input at all?
        let debug_pattern = self.compile(pattern.expression(), pattern.id(), true)?;
        let unmatched = rejected_fields(&debug_pattern, input)?;
        if !unmatched.is_empty() {
            return Ok(format!("Can not match pattern: {}", unmatched.join(", ")));
        }

        // Phase 2: walk structural prefixes until one stops matching
        let segments = segment_expression(pattern.expression());
        let mut failed_at = None;
        for k in 1..=segments.len() {
            let prefix: String = segments[..k].concat();
            let matched = match self.compile(&prefix, "trial", false) {
                Ok(trial) => trial
                    .parse_sync(input)?
                    .map(|fields| !fields.is_empty())
                    .unwrap_or(false),
                // a prefix the engine rejects cannot match either
                Err(_) => false,
            };
            if !matched {
                failed_at = Some(k - 1);
                break;
            }
        }

        let hint = match failed_at {
            None => format!("Regex parse error: {}", pattern.expression()),
            Some(0) => {
                let mut hint = format!(
                    "Can not match partial regex: \u{201c}{}\u{201d}, at: 0",
                    segments[0]
                );
                if let Some(next) = segments.get(1) {
                    hint.push_str(&format!(", before: \u{201c}{}\u{201d}", next));
                }
                hint
            }
            Some(index) => {
                let offset: usize = segments[..index].iter().map(|s| s.chars().count()).sum();
                format!(
                    "Can not match partial regex: \u{201c}{}\u{201d}, at: {}, after: \u{201c}{}\u{201d}",
                    segments[index],
                    offset,
                    segments[index - 1]
                )
            }
        };
        Ok(hint)
    }
}

/// Run the debug-mode pattern and collect every named field whose group did
/// not participate, in field-table order. An overall non-match yields the
/// empty list: nothing can be blamed on an individual sub-pattern.
fn rejected_fields(debug_pattern: &GrokPattern, input: &str) -> Result<Vec<String>, GrokError> {
    let regex = debug_pattern.engine()?;
    let caps = match regex.captures(input) {
        Some(caps) => caps,
        None => return Ok(Vec::new()),
    };
    let mut rejected = Vec::new();
    for (index, slot) in debug_pattern.fields().iter().enumerate().skip(1) {
        if let Some(field) = slot {
            if field != UNWANTED && caps.get(index).is_none() {
                rejected.push(field.clone());
            }
        }
    }
    Ok(rejected)
}

/// Partition an expression into maximal runs sharing the same outermost open
/// marker. The concatenation of the segments reproduces the expression
/// exactly.
///
/// Scanning rules: a character is escaped by an odd run of preceding
/// backslashes; an unescaped `(`, `[` or `{` opens a marker unless the
/// innermost open marker is `[`; a closing character still belongs to its
/// marker's run (the pop takes effect on the next character); `%`
/// immediately before an unescaped `{` opens at the same depth as the `{`.
pub(crate) fn segment_expression(expression: &str) -> Vec<String> {
    let chars: Vec<char> = expression.chars().collect();

    let mut escaped = vec![false; chars.len()];
    let mut escaping = false;
    for (i, &c) in chars.iter().enumerate() {
        escaped[i] = escaping;
        escaping = !escaping && c == '\\';
    }

    let mut stack: Vec<char> = Vec::new();
    let mut outermost: Vec<Option<char>> = Vec::with_capacity(chars.len());
    for i in 0..chars.len() {
        let prev = i.checked_sub(1).map(|j| (chars[j], escaped[j]));

        // the previous character may have closed the innermost marker
        if let (Some((p, false)), Some(&top)) = (prev, stack.last()) {
            if p == closing(top) {
                stack.pop();
            }
        }

        let c = chars[i];
        if !escaped[i]
            && (c == '(' || c == '[' || c == '{')
            && stack.last() != Some(&'[')
        {
            stack.push(c);
            if c == '{' {
                if let Some(('%', false)) = prev {
                    // the % belongs to the reference it opens
                    if let Some(last) = outermost.last_mut() {
                        *last = stack.first().copied();
                    }
                }
            }
        }
        outermost.push(stack.first().copied());
    }

    let mut segments = Vec::new();
    let mut start = 0;
    for i in 1..=chars.len() {
        if i == chars.len() || outermost[i] != outermost[i - 1] {
            segments.push(chars[start..i].iter().collect());
            start = i;
        }
    }
    segments
}

fn closing(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        _ => open,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenation_reproduces_the_expression() {
        let expr = r#"%{IPV4:a} \- %{NOTSPACE:b} \[%{HTTPDATE:c}\] "x" ((y|z)|w)"#;
        assert_eq!(segment_expression(expr).concat(), expr);
    }

    #[test]
    fn top_level_text_and_groups_alternate() {
        assert_eq!(
            segment_expression(r#"p1 \[p2\] "p3" ((p4|x)|p5) "#),
            vec![r#"p1 \[p2\] "p3" "#, "((p4|x)|p5)", " "]
        );
    }

    #[test]
    fn references_open_at_the_percent_sign() {
        assert_eq!(
            segment_expression("%{WORD:verb} %{URIPATH:url}"),
            vec!["%{WORD:verb}", " ", "%{URIPATH:url}"]
        );
    }

    #[test]
    fn escaped_markers_stay_in_the_surrounding_run() {
        assert_eq!(
            segment_expression(r"a\(b\)c (d)"),
            vec![r"a\(b\)c ", "(d)"]
        );
        assert_eq!(segment_expression(r"\\(x)"), vec![r"\\", "(x)"]);
    }

    #[test]
    fn markers_inside_classes_are_ignored() {
        assert_eq!(
            segment_expression(r"[({] (x)"),
            vec!["[({]", " ", "(x)"]
        );
    }

    #[test]
    fn adjacent_groups_with_one_marker_kind_share_a_run() {
        assert_eq!(segment_expression("(a)(b)"), vec!["(a)(b)"]);
        assert_eq!(segment_expression("(a) (b)"), vec!["(a)", " ", "(b)"]);
    }

    #[test]
    fn nested_groups_share_the_outer_run() {
        assert_eq!(
            segment_expression("x((a|b)|c)y"),
            vec!["x", "((a|b)|c)", "y"]
        );
    }

    #[test]
    fn braces_count_as_markers() {
        assert_eq!(segment_expression("a{2,3}b"), vec!["a", "{2,3}", "b"]);
    }

    #[test]
    fn segment_offsets_match_the_original_text() {
        let expr = r"%{IPV4:remote_addr} \- %{NOTSPACE:remote_user} \[%{HTTPDATE:time_local}\]";
        let segments = segment_expression(expr);
        assert_eq!(segments[0], "%{IPV4:remote_addr}");
        assert_eq!(segments[1], r" \- ");
        assert_eq!(segments[2], "%{NOTSPACE:remote_user}");
        assert_eq!(segments[3], r" \[");
        let offset: usize = segments[..3].iter().map(|s| s.chars().count()).sum();
        assert_eq!(offset, 46);
    }
}
