//! Purely syntactic text matching.
//!
//! Every operation here is case-insensitive and whitespace/underscore
//! normalized, with no understanding of Solidity's type system. This is a
//! deliberate precision/recall trade-off: false positives are acceptable,
//! and false negatives on adversarially renamed identifiers are an accepted
//! limitation of the approach.

/// Lowercase the text and strip whitespace and underscores.
///
/// `swapExactTokens_for_Tokens` and `swap exact tokens for tokens` both
/// normalize to the same string, so patterns are insensitive to the naming
/// convention the contract author picked.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Does any candidate pattern occur in the normalized text?
///
/// Patterns are normalized with the same rules as the haystack. Empty
/// patterns never match.
pub fn contains_any(text: &str, patterns: &[&str]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let haystack = normalize(text);
    patterns.iter().any(|pattern| {
        let needle = normalize(pattern);
        !needle.is_empty() && haystack.contains(&needle)
    })
}

/// Extract the first integer literal following `key` and a `:` or `=`
/// separator, e.g. the gas value in `call{gas: 21000}`.
///
/// Absence of a match is a normal outcome, not an error: malformed input,
/// a missing separator, or an unparseable number all yield `None`.
pub fn extract_numeric(text: &str, key: &str) -> Option<u64> {
    let haystack = normalize(text);
    let needle = normalize(key);
    if needle.is_empty() {
        return None;
    }

    let mut offset = 0;
    while let Some(pos) = haystack[offset..].find(&needle) {
        let after = &haystack[offset + pos + needle.len()..];
        if let Some(rest) = after
            .strip_prefix(':')
            .or_else(|| after.strip_prefix('='))
        {
            let digits: &str = &rest[..rest
                .char_indices()
                .find(|(_, c)| !c.is_ascii_digit())
                .map(|(i, _)| i)
                .unwrap_or(rest.len())];
            if let Ok(value) = digits.parse::<u64>() {
                return Some(value);
            }
        }
        offset += pos + 1;
    }

    None
}

/// Does the text mention `keyword` and use one of the relational
/// `operators`? Used for delay/deadline checks such as a `block.timestamp`
/// comparison.
pub fn contains_comparison(text: &str, keyword: &str, operators: &[&str]) -> bool {
    let haystack = normalize(text);
    let key = normalize(keyword);
    if !key.is_empty() && !haystack.contains(&key) {
        return false;
    }
    operators.iter().any(|op| {
        let needle = normalize(op);
        !needle.is_empty() && haystack.contains(&needle)
    })
}

/// Does the text contain an assignment that is not part of a comparison
/// operator? `total += x` and `owner = msg.sender` qualify; `a == b`,
/// `a >= b`, `a <= b` and `a != b` do not.
pub fn has_assignment(text: &str) -> bool {
    let chars: Vec<char> = normalize(text).chars().collect();
    chars.iter().enumerate().any(|(i, &c)| {
        if c != '=' {
            return false;
        }
        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1);
        !matches!(prev, Some('=' | '!' | '<' | '>')) && next != Some(&'=')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_case_underscores_and_whitespace() {
        assert_eq!(normalize("swapExact_Tokens For_Tokens"), "swapexacttokensfortokens");
        assert_eq!(normalize("require(amount > 0)"), "require(amount>0)");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn contains_any_is_insensitive_to_convention() {
        assert!(contains_any("swapExactTokensForTokens", &["swapexacttokensfortokens"]));
        assert!(contains_any("min_amount_out", &["minamountout"]));
        assert!(!contains_any("deposit", &["withdraw", "sweep"]));
        assert!(!contains_any("anything", &[]));
        assert!(!contains_any("anything", &[""]));
    }

    #[test]
    fn extract_numeric_reads_value_after_key() {
        assert_eq!(extract_numeric("swap{gas: 21000}", "gas"), Some(21000));
        assert_eq!(extract_numeric("call{gas:500000}(data)", "gas"), Some(500_000));
        assert_eq!(extract_numeric("maxSlippage = 750", "maxSlippage"), Some(750));
    }

    #[test]
    fn extract_numeric_absence_is_none_not_error() {
        assert_eq!(extract_numeric("swap()", "gas"), None);
        assert_eq!(extract_numeric("gasless()", "gas"), None);
        assert_eq!(extract_numeric("gas: none", "gas"), None);
        assert_eq!(extract_numeric("", "gas"), None);
        assert_eq!(extract_numeric("gas: 1", ""), None);
    }

    #[test]
    fn extract_numeric_skips_non_separated_occurrences() {
        // First `gas` occurrence has no separator; the second does.
        assert_eq!(extract_numeric("gasLeft() + call{gas: 30000}", "gas"), Some(30000));
    }

    #[test]
    fn extract_numeric_ignores_unparseable_values() {
        // Larger than u64: keep scanning, then give up without panicking.
        assert_eq!(extract_numeric("gas: 99999999999999999999999999", "gas"), None);
    }

    #[test]
    fn comparison_requires_the_keyword() {
        assert!(contains_comparison(
            "require(block.timestamp >= unlockAt)",
            "block.timestamp",
            &[">=", ">"]
        ));
        assert!(!contains_comparison("require(a >= b)", "block.timestamp", &[">=", ">"]));
        assert!(!contains_comparison("block.timestamp + 1", "block.timestamp", &[">=", ">"]));
    }

    #[test]
    fn assignment_detection_excludes_comparisons() {
        assert!(has_assignment("owner = msg.sender"));
        assert!(has_assignment("total += amount"));
        assert!(!has_assignment("require(a == b)"));
        assert!(!has_assignment("require(a >= b && c <= d)"));
        assert!(!has_assignment("if (a != b) revert()"));
    }
}
