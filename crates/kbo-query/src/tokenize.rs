//! Phase A (tokenization of raw user text) and Phase B (MATCH synthesis)
//! of the free-text planner (C12).

const MAX_TOKENS: usize = 12;

/// Extracts non-overlapping runs of one-or-more Unicode letters, or exactly
/// four decimal digits, in input order; numeric runs of any other length
/// are discarded, letter runs shorter than 2 characters are discarded,
/// everything else is lowercased; duplicates are removed preserving first
/// occurrence, then capped at 12 tokens (P9).
pub fn tokenize_query(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let run: String = chars[start..i].iter().collect();
            if run.len() == 4 {
                push_unique(&mut tokens, &mut seen, run);
            }
            continue;
        }
        if chars[i].is_alphabetic() {
            let start = i;
            while i < chars.len() && chars[i].is_alphabetic() {
                i += 1;
            }
            let run: String = chars[start..i].iter().collect::<String>().to_lowercase();
            if run.chars().count() >= 2 {
                push_unique(&mut tokens, &mut seen, run);
            }
            continue;
        }
        i += 1;
    }
    tokens.truncate(MAX_TOKENS);
    tokens
}

fn push_unique(tokens: &mut Vec<String>, seen: &mut std::collections::HashSet<String>, token: String) {
    if tokens.len() >= MAX_TOKENS {
        return;
    }
    if seen.insert(token.clone()) {
        tokens.push(token);
    }
}

/// Synthesizes the `MATCH` expression: numeric tokens are emitted as-is,
/// everything else gets a `*` prefix suffix; joined with ` OR ` inside one
/// group. Empty input yields an empty string (the caller returns no results).
pub fn synthesize_match_expression(tokens: &[String]) -> String {
    if tokens.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = tokens
        .iter()
        .map(|t| {
            if t.chars().all(|c| c.is_ascii_digit()) {
                t.clone()
            } else {
                format!("{t}*")
            }
        })
        .collect();
    format!("({})", parts.join(" OR "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_four_digit_non_postal_numeric_strictness() {
        // Exactly-four-digit runs survive as postal candidates.
        let tokens = tokenize_query("3500 Hasselt");
        assert_eq!(tokens, vec!["3500".to_string(), "hasselt".to_string()]);
    }

    #[test]
    fn drops_non_four_digit_numeric_runs() {
        let tokens = tokenize_query("29/03/25 Kaartnummer 5229 62XX XXXX 0390");
        // "29", "03", "25" (2 digits) dropped; "5229", "0390" kept (4 digits);
        // "62" dropped, "xx" too short after lowering... "XX" is 2 letters, kept.
        assert!(tokens.contains(&"5229".to_string()));
        assert!(tokens.contains(&"0390".to_string()));
        assert!(!tokens.contains(&"29".to_string()));
        assert!(!tokens.contains(&"03".to_string()));
    }

    #[test]
    fn deduplicates_preserving_order() {
        let tokens = tokenize_query("albert albert heijn");
        assert_eq!(tokens, vec!["albert".to_string(), "heijn".to_string()]);
    }

    #[test]
    fn caps_at_twelve_tokens() {
        let text: String = (0..20).map(|i| format!("word{i} ")).collect();
        let tokens = tokenize_query(&text);
        assert_eq!(tokens.len(), 12);
    }

    #[test]
    fn single_letters_are_discarded() {
        let tokens = tokenize_query("a bc d");
        assert_eq!(tokens, vec!["bc".to_string()]);
    }

    #[test]
    fn match_expression_mixes_prefix_and_exact_numeric() {
        let tokens = vec!["albert".to_string(), "heijn".to_string(), "3500".to_string()];
        assert_eq!(
            synthesize_match_expression(&tokens),
            "(albert* OR heijn* OR 3500)"
        );
    }

    #[test]
    fn empty_tokens_yield_empty_expression() {
        assert_eq!(synthesize_match_expression(&[]), "");
    }
}
