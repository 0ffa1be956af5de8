use std::collections::HashSet;

/// Derives ordered, deduplicated search terms from the user's free text and
/// the resolved location/address strings. Location terms come first, then
/// capitalized two-word phrases, then capitalized single words.
pub fn extract(text: Option<&str>, location: Option<&str>, address: Option<&str>) -> Vec<String> {
    let mut terms = Vec::new();
    let mut seen = HashSet::new();

    for source in [location, address].into_iter().flatten() {
        // "National Gallery, 1 St Andrew's Rd, Singapore" keeps only the
        // leading segment; a plain place name passes through whole.
        let segment = source.split(',').next().unwrap_or(source);
        push_term(&mut terms, &mut seen, segment);
    }

    if let Some(text) = text {
        let words: Vec<&str> = text.split_whitespace().collect();

        for pair in words.windows(2) {
            if starts_uppercase(pair[0]) {
                push_term(&mut terms, &mut seen, &format!("{} {}", pair[0], pair[1]));
            }
        }

        for word in &words {
            if starts_uppercase(word) {
                push_term(&mut terms, &mut seen, word);
            }
        }
    }

    terms
}

fn starts_uppercase(token: &str) -> bool {
    token.chars().next().is_some_and(char::is_uppercase)
}

fn push_term(terms: &mut Vec<String>, seen: &mut HashSet<String>, raw: &str) {
    let normalized = raw.trim().to_lowercase();
    if normalized.chars().count() <= 1 {
        return;
    }
    if seen.insert(normalized.clone()) {
        terms.push(normalized);
    }
}
