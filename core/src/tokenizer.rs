use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref JOINERS: Regex = Regex::new(r"[_-]").expect("valid regex");
    static ref STRIPPED: Regex = Regex::new(r"[!@#$]").expect("valid regex");
}

/// Normalize one whitespace-delimited word into a term.
///
/// Transcription renders decimals and fractions as `3.5` or `1/2`; these become
/// `3 point 5` and `1 over 2` so the spoken form survives as part of the term.
/// Returns `None` when nothing is left after stripping.
pub fn normalize_word(word: &str) -> Option<String> {
    let word = STRIPPED.replace_all(word, "");
    let word = word.replace('/', " over ").replace('.', " point ").to_lowercase();
    if word.is_empty() { None } else { Some(word) }
}

/// Tokenize document text into its sequence of terms (repeats preserved, in order).
pub fn tokenize(text: &str) -> Vec<String> {
    let joined = JOINERS.replace_all(text, " ");
    joined.split_whitespace().filter_map(normalize_word).collect()
}

/// Split a query into terms.
///
/// Queries are whitespace-split only, without the normalization applied to
/// documents, unless `normalize` is set.
pub fn query_terms(query: &str, normalize: bool) -> Vec<String> {
    if normalize {
        tokenize(query)
    } else {
        query.split_whitespace().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Bicycle-lane funding_request");
        assert_eq!(t, vec!["bicycle", "lane", "funding", "request"]);
    }

    #[test]
    fn stripped_only_word_is_dropped() {
        assert_eq!(normalize_word("#$!@"), None);
        assert_eq!(tokenize("# vote"), vec!["vote"]);
    }

    #[test]
    fn raw_query_keeps_case_and_punctuation() {
        assert_eq!(query_terms("Bicycle path!", false), vec!["Bicycle", "path!"]);
        assert_eq!(query_terms("Bicycle path!", true), vec!["bicycle", "path"]);
    }
}
