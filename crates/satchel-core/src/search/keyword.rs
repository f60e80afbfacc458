//! FTS5 query sanitization
//!
//! Caller-supplied text goes straight into a MATCH expression, where bare
//! punctuation (`-`, `:`, parentheses) is FTS5 syntax and raises a parse
//! error. Each whitespace-separated token is therefore double-quoted, which
//! turns it into a plain term; multiple tokens combine with FTS5's implicit
//! AND. A trailing `*` survives as prefix syntax, so "frac*" still matches
//! "fraction". Tokenization and stemming stay delegated to the index
//! (porter ascii).

/// Sanitize caller text into a valid FTS5 MATCH expression
///
/// Returns an empty string when nothing searchable remains; callers treat
/// that as an invalid query rather than matching everything.
pub fn sanitize_fts5_query(query: &str) -> String {
    let mut terms = Vec::new();

    for token in query.split_whitespace() {
        let prefix = token.len() > 1 && token.ends_with('*');
        let bare = if prefix {
            &token[..token.len() - 1]
        } else {
            token
        };

        // Embedded double quotes are escaped by doubling, per SQL string rules
        let escaped = bare.replace('"', "\"\"");
        if escaped.is_empty() {
            continue;
        }

        if prefix {
            terms.push(format!("\"{escaped}\"*"));
        } else {
            terms.push(format!("\"{escaped}\""));
        }
    }

    terms.join(" ")
}
