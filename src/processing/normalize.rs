//! Text cleaning applied to every extracted document before scoring.

const MARKUP_MARKER: char = '#';
const LINE_BREAKS: [&str; 2] = ["<BR>", "&NBSP;"];
const CLAUSE_PUNCTUATION: [char; 3] = [',', ':', ';'];
const CONNECTIVES: [&str; 6] = [" AND ", " OR ", " THEN ", " IF ", " BECAUSE ", " WHEN "];

/// Clean `text` into upper-case, single-spaced, clause-terminated form.
///
/// Clause punctuation and the connectives `AND`, `OR`, `THEN`, `IF`, `BECAUSE`, `WHEN` become
/// periods so that segmentation yields clause-sized fragments. The result is a fixpoint:
/// `normalize(&normalize(t)) == normalize(t)`.
pub fn normalize(text: &str) -> String {
    let upper = text.to_uppercase().replace('\t', "");

    let mut joined = upper
        .split(['\n', '\r'])
        .map(|line| line.trim_start_matches(MARKUP_MARKER))
        .collect::<Vec<_>>()
        .join(" ");

    for marker in LINE_BREAKS {
        joined = joined.replace(marker, " ");
    }

    let mut cleaned: String = joined
        .chars()
        .map(|c| if CLAUSE_PUNCTUATION.contains(&c) { '.' } else { c })
        .collect();

    // Each replacement shortens the string, so this terminates.
    loop {
        let next = replace_connectives(&collapse_spaces(&cleaned));
        if next == cleaned {
            return next;
        }
        cleaned = next;
    }
}

fn replace_connectives(text: &str) -> String {
    CONNECTIVES
        .iter()
        .fold(text.to_string(), |acc, word| acc.replace(word, "."))
}

fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_space = false;
    for c in text.chars() {
        if c == ' ' {
            if !previous_space {
                out.push(c);
            }
            previous_space = true;
        } else {
            out.push(c);
            previous_space = false;
        }
    }
    out
}
