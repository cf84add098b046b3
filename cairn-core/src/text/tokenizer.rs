//! Identifier tokenizer: splits CamelCase, acronym runs, digit runs and
//! nested-type separators into semantic tokens.

/// Splits identifier names into tokens.
///
/// Precedence at each position: configured idioms, acronym runs (two or
/// more capitals, trailing digits glued), TitleCase words (trailing digits
/// glued unless a capital follows), leading digit runs glued onto the
/// letters that follow, then bare lowercase runs.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    /// Longest first, so `3DS` would win over `3D`.
    idioms: Vec<Vec<char>>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(["2D", "3D"])
    }
}

impl Tokenizer {
    pub fn new<I, S>(idioms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut idioms: Vec<Vec<char>> = idioms
            .into_iter()
            .map(|s| s.as_ref().chars().collect::<Vec<_>>())
            .filter(|chars| !chars.is_empty())
            .collect();
        idioms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        idioms.dedup();
        Self { idioms }
    }

    pub fn tokenize(&self, name: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for segment in segments(name) {
            self.split_segment(&segment, &mut tokens);
        }
        tokens
    }

    fn split_segment(&self, chars: &[char], out: &mut Vec<String>) {
        let n = chars.len();
        let mut i = 0;
        while i < n {
            let end = self
                .match_idiom(chars, i)
                .or_else(|| acronym_run(chars, i))
                .or_else(|| title_word(chars, i))
                .or_else(|| leading_digits(chars, i))
                .or_else(|| lowercase_run(chars, i));
            match end {
                Some(end) => {
                    out.push(chars[i..end].iter().collect());
                    i = end;
                }
                None => i += 1,
            }
        }
    }

    fn match_idiom(&self, chars: &[char], i: usize) -> Option<usize> {
        self.idioms.iter().find_map(|idiom| {
            let end = i + idiom.len();
            let matches = chars.get(i..end) == Some(idiom.as_slice());
            let clean_edge = chars.get(end).is_none_or(|c| !c.is_ascii_lowercase());
            (matches && clean_edge).then_some(end)
        })
    }
}

/// Split on nested-type, generic and namespace delimiters, dropping
/// generic arity markers (`` `1 ``).
fn segments(name: &str) -> Vec<Vec<char>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        let delimiter = matches!(c, '`' | '+' | '_' | '.' | '<' | '>' | ',') || c.is_whitespace();
        if c == '`' {
            while chars.peek().is_some_and(char::is_ascii_digit) {
                chars.next();
            }
        }
        if delimiter {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn run_end(chars: &[char], from: usize, pred: impl Fn(&char) -> bool) -> usize {
    chars[from..]
        .iter()
        .position(|c| !pred(c))
        .map_or(chars.len(), |p| from + p)
}

fn is_lower_at(chars: &[char], i: usize) -> bool {
    chars.get(i).is_some_and(char::is_ascii_lowercase)
}

fn is_upper_at(chars: &[char], i: usize) -> bool {
    chars.get(i).is_some_and(char::is_ascii_uppercase)
}

/// `XMLParser` → `XML`; `HTTP2Server` → `HTTP2`.
fn acronym_run(chars: &[char], i: usize) -> Option<usize> {
    if !is_upper_at(chars, i) {
        return None;
    }
    let upper_end = run_end(chars, i, char::is_ascii_uppercase);
    if upper_end - i < 2 {
        return None;
    }
    if is_lower_at(chars, upper_end) {
        // The last capital starts the next TitleCase word.
        let end = upper_end - 1;
        return (end - i >= 2).then_some(end);
    }
    let digit_end = run_end(chars, upper_end, char::is_ascii_digit);
    if digit_end > upper_end && !is_lower_at(chars, digit_end) {
        Some(digit_end)
    } else {
        Some(upper_end)
    }
}

/// `Blue1` stays whole; `Item2D` yields `Item` and leaves `2D`.
fn title_word(chars: &[char], i: usize) -> Option<usize> {
    if !is_upper_at(chars, i) {
        return None;
    }
    let word_end = run_end(chars, i + 1, char::is_ascii_lowercase);
    let digit_end = run_end(chars, word_end, char::is_ascii_digit);
    if digit_end > word_end && !is_upper_at(chars, digit_end) {
        Some(digit_end)
    } else {
        Some(word_end)
    }
}

fn leading_digits(chars: &[char], i: usize) -> Option<usize> {
    if !chars[i].is_ascii_digit() {
        return None;
    }
    let digit_end = run_end(chars, i, char::is_ascii_digit);
    if is_upper_at(chars, digit_end) {
        let upper_end = run_end(chars, digit_end, char::is_ascii_uppercase);
        if !is_lower_at(chars, upper_end) {
            return Some(upper_end);
        }
        if upper_end - digit_end >= 2 {
            return Some(upper_end - 1);
        }
    }
    if chars.get(digit_end).is_some_and(char::is_ascii_alphabetic) {
        // Mixed letters up to the next TitleCase boundary.
        let mut j = digit_end;
        while chars.get(j).is_some_and(char::is_ascii_alphabetic) {
            if j > digit_end && is_upper_at(chars, j) && is_lower_at(chars, j + 1) {
                break;
            }
            j += 1;
        }
        return Some(j);
    }
    Some(digit_end)
}

fn lowercase_run(chars: &[char], i: usize) -> Option<usize> {
    is_lower_at(chars, i).then(|| run_end(chars, i, char::is_ascii_lowercase))
}
