//! String utility functions.
//!
//! Helpers used when turning user input into safe file names and when
//! describing validation patterns to end users.

/// Transliterates Cyrillic letters to Latin, leaving other characters as-is.
///
/// # Examples
///
/// ```
/// use miniform_core::utils::text::transliterate;
///
/// assert_eq!(transliterate("Отчёт за май.pdf"), "Otchyot za may.pdf");
/// assert_eq!(transliterate("Щука"), "Shchuka");
/// ```
pub fn transliterate(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match latin_for(c) {
            Some(latin) => out.push_str(latin),
            None => out.push(c),
        }
    }
    out
}

const fn latin_for(c: char) -> Option<&'static str> {
    let latin = match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "yo",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "kh",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "shch",
        'ъ' | 'ь' | 'Ъ' | 'Ь' => "",
        'ы' => "y",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        'А' => "A",
        'Б' => "B",
        'В' => "V",
        'Г' => "G",
        'Д' => "D",
        'Е' => "E",
        'Ё' => "Yo",
        'Ж' => "Zh",
        'З' => "Z",
        'И' => "I",
        'Й' => "Y",
        'К' => "K",
        'Л' => "L",
        'М' => "M",
        'Н' => "N",
        'О' => "O",
        'П' => "P",
        'Р' => "R",
        'С' => "S",
        'Т' => "T",
        'У' => "U",
        'Ф' => "F",
        'Х' => "Kh",
        'Ц' => "Ts",
        'Ч' => "Ch",
        'Ш' => "Sh",
        'Щ' => "Shch",
        'Ы' => "Y",
        'Э' => "E",
        'Ю' => "Yu",
        'Я' => "Ya",
        _ => return None,
    };
    Some(latin)
}

/// Lists the punctuation admitted by a `^[...]+$` character-class pattern.
///
/// Letters, digits, whitespace escapes and backslashes are
/// dropped; the remaining characters are returned once each, in pattern
/// order. Used to tell users which symbols a text field accepts.
///
/// # Examples
///
/// ```
/// use miniform_core::utils::text::allowed_specials;
///
/// assert_eq!(allowed_specials(r"^[a-zA-Z0-9\s.,\-_!]+$"), "-.,_!");
/// ```
pub fn allowed_specials(pattern: &str) -> String {
    let class = pattern
        .split_once('[')
        .and_then(|(_, rest)| rest.split_once(']'))
        .map_or("", |(class, _)| class);

    let mut out = String::new();
    let mut chars = class.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            // `\s`, `\d` and friends are classes, not literal symbols.
            if chars.peek().is_some_and(|n| n.is_ascii_alphanumeric()) {
                chars.next();
            }
            continue;
        }
        if is_plain_letter(c) || c.is_whitespace() {
            continue;
        }
        if !out.contains(c) {
            out.push(c);
        }
    }
    out
}

const fn is_plain_letter(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, 'а'..='я' | 'А'..='Я')
}
