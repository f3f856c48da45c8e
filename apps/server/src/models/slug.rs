//! URL slugs for brand names

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Lowercase ASCII slug: diacritics stripped, runs of anything else collapsed to one `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    let folded = input
        .chars()
        .map(|c| match c {
            // Dotless and dotted i do not decompose to a plain `i`.
            'ı' | 'İ' => 'i',
            other => other,
        })
        .nfkd()
        .filter(|c| !is_combining_mark(*c));

    for c in folded {
        let replacement = match c {
            'ß' => Some("ss"),
            'æ' | 'Æ' => Some("ae"),
            'ø' | 'Ø' => Some("o"),
            'đ' | 'Đ' => Some("d"),
            'ł' | 'Ł' => Some("l"),
            _ => None,
        };

        if c.is_ascii_alphanumeric() || replacement.is_some() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            match replacement {
                Some(text) => slug.push_str(text),
                None => slug.push(c.to_ascii_lowercase()),
            }
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn basic_words() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  --Hello,,  World!-- "), "hello-world");
        assert_eq!(slugify("A1 B2"), "a1-b2");
    }

    #[test]
    fn diacritics_and_turkish_i() {
        assert_eq!(slugify("Çağ Şöğüt"), "cag-sogut");
        assert_eq!(slugify("İstanbul Işık"), "istanbul-isik");
        assert_eq!(slugify("Crème Brûlée"), "creme-brulee");
        assert_eq!(slugify("Straße"), "strasse");
    }

    #[test]
    fn nothing_sluggable() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }
}
