//! Naming helpers: English pluralization, underscoring, constant names.
//!
//! Covers the inflections enum attributes and values actually hit
//! (`status` -> `statuses`, `category` -> `categories`, `box` -> `boxes`).
//! Hosts with their own inflector override [`crate::ModelSchema::pluralize`].

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "jeans",
    "police",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("child", "children"),
    ("sex", "sexes"),
    ("move", "moves"),
    ("zombie", "zombies"),
    ("ox", "oxen"),
];

/// Pluralize an English word, preserving its prefix casing.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }

    // Only the last underscore-separated segment is inflected.
    let (head, last) = match word.rfind('_') {
        Some(idx) => (&word[..=idx], &word[idx + 1..]),
        None => ("", word),
    };
    let lower = last.to_ascii_lowercase();

    if lower.is_empty() || UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }

    for (singular, plural) in IRREGULAR {
        if lower == *singular {
            return format!("{}{}", head, match_case(last, plural));
        }
        if lower == *plural {
            return word.to_string();
        }
    }

    format!("{}{}", head, pluralize_regular(last, &lower))
}

fn pluralize_regular(word: &str, lower: &str) -> String {
    let stem_len = |suffix: &str| word.len() - suffix.len();

    if lower.ends_with("quiz") {
        return format!("{}zes", word);
    }
    if lower.ends_with("mouse") || lower.ends_with("louse") {
        return format!("{}ice", &word[..stem_len("ouse")]);
    }
    for suffix in ["matrix", "vertex", "index"] {
        if lower.ends_with(suffix) {
            return format!("{}ices", &word[..stem_len("ix")]);
        }
    }
    for suffix in ["alias", "status", "bus"] {
        if lower.ends_with(suffix) {
            return format!("{}es", word);
        }
    }
    for suffix in ["octopus", "virus"] {
        if lower.ends_with(suffix) {
            return format!("{}i", &word[..stem_len("us")]);
        }
    }
    for suffix in ["axis", "testis"] {
        if lower.ends_with(suffix) {
            return format!("{}es", &word[..stem_len("is")]);
        }
    }
    if lower.ends_with("sis") {
        return format!("{}ses", &word[..stem_len("sis")]);
    }
    if lower.ends_with("x") || lower.ends_with("ch") || lower.ends_with("ss") || lower.ends_with("sh")
    {
        return format!("{}es", word);
    }
    if lower.ends_with('y') && lower.len() > 1 {
        let before = lower.as_bytes()[lower.len() - 2];
        if !b"aeiou".contains(&before) || lower.ends_with("quy") {
            return format!("{}ies", &word[..stem_len("y")]);
        }
    }
    if lower.ends_with("hive") {
        return format!("{}s", word);
    }
    if lower.ends_with("fe") && !lower.ends_with("ffe") {
        return format!("{}ves", &word[..stem_len("fe")]);
    }
    if lower.ends_with("lf") || lower.ends_with("rf") {
        return format!("{}ves", &word[..stem_len("f")]);
    }
    if lower.ends_with("tum") || lower.ends_with("ium") {
        return format!("{}a", &word[..stem_len("um")]);
    }
    if lower.ends_with("buffalo") || lower.ends_with("tomato") {
        return format!("{}es", word);
    }
    if lower.ends_with('s') {
        return word.to_string();
    }
    format!("{}s", word)
}

fn match_case(original: &str, replacement: &str) -> String {
    if original.chars().all(|c| !c.is_ascii_lowercase()) {
        return replacement.to_ascii_uppercase();
    }
    if original.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        let mut chars = replacement.chars();
        return match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        };
    }
    replacement.to_string()
}

/// Convert a model name to its underscored path form.
///
/// `LineItem` -> `line_item`, `Admin::HTTPLog` -> `admin/http_log`.
pub fn underscore(name: &str) -> String {
    let path = name.replace("::", "/");
    let chars: Vec<char> = path.chars().collect();
    let mut out = String::with_capacity(path.len() + 4);

    for (idx, &ch) in chars.iter().enumerate() {
        if ch == '-' {
            out.push('_');
            continue;
        }
        if ch.is_ascii_uppercase() {
            let prev = idx.checked_sub(1).map(|i| chars[i]);
            let next = chars.get(idx + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }

    out
}

/// Constant name for a member or collection (`in_delivery` -> `IN_DELIVERY`).
pub fn constant_name(name: &str) -> String {
    name.to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pluralize_regular_words() {
        assert_eq!(pluralize("status"), "statuses");
        assert_eq!(pluralize("state"), "states");
        assert_eq!(pluralize("color"), "colors");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("match"), "matches");
        assert_eq!(pluralize("wife"), "wives");
        assert_eq!(pluralize("half"), "halves");
        assert_eq!(pluralize("analysis"), "analyses");
        assert_eq!(pluralize("medium"), "media");
    }

    #[test]
    fn test_pluralize_irregular_and_uncountable() {
        assert_eq!(pluralize("person"), "people");
        assert_eq!(pluralize("people"), "people");
        assert_eq!(pluralize("child"), "children");
        assert_eq!(pluralize("sheep"), "sheep");
        assert_eq!(pluralize("information"), "information");
    }

    #[test]
    fn test_pluralize_compound_and_case() {
        assert_eq!(pluralize("partner_type"), "partner_types");
        assert_eq!(pluralize("delivery_status"), "delivery_statuses");
        assert_eq!(pluralize("sales_person"), "sales_people");
        assert_eq!(pluralize("Person"), "People");
        assert_eq!(pluralize("CartType"), "CartTypes");
        assert_eq!(pluralize(""), "");
    }

    #[test]
    fn test_underscore() {
        assert_eq!(underscore("Product"), "product");
        assert_eq!(underscore("LineItem"), "line_item");
        assert_eq!(underscore("Admin::LineItem"), "admin/line_item");
        assert_eq!(underscore("HTTPLog"), "http_log");
        assert_eq!(underscore("Order2Item"), "order2_item");
    }

    #[test]
    fn test_constant_name() {
        assert_eq!(constant_name("in_delivery"), "IN_DELIVERY");
        assert_eq!(constant_name("statuses"), "STATUSES");
    }
}
