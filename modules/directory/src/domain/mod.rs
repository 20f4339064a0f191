pub mod companies;
pub mod people;

/// Identifier for new records.
fn new_id() -> String {
    nanoid::nanoid!()
}

/// Case-insensitive containment; an empty or missing needle matches.
fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    match needle.map(str::trim) {
        None | Some("") => true,
        Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment_ignores_case_and_empty_needles() {
        assert!(contains_ci("Dagobert", Some("OBE")));
        assert!(contains_ci("Dagobert", Some("")));
        assert!(contains_ci("Dagobert", None));
        assert!(!contains_ci("Dagobert", Some("x")));
    }
}
