//! Name validation
//!
//! Sanitises user supplied names and checks upload types.

use crate::error::StorageError;

/// Characters stripped from user supplied names.
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '\0'];

/// Longest name kept, in characters.
const MAX_NAME_LENGTH: usize = 255;

/// Sanitize a filename, keeping CJK and other unicode characters.
pub fn safe_filename(filename: &str) -> String {
    if filename.is_empty() {
        return String::new();
    }

    let cleaned: String = filename
        .chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == ' ' || c == '.');

    if cleaned.is_empty() {
        return "unnamed".to_string();
    }

    if cleaned.chars().count() <= MAX_NAME_LENGTH {
        return cleaned.to_string();
    }

    let (stem, ext) = match cleaned.rfind('.') {
        Some(idx) if idx > 0 => cleaned.split_at(idx),
        _ => (cleaned, ""),
    };
    let keep = MAX_NAME_LENGTH.saturating_sub(ext.chars().count());
    let mut truncated: String = stem.chars().take(keep).collect();
    truncated.push_str(ext);
    truncated
}

/// Trims, rejects empty input and sanitises a name for a new or renamed entry.
pub fn validate_name(raw: &str, field: &'static str) -> Result<String, StorageError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(StorageError::EmptyField(field));
    }

    let name = safe_filename(trimmed);
    if name.is_empty() || name == "." || name == ".." {
        return Err(StorageError::InvalidName(trimmed.to_string()));
    }
    Ok(name)
}

/// Check the extension against the configured allow-list; an empty list allows all.
pub fn allowed_file(filename: &str, allowed_extensions: &[String]) -> bool {
    if allowed_extensions.is_empty() {
        return true;
    }
    match filename.rsplit_once('.') {
        Some((_, ext)) => {
            let ext = ext.to_lowercase();
            allowed_extensions.iter().any(|allowed| *allowed == ext)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_filename_strips_forbidden_characters() {
        assert_eq!(safe_filename("a<b>c:d\"e|f?g.txt"), "abcdefg.txt");
        assert_eq!(safe_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(safe_filename("  report.txt. "), "report.txt");
    }

    #[test]
    fn test_safe_filename_keeps_unicode() {
        assert_eq!(safe_filename("报告 2024.txt"), "报告 2024.txt");
    }

    #[test]
    fn test_safe_filename_falls_back_to_unnamed() {
        assert_eq!(safe_filename("..."), "unnamed");
        assert_eq!(safe_filename("///"), "unnamed");
        assert_eq!(safe_filename(""), "");
    }

    #[test]
    fn test_long_names_keep_extension() {
        let long = format!("{}.txt", "x".repeat(300));
        let safe = safe_filename(&long);
        assert_eq!(safe.chars().count(), MAX_NAME_LENGTH);
        assert!(safe.ends_with(".txt"));
    }

    #[test]
    fn test_validate_name() {
        assert!(matches!(
            validate_name("   ", "name"),
            Err(StorageError::EmptyField("name"))
        ));
        assert_eq!(validate_name(" notes ", "name").unwrap(), "notes");
    }

    #[test]
    fn test_allowed_file() {
        let allowed = vec!["png".to_string(), "txt".to_string()];
        assert!(allowed_file("a.PNG", &allowed));
        assert!(!allowed_file("a.exe", &allowed));
        assert!(!allowed_file("README", &allowed));
        assert!(allowed_file("anything", &[]));
    }
}
