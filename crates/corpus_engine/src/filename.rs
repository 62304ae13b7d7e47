use sha2::{Digest, Sha256};

const MAX_NAME_LEN: usize = 120;

/// Document id and file name for a document: `{base_name}_{uid}`.
///
/// Characters that are not portable in file names become `_`. When that (or
/// truncation) changed anything, a short hash of the raw uid is appended so
/// distinct uids never share a file.
pub fn document_id(base_name: &str, uid: &str) -> String {
    let raw = format!("{base_name}_{uid}");
    let mut cleaned: String = raw
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    cleaned = cleaned.trim_matches(&[' ', '.'][..]).to_string();

    let mut altered = cleaned != raw;
    if cleaned.len() > MAX_NAME_LEN {
        let mut end = MAX_NAME_LEN;
        while !cleaned.is_char_boundary(end) {
            end -= 1;
        }
        cleaned.truncate(end);
        altered = true;
    }
    if cleaned.is_empty() || is_reserved_windows_name(&cleaned) {
        altered = true;
    }

    if altered {
        format!("{cleaned}--{}", short_hash(uid))
    } else {
        cleaned
    }
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().take(4).map(|byte| format!("{byte:02x}")).collect()
}
