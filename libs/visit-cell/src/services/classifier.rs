use crate::models::LogicalStatus;

const ACCEPTED_TOKENS: [&str; 4] = ["confirmed", "accepted", "acceptee", "validee"];
const REFUSED_TOKENS: [&str; 5] = ["cancelled", "refused", "refusee", "rejetee", "rejected"];
const COMPLETED_TOKENS: [&str; 1] = ["completed"];

/// Maps a raw server status onto [`LogicalStatus`].
///
/// Matching ignores case, surrounding whitespace and French accents. Absent or
/// unknown values are `Pending`. Pure and total.
pub fn classify(raw_status: Option<&str>) -> LogicalStatus {
    let Some(raw) = raw_status else {
        return LogicalStatus::Pending;
    };

    let token = fold(raw);
    if ACCEPTED_TOKENS.contains(&token.as_str()) {
        LogicalStatus::Accepted
    } else if REFUSED_TOKENS.contains(&token.as_str()) {
        LogicalStatus::Refused
    } else if COMPLETED_TOKENS.contains(&token.as_str()) {
        LogicalStatus::Completed
    } else {
        LogicalStatus::Pending
    }
}

fn fold(raw: &str) -> String {
    raw.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(strip_accent)
        .collect()
}

fn strip_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}
