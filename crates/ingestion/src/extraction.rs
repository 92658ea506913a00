//! Line aggregation and field extraction (spec.md §4.3 steps 1-2): turns a
//! flat bag of OCR tokens into candidate line-items with typed fields.

use {crate::ocr::OcrToken, regex::Regex};

/// Tokens within this vertical distance of each other are treated as the
/// same printed line of the form.
const LINE_GAP: f64 = 12.0;

/// A line of OCR tokens grouped by geometric proximity, left-to-right.
#[derive(Clone, Debug)]
pub struct CandidateLine {
    pub line: i32,
    pub tokens: Vec<OcrToken>,
}

/// Groups tokens into lines by `y` proximity (spec.md §4.3 step 1). Tokens
/// are sorted top-to-bottom, then left-to-right within a line.
pub fn aggregate_lines(mut tokens: Vec<OcrToken>) -> Vec<CandidateLine> {
    tokens.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal));

    let mut lines: Vec<Vec<OcrToken>> = Vec::new();
    for token in tokens {
        match lines.last_mut() {
            Some(current) if (token.y - current[0].y).abs() <= LINE_GAP => current.push(token),
            _ => lines.push(vec![token]),
        }
    }

    lines
        .into_iter()
        .enumerate()
        .map(|(idx, mut line_tokens)| {
            line_tokens.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
            CandidateLine {
                line: idx as i32 + 1,
                tokens: line_tokens,
            }
        })
        .collect()
}

fn serial_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9\-]{3,}$").expect("valid regex"))
}

fn quantity_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,4}$").expect("valid regex"))
}

const KNOWN_UNITS_OF_ISSUE: &[&str] = &[
    "EA", "PR", "BX", "CS", "DZ", "GAL", "LB", "PG", "RO", "ST", "KT", "SET",
];

fn looks_like_serial(text: &str) -> bool {
    serial_regex().is_match(text)
        && text.chars().any(|c| c.is_ascii_alphabetic())
        && text.chars().any(|c| c.is_ascii_digit())
}

/// Fields pulled out of one `CandidateLine` (spec.md §4.3 step 2): `nsn`
/// (pattern `NNNN-NN-NNN-NNNN`), `serial_number`, `name`/`description`,
/// `quantity`, and `unit_of_issue`, via per-field regex. Fuzzy matching
/// against the reference catalog happens afterward in the pipeline, once a
/// `CatalogLookup` is available.
#[derive(Clone, Debug, Default)]
pub struct ExtractedFields {
    pub nsn_candidate: Option<String>,
    pub serial_number: Option<String>,
    pub name: String,
    pub quantity: i32,
    pub unit_of_issue: Option<String>,
    /// Mean OCR confidence across every token that contributed to this
    /// line, i.e. the line's `item_confidence` (spec.md §4.3 step 5).
    pub item_confidence: f64,
}

/// Extracts typed fields from a line's tokens. A token is claimed by at
/// most one field, in priority order (nsn > serial > quantity > unit of
/// issue); everything left over is joined into `name`.
pub fn extract_fields(line: &CandidateLine) -> ExtractedFields {
    let mut nsn_candidate = None;
    let mut serial_number = None;
    let mut quantity = None;
    let mut unit_of_issue = None;
    let mut name_parts = Vec::new();

    for token in &line.tokens {
        let text = token.text.trim();
        if text.is_empty() {
            continue;
        }
        if nsn_candidate.is_none() && looks_like_nsn_candidate(text) {
            nsn_candidate = Some(text.to_string());
        } else if serial_number.is_none() && looks_like_serial(text) {
            serial_number = Some(text.to_string());
        } else if quantity.is_none() && quantity_regex().is_match(text) {
            quantity = Some(text.parse::<i32>().unwrap_or(1));
        } else if unit_of_issue.is_none()
            && KNOWN_UNITS_OF_ISSUE.contains(&text.to_uppercase().as_str())
        {
            unit_of_issue = Some(text.to_uppercase());
        } else {
            name_parts.push(text.to_string());
        }
    }

    let item_confidence = if line.tokens.is_empty() {
        0.0
    } else {
        line.tokens.iter().map(|t| t.confidence).sum::<f64>() / line.tokens.len() as f64
    };

    ExtractedFields {
        nsn_candidate,
        serial_number,
        name: name_parts.join(" ").trim().to_string(),
        quantity: quantity.unwrap_or(1).max(1),
        unit_of_issue,
        item_confidence,
    }
}

/// Loose-enough filter to decide a token is worth treating as an NSN read
/// (even if it fails strict validation once catalog-assembled, in which
/// case it becomes an `NsnUnparseable` verification reason downstream):
/// four dash-separated numeric groups, OCR noise tolerated in group
/// boundaries.
fn looks_like_nsn_candidate(text: &str) -> bool {
    let digits_and_dashes = text.chars().all(|c| c.is_ascii_digit() || c == '-');
    digits_and_dashes && text.matches('-').count() == 3 && text.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::OcrToken;

    fn token(text: &str, confidence: f64, x: f64, y: f64) -> OcrToken {
        OcrToken { text: text.to_string(), confidence, x, y }
    }

    #[test]
    fn groups_tokens_by_vertical_proximity() {
        let tokens = vec![
            token("RIFLE", 0.9, 10.0, 100.0),
            token("M4", 0.9, 60.0, 101.0),
            token("SN-1234", 0.95, 10.0, 200.0),
        ];
        let lines = aggregate_lines(tokens);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].tokens.len(), 2);
        assert_eq!(lines[1].tokens.len(), 1);
    }

    #[test]
    fn extracts_nsn_serial_quantity_and_unit() {
        let line = CandidateLine {
            line: 1,
            tokens: vec![
                token("1005-01-234-5678", 0.95, 0.0, 0.0),
                token("SN-ABCD12", 0.9, 10.0, 0.0),
                token("RIFLE", 0.92, 20.0, 0.0),
                token("M4A1", 0.92, 30.0, 0.0),
                token("2", 0.9, 40.0, 0.0),
                token("EA", 0.9, 50.0, 0.0),
            ],
        };
        let fields = extract_fields(&line);
        assert_eq!(fields.nsn_candidate.as_deref(), Some("1005-01-234-5678"));
        assert_eq!(fields.serial_number.as_deref(), Some("SN-ABCD12"));
        assert_eq!(fields.name, "RIFLE M4A1");
        assert_eq!(fields.quantity, 2);
        assert_eq!(fields.unit_of_issue.as_deref(), Some("EA"));
    }

    #[test]
    fn defaults_quantity_to_one_when_absent() {
        let line = CandidateLine {
            line: 1,
            tokens: vec![token("RADIO", 0.9, 0.0, 0.0)],
        };
        assert_eq!(extract_fields(&line).quantity, 1);
    }
}
