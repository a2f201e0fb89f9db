/// Key produced for every record. The empty string marks a record with no usable email domain.
pub type DomainKey = String;

pub const SENTINEL: &str = "";

pub const DEFAULT_DELIMITER: u8 = b',';

/// Per-record transform applied by the worker pool.
///
/// Implementations must be pure: workers call `apply` concurrently on a shared reference.
pub trait Transform: Sync {
    fn apply(&self, record: &[u8]) -> DomainKey;
}

impl<F> Transform for F
where
    F: Fn(&[u8]) -> DomainKey + Sync,
{
    fn apply(&self, record: &[u8]) -> DomainKey {
        self(record)
    }
}

/// Extracts the domain of the first email address in a delimited record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmailDomain {
    pub delimiter: u8,
}

impl Default for EmailDomain {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

impl Transform for EmailDomain {
    fn apply(&self, record: &[u8]) -> DomainKey {
        extract_domain(record, self.delimiter)
    }
}

/// Returns the bytes between the first `@` and the next `delimiter`, or the sentinel.
pub fn extract_domain(record: &[u8], delimiter: u8) -> DomainKey {
    let Some(at) = record.iter().position(|&b| b == b'@') else {
        return DomainKey::new();
    };

    let rest = &record[at + 1..];
    match rest.iter().position(|&b| b == delimiter) {
        Some(end) => String::from_utf8_lossy(&rest[..end]).into_owned(),
        None => DomainKey::new(),
    }
}

pub fn redact_domain(domain: &str) -> String {
    let parts: Vec<&str> = domain.split('.').collect();
    if parts.len() <= 1 {
        return domain.to_string();
    }

    let tld = parts[parts.len() - 1];
    if parts[parts.len() - 2].len() <= 3 {
        return format!("???.{}", tld);
    }

    let mut redacted = parts[..parts.len() - 1]
        .iter()
        .map(|part| "*".repeat(part.chars().count()))
        .collect::<Vec<_>>()
        .join(".");
    redacted.push('.');
    redacted.push_str(tld);
    redacted
}
