use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Maps header names from the first row of a CSV file to column indices.
///
/// Lookups ignore case and surrounding whitespace/quotes, so `Date`, ` date ` and `"DATE"` all
/// resolve to the same column. When a header appears more than once the first occurrence wins.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct Mapping {
    headers: Vec<Header>,
    header_map: HashMap<Header, usize>,
}

impl Mapping {
    pub fn new<S, I>(headers: I) -> Self
    where
        S: AsRef<str>,
        I: IntoIterator<Item = S>,
    {
        let headers: Vec<Header> = headers.into_iter().map(|s| Header::new(s.as_ref())).collect();
        let mut header_map = HashMap::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            header_map.entry(header.clone()).or_insert(idx);
        }
        Self {
            headers,
            header_map,
        }
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index(name).is_some()
    }

    pub fn index(&self, name: &str) -> Option<usize> {
        self.header_map.get(&Header::new(name)).copied()
    }

    /// Returns the value in `row` under the header `name`. `None` if the header is unknown or the
    /// row is too short to have that column.
    pub fn get<'a, S>(&self, row: &'a [S], name: &str) -> Option<&'a str>
    where
        S: AsRef<str>,
    {
        self.index(name)
            .and_then(|ix| row.get(ix))
            .map(|s| s.as_ref())
    }
}

/// A normalized header name: trimmed, unquoted and lowercase.
#[derive(Default, Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Header(String);

impl Header {
    pub fn new(raw: &str) -> Self {
        Self(
            raw.trim()
                .trim_start_matches('\u{feff}')
                .trim_matches('"')
                .trim()
                .to_lowercase(),
        )
    }
}

impl AsRef<str> for Header {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}
