use std::cmp::Ordering;

/// Bracket range inside an interface name, e.g. `[1-48]` or `[1,3,5-7]`
const RANGE_PATTERN: &str = r"(\[[\w,-]*[-,][\w,-]*\])";

/// Expand an interface name with bracket notation into individual names.
///
/// `Ethernet[1-3]` -> `Ethernet1, Ethernet2, Ethernet3`; names without a
/// range, or with a part that is not numeric, come back unchanged.
pub fn expand_interface_range(name: &str) -> Vec<String> {
    let re = match regex_lite::Regex::new(RANGE_PATTERN) {
        Ok(re) => re,
        Err(_) => return vec![name.to_string()],
    };
    let Some(m) = re.find(name) else {
        return vec![name.to_string()];
    };

    let content = &name[m.start() + 1..m.end() - 1];
    let prefix = &name[..m.start()];
    let suffix = &name[m.end()..];

    let mut expanded = Vec::new();
    for part in content.split(',') {
        if part.contains('-') {
            let bounds: Vec<&str> = part.split('-').collect();
            let (start, end) = match bounds.as_slice() {
                [start, end] if is_digits(start) && is_digits(end) => (*start, *end),
                _ => return vec![name.to_string()],
            };
            let (Ok(start), Ok(end)) = (start.parse::<u64>(), end.parse::<u64>()) else {
                return vec![name.to_string()];
            };
            for i in start..=end {
                expanded.push(format!("{}{}{}", prefix, i, suffix));
            }
        } else if is_digits(part) {
            expanded.push(format!("{}{}{}", prefix, part, suffix));
        } else {
            return vec![name.to_string()];
        }
    }

    if expanded.is_empty() {
        vec![name.to_string()]
    } else {
        expanded
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Num(u128),
    Text(&'a str),
}

impl Ord for Chunk<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Chunk::Num(a), Chunk::Num(b)) => a.cmp(b),
            (Chunk::Text(a), Chunk::Text(b)) => a.cmp(b),
            (Chunk::Num(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Num(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Chunk<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn natural_chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let bytes = s.as_bytes();
    while start < bytes.len() {
        let digit = bytes[start].is_ascii_digit();
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() == digit {
            end += 1;
        }
        let piece = &s[start..end];
        chunks.push(match piece.parse::<u128>() {
            Ok(n) if digit => Chunk::Num(n),
            _ => Chunk::Text(piece),
        });
        start = end;
    }
    chunks
}

/// Natural ordering: `Ethernet2` sorts before `Ethernet10`
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_chunks(a).cmp(&natural_chunks(b)).then_with(|| a.cmp(b))
}

pub fn sort_interface_names(names: &mut [String]) {
    names.sort_by(|a, b| natural_cmp(a, b));
}

/// Trailing `-NN` number of a generated device name (`dc1-leaf-03` -> 3)
pub fn device_number(name: &str) -> Option<u32> {
    name.rsplit('-').next().and_then(|n| n.parse().ok())
}

/// Drop the prefix length from an address (`10.0.0.1/32` -> `10.0.0.1`)
pub fn strip_mask(address: &str) -> &str {
    address.split('/').next().unwrap_or(address)
}

/// Decode the HTML entities Infrahub leaves in free-text attributes.
///
/// Numeric references (`&#45;`, `&#x2F;`) and the common named entities are
/// decoded; anything else is kept as written.
pub fn html_unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|semi| *semi <= 10)
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(num) = entity.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

/// Cut a label down to `max` characters, ending in `...` when shortened
pub fn truncate_name(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        return name.to_string();
    }
    let keep = max.saturating_sub(3);
    format!("{}...", name.chars().take(keep).collect::<String>())
}
