/// Run-length compression for persisted cache entries
///
/// Runs longer than three characters are written as `~<count>~<char>`. The
/// marker character itself is always written as a run, so decoding is never
/// ambiguous.

const MARKER: char = '~';
const MIN_RUN: usize = 4;

/// Largest payload `decompress` will produce, in bytes. Well above the
/// extension storage quota, so only corrupt input reaches it.
pub const MAX_DECODED_LEN: usize = 16 * 1024 * 1024;

/// Prefix that tags a compressed payload
pub const COMPRESSED_PREFIX: &str = "rle:";

pub fn compress(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }

        if run >= MIN_RUN || c == MARKER {
            out.push(MARKER);
            out.push_str(&run.to_string());
            out.push(MARKER);
            out.push(c);
        } else {
            for _ in 0..run {
                out.push(c);
            }
        }
        i += run;
    }

    out
}

/// Reverse of `compress`. Returns `None` for malformed input or output
/// that would exceed `MAX_DECODED_LEN`.
pub fn decompress(input: &str) -> Option<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if c != MARKER {
            if out.len() >= MAX_DECODED_LEN {
                return None;
            }
            out.push(c);
            continue;
        }

        let mut digits = String::new();
        loop {
            match chars.next()? {
                MARKER => break,
                d if d.is_ascii_digit() => digits.push(d),
                _ => return None,
            }
        }

        let count: usize = digits.parse().ok()?;
        let repeated = chars.next()?;
        let grown = count
            .checked_mul(repeated.len_utf8())
            .and_then(|bytes| bytes.checked_add(out.len()))?;
        if grown > MAX_DECODED_LEN {
            return None;
        }
        for _ in 0..count {
            out.push(repeated);
        }
    }

    Some(out)
}

/// Encode a serialized entry for the persistent tier
pub fn encode(serialized: &str, compress_enabled: bool) -> String {
    if compress_enabled {
        format!("{}{}", COMPRESSED_PREFIX, compress(serialized))
    } else {
        serialized.to_string()
    }
}

/// Decode a stored payload, compressed or not
pub fn decode(stored: &str) -> Option<String> {
    match stored.strip_prefix(COMPRESSED_PREFIX) {
        Some(body) => decompress(body),
        None => Some(stored.to_string()),
    }
}
