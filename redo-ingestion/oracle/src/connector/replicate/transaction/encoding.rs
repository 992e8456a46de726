//! Oracle 10g on a GBK database turns the quote closing a string literal into `?` when
//! the statement spans several rows of V$LOGMNR_CONTENTS.

use encoding_rs::GBK;
use memchr::memmem;

use crate::connector::client::{DatabaseInfo, OperationCode};

const INSERT_PATTERNS: [(&[u8], &[u8]); 1] = [(b"?,", b"',")];
const PREDICATE_PATTERNS: [(&[u8], &[u8]); 2] = [(b"? and", b"' and"), (b"? where", b"' where")];

pub fn needs_legacy_repair(info: Option<&DatabaseInfo>, multi_row: bool) -> bool {
    multi_row && info.is_some_and(|info| info.is_oracle10() && info.is_gbk())
}

/// Restores mis-escaped quotes on the GBK bytes of `sql`. Returns `None` if no pattern matched
/// or `sql` does not round-trip through GBK.
pub fn repair_legacy_quotes(sql: &str, operation_code: OperationCode) -> Option<String> {
    let patterns: &[(&[u8], &[u8])] = match operation_code {
        OperationCode::Insert => &INSERT_PATTERNS,
        _ => &PREDICATE_PATTERNS,
    };

    let (bytes, _, had_errors) = GBK.encode(sql);
    if had_errors {
        return None;
    }
    let mut repaired: Option<Vec<u8>> = None;
    for (from, to) in patterns {
        let current = repaired.as_deref().unwrap_or(&bytes);
        if let Some(replaced) = replace_all(current, from, to) {
            repaired = Some(replaced);
        }
    }

    let repaired = repaired?;
    let (text, _, had_errors) = GBK.decode(&repaired);
    (!had_errors).then(|| text.into_owned())
}

fn replace_all(haystack: &[u8], from: &[u8], to: &[u8]) -> Option<Vec<u8>> {
    let mut matches = memmem::find_iter(haystack, from).peekable();
    matches.peek()?;

    let mut output = Vec::with_capacity(haystack.len());
    let mut last = 0;
    for start in matches {
        output.extend_from_slice(&haystack[last..start]);
        output.extend_from_slice(to);
        last = start + from.len();
    }
    output.extend_from_slice(&haystack[last..]);
    Some(output)
}
