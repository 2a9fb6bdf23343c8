//! File names derived from layer paths

use std::collections::HashSet;

const RESERVED_CHARS: [char; 10] = ['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

/// Replace characters that are not allowed in file names with `-`
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if RESERVED_CHARS.contains(&c) { '-' } else { c })
        .collect()
}

/// Hands out unique names within one export.
///
/// The first request for a name gets it unchanged; later requests get
/// ` (2)`, ` (3)`, ... appended.
#[derive(Debug, Default)]
pub struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, name: &str) -> String {
        if self.taken.insert(name.to_string()) {
            return name.to_string();
        }

        let mut n = 2usize;
        loop {
            let candidate = format!("{} ({})", name, n);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
