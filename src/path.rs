//! Path parsing and the process-wide path-parse cache.
//!
//! `spec.md` §4.3 / §5: paths are dot-segmented with bracket sub-segments
//! (a purely-digit bracket is a numeric sequence index, anything else is a
//! property name); parsed paths are cached by their source string. The cache
//! is read-dominant, append-only, and must never evict while a render may be
//! reading it (§5), so it is a plain `HashMap` rather than the teacher's
//! `lru::LruCache` — an LRU's eviction would violate that constraint here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Property(String),
    Index(usize),
}

fn cache() -> &'static Mutex<HashMap<String, Arc<[PathSegment]>>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Arc<[PathSegment]>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Parses (or retrieves from cache) the segments of a path string such as
/// `user.profile.name` or `users[0].name`.
pub fn parse_path(path: &str) -> Arc<[PathSegment]> {
    if let Some(hit) = cache().lock().unwrap().get(path) {
        return hit.clone();
    }
    let segments: Arc<[PathSegment]> = parse_path_uncached(path).into();
    cache()
        .lock()
        .unwrap()
        .insert(path.to_string(), segments.clone());
    segments
}

fn parse_path_uncached(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let bytes = path.as_bytes();
    let mut seg_start = 0usize;

    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'.' => {
                if i > seg_start {
                    segments.push(PathSegment::Property(path[seg_start..i].to_string()));
                }
                i += 1;
                seg_start = i;
            }
            b'[' => {
                if i > seg_start {
                    segments.push(PathSegment::Property(path[seg_start..i].to_string()));
                }
                let close = path[i..].find(']').map(|o| i + o);
                if let Some(close) = close {
                    let inner = &path[i + 1..close];
                    if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit()) {
                        if let Ok(idx) = inner.parse::<usize>() {
                            segments.push(PathSegment::Index(idx));
                        }
                    } else {
                        segments.push(PathSegment::Property(inner.to_string()));
                    }
                    i = close + 1;
                    // an optional trailing '.' right after ']' is consumed normally
                    seg_start = i;
                    if i < bytes.len() && bytes[i] == b'.' {
                        i += 1;
                        seg_start = i;
                    }
                } else {
                    // unterminated bracket: treat the rest as a literal property segment
                    segments.push(PathSegment::Property(path[seg_start..].to_string()));
                    seg_start = bytes.len();
                    i = bytes.len();
                }
            }
            _ => i += 1,
        }
    }
    if seg_start < bytes.len() {
        segments.push(PathSegment::Property(path[seg_start..].to_string()));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_path() {
        let segs = parse_path_uncached("user.profile.name");
        assert_eq!(
            segs,
            vec![
                PathSegment::Property("user".into()),
                PathSegment::Property("profile".into()),
                PathSegment::Property("name".into()),
            ]
        );
    }

    #[test]
    fn parses_numeric_index() {
        let segs = parse_path_uncached("users[0].name");
        assert_eq!(
            segs,
            vec![
                PathSegment::Property("users".into()),
                PathSegment::Index(0),
                PathSegment::Property("name".into()),
            ]
        );
    }

    #[test]
    fn non_numeric_bracket_is_a_property() {
        let segs = parse_path_uncached("a[b]");
        assert_eq!(
            segs,
            vec![
                PathSegment::Property("a".into()),
                PathSegment::Property("b".into()),
            ]
        );
    }

    #[test]
    fn cache_returns_equal_segments_on_repeat_calls() {
        let a = parse_path("x.y[2]");
        let b = parse_path("x.y[2]");
        assert_eq!(a, b);
    }
}
