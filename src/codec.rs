//! Pattern identifier encoding shared with the reverse index.
//!
//! The index stores patterns with `-` between fields; callers see `,`.
//! Explicit positions arrive comma separated and are looked up dot separated.
//! Embedded separators in class or method names are not escaped: the
//! convention must match indexes that already exist on disk.

/// Field separator inside persisted index patterns.
const INDEX_SEPARATOR: char = '-';

/// Field separator in consumer-facing patterns and positions.
const PATTERN_SEPARATOR: char = ',';

/// Separator between qualified class name and method in index keys.
const QUALIFIER: char = '.';

/// Convert a raw index pattern to consumer form: every `-` becomes `,`.
pub fn decode(raw: &str) -> String {
    return raw.replace(INDEX_SEPARATOR, &PATTERN_SEPARATOR.to_string());
}

/// Convert an externally supplied position to an index key: every `,` becomes `.`.
pub fn normalize_position(raw: &str) -> String {
    return raw.replace(PATTERN_SEPARATOR, &QUALIFIER.to_string());
}

/// Build the index key for a method: `class.method`, or the bare method
/// when the class is empty.
pub fn qualify(class: &str, method: &str) -> String {
    if class.is_empty() {
        return method.to_string();
    }
    return format!("{class}{QUALIFIER}{method}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_touches_only_dashes() {
        assert_eq!(decode("com-FooTest-test1"), "com,FooTest,test1");
        assert_eq!(decode("a,b-c"), "a,b,c");
    }

    #[test]
    fn normalize_touches_only_commas() {
        assert_eq!(normalize_position("com,Foo,bar"), "com.Foo.bar");
        assert_eq!(normalize_position("a-b,c"), "a-b.c");
    }

    #[test]
    fn mixed_separators_take_independent_paths() {
        let raw = "x-y,z";
        assert_eq!(decode(raw), "x,y,z");
        assert_eq!(normalize_position(raw), "x-y.z");
    }

    #[test]
    fn no_separator_is_a_no_op() {
        assert_eq!(decode("plain"), "plain");
        assert_eq!(normalize_position("plain"), "plain");
        assert_eq!(decode(""), "");
    }

    #[test]
    fn qualify_joins_with_dot() {
        assert_eq!(qualify("pkg.Cls", "m"), "pkg.Cls.m");
        assert_eq!(qualify("", "m"), "m");
    }
}
