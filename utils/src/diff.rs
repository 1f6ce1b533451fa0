use std::fmt::Debug;

pub use similar_asserts;

/// Line diff of the pretty printed debug output of `have` and `want`.
#[must_use]
pub fn render<H, W>(have: &H, want: &W) -> String
where
    H: Debug + ?Sized,
    W: Debug + ?Sized,
{
    let have = format!("{have:#?}");
    let want = format!("{want:#?}");
    similar_asserts::SimpleDiff::from_str(&have, &want, "have", "want").to_string()
}

/// Panics with a labeled diff if `have != want`.
///
/// ```
/// utils::diff::assert_eq!(have: vec![1, 2], want: vec![1, 2]);
/// ```
#[macro_export]
macro_rules! assert_eq {
    (have: $have:expr, want: $want:expr $(,)?) => {{
        match (&($have), &($want)) {
            (have, want) => {
                if !(*have == *want) {
                    panic!(
                        "assertion failed: `(have == want)`\n\n{}",
                        $crate::diff::render(have, want)
                    );
                }
            }
        }
    }};
    (have: $have:expr, want: $want:expr, $($arg:tt)+) => {{
        match (&($have), &($want)) {
            (have, want) => {
                if !(*have == *want) {
                    panic!(
                        "assertion failed: `(have == want)`: {}\n\n{}",
                        format_args!($($arg)+),
                        $crate::diff::render(have, want)
                    );
                }
            }
        }
    }};
}

pub use crate::assert_eq;

#[cfg(test)]
mod tests {
    #[test]
    fn render_marks_changed_lines() {
        let rendered = super::render(&vec![1.0, 2.0], &vec![1.0, 2.5]);
        assert!(rendered.contains("have"), "{rendered}");
        assert!(rendered.contains("2.5"), "{rendered}");
    }

    #[test]
    fn equal_values_pass() {
        crate::diff::assert_eq!(have: [1_u8, 2], want: [1_u8, 2]);
        crate::diff::assert_eq!(have: "tiled:8", want: "tiled:8", "schedule {}", 8);
    }

    #[test]
    #[should_panic(expected = "have == want")]
    fn unequal_values_panic() {
        crate::diff::assert_eq!(have: vec![3], want: vec![4]);
    }
}
