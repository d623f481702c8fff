//! Qualified-name utilities for nested module hierarchies.
//!
//! Submodules are keyed by qualified names such as `Dma::Channel::Csr`,
//! built from `\w+` identifier segments joined by [`SUBMODULE_SEPARATOR`].
//! The separator contains characters that cannot occur in an identifier, so
//! it never collides with user-chosen names.

/// Separator between parent and child segments of a qualified module name.
pub const SUBMODULE_SEPARATOR: &str = "::";

/// The leading segment of a qualified name (the top-level ancestor).
pub fn base_segment(name: &str) -> &str {
    match name.find(SUBMODULE_SEPARATOR) {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// The trailing segment of a qualified name (the module's own identifier).
pub fn last_segment(name: &str) -> &str {
    match name.rfind(SUBMODULE_SEPARATOR) {
        Some(idx) => &name[idx + SUBMODULE_SEPARATOR.len()..],
        None => name,
    }
}

/// The qualified name of the immediate parent, or `None` for a top-level name.
pub fn parent_path(name: &str) -> Option<&str> {
    name.rfind(SUBMODULE_SEPARATOR).map(|idx| &name[..idx])
}

/// Nesting depth: the number of separators in the qualified name.
pub fn depth(name: &str) -> usize {
    name.matches(SUBMODULE_SEPARATOR).count()
}

/// Insert `suffix` immediately after the first occurrence of `segment`
/// inside `name`. Returns the name unchanged if `segment` does not occur.
///
/// Used by repeat expansion to derive clone names:
/// `insert_after("Dma::Channel", "Dma", "_2")` is `"Dma_2::Channel"`.
pub fn insert_after(name: &str, segment: &str, suffix: &str) -> String {
    match name.find(segment) {
        Some(idx) => {
            let split = idx + segment.len();
            format!("{}{}{}", &name[..split], suffix, &name[split..])
        }
        None => name.to_string(),
    }
}

/// Strip a trailing `_<digits>` repeat suffix from a single name segment.
pub fn strip_repeat_suffix(segment: &str) -> &str {
    match segment.rsplit_once('_') {
        Some((head, tail)) if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) => head,
        _ => segment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_of_nested_name() {
        assert_eq!(base_segment("Dma::Channel::Csr"), "Dma");
        assert_eq!(last_segment("Dma::Channel::Csr"), "Csr");
        assert_eq!(parent_path("Dma::Channel::Csr"), Some("Dma::Channel"));
        assert_eq!(depth("Dma::Channel::Csr"), 2);
    }

    #[test]
    fn segments_of_flat_name() {
        assert_eq!(base_segment("Uart"), "Uart");
        assert_eq!(last_segment("Uart"), "Uart");
        assert_eq!(parent_path("Uart"), None);
        assert_eq!(depth("Uart"), 0);
    }

    #[test]
    fn insert_suffix_after_segment() {
        assert_eq!(insert_after("Dma::Channel", "Dma", "_2"), "Dma_2::Channel");
        assert_eq!(insert_after("Dma", "Dma", "_1"), "Dma_1");
        assert_eq!(insert_after("Uart", "Dma", "_1"), "Uart");
    }

    #[test]
    fn repeat_suffix_stripping() {
        assert_eq!(strip_repeat_suffix("Channel_3"), "Channel");
        assert_eq!(strip_repeat_suffix("Channel"), "Channel");
        assert_eq!(strip_repeat_suffix("Port_a"), "Port_a");
        assert_eq!(strip_repeat_suffix("Rx_10"), "Rx");
    }
}
