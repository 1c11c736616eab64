//! Name/path machinery.
//!
//! Models qualified names of the form `Peripheral.Cluster.Register.Field`
//! and the two name forms a `derivedFrom`/absolute reference may address:
//! a concrete, possibly array-indexed segment (`Timer[0]`) or, before dim
//! expansion has run, the template form of a dim'd node (`Timer[%s]` /
//! `Timer%s`).

/// A dotted reference path such as `PeripheralA.ClusterA.RegisterA`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    pub fn parse(reference: &str) -> Self {
        Self {
            segments: reference.split('.').map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.segments.len() > 1
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn first(&self) -> &str {
        &self.segments[0]
    }

    /// Builds a canonical path by joining already-resolved segments, used
    /// both to name graph nodes and to report diagnostics.
    pub fn join(segments: &[&str]) -> String {
        segments.join(".")
    }
}

/// Returns the base identifier of a dim-template segment (`Name[%s]` or
/// `Name%s`), or `None` if `segment` is not in template form.
pub fn template_base(segment: &str) -> Option<&str> {
    segment
        .strip_suffix("[%s]")
        .or_else(|| segment.strip_suffix("%s"))
}

/// Returns the base identifier of a concrete array-indexed segment
/// (`Name[3]` -> `Name`), or `segment` unchanged if it carries no bracket
/// index.
pub fn concrete_base(segment: &str) -> &str {
    if segment.ends_with(']') {
        if let Some(idx) = segment.rfind('[') {
            let inside = &segment[idx + 1..segment.len() - 1];
            if !inside.is_empty() && inside.chars().all(|c| c.is_ascii_digit()) {
                return &segment[..idx];
            }
        }
    }
    segment
}

/// True if `candidate` (a concrete or template segment actually present in
/// the tree) matches `reference` (the segment written in a `derivedFrom` or
/// path reference).
pub fn segments_match(reference: &str, candidate: &str) -> bool {
    if reference == candidate {
        return true;
    }

    let reference_base = template_base(reference).unwrap_or(reference);
    let candidate_base = template_base(candidate).unwrap_or(candidate);

    if reference_base == candidate_base
        && (template_base(reference).is_some() || template_base(candidate).is_some())
    {
        return true;
    }

    concrete_base(reference) == concrete_base(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_paths() {
        let p = Path::parse("Peripheral.Cluster.Register.Field");
        assert_eq!(
            p.segments(),
            &["Peripheral", "Cluster", "Register", "Field"]
        );
        assert!(p.is_absolute());

        let single = Path::parse("RegisterA");
        assert!(!single.is_absolute());
    }

    #[test]
    fn matches_concrete_against_template() {
        assert!(segments_match("Timer[0]", "Timer[%s]"));
        assert!(segments_match("Timer0", "Timer%s"));
        assert!(!segments_match("Timer[0]", "Other[%s]"));
    }

    #[test]
    fn matches_identical_concrete_segments() {
        assert!(segments_match("RegisterA", "RegisterA"));
        assert!(!segments_match("RegisterA", "RegisterB"));
    }

    #[test]
    fn concrete_base_strips_numeric_index_only() {
        assert_eq!(concrete_base("Timer[0]"), "Timer");
        assert_eq!(concrete_base("Timer[%s]"), "Timer[%s]");
        assert_eq!(concrete_base("Plain"), "Plain");
    }
}
