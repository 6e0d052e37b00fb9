// src/export/filter.rs
use crate::model::Space;

/// Include/exclude selection of spaces by key.
///
/// Keys compare case-insensitively. A non-empty include list is a whitelist
/// applied first; the exclude list then removes from what remains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpaceFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl SpaceFilter {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        let clean = |keys: Vec<String>| -> Vec<String> {
            keys.into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect()
        };
        Self {
            include: clean(include),
            exclude: clean(exclude),
        }
    }

    pub fn allows(&self, key: &str) -> bool {
        let listed = |keys: &[String]| keys.iter().any(|k| k.eq_ignore_ascii_case(key));
        (self.include.is_empty() || listed(&self.include)) && !listed(&self.exclude)
    }

    /// Keeps the allowed spaces, preserving their order.
    pub fn apply(&self, spaces: Vec<Space>) -> Vec<Space> {
        spaces
            .into_iter()
            .filter(|space| {
                let allowed = self.allows(space.key.as_str());
                if !allowed {
                    log::debug!("Skipping space {} (filtered)", space.key);
                }
                allowed
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SpaceKey;

    fn space(key: &str) -> Space {
        Space {
            id: key.to_lowercase(),
            key: SpaceKey::from_api(key),
            name: format!("Space {}", key),
            kind: "global".to_string(),
            status: "current".to_string(),
        }
    }

    fn keys(spaces: &[Space]) -> Vec<&str> {
        spaces.iter().map(|s| s.key.as_str()).collect()
    }

    #[test]
    fn test_empty_filter_allows_everything() {
        let filter = SpaceFilter::default();
        assert_eq!(keys(&filter.apply(vec![space("A"), space("B")])), vec!["A", "B"]);
    }

    #[test]
    fn test_include_then_exclude() {
        let filter = SpaceFilter::new(vec!["a".into(), "B".into()], vec!["b".into()]);
        let kept = filter.apply(vec![space("A"), space("B"), space("C")]);
        assert_eq!(keys(&kept), vec!["A"]);
    }

    #[test]
    fn test_exclude_only() {
        let filter = SpaceFilter::new(vec![], vec!["~personal".into(), " ".into()]);
        assert!(filter.allows("ENG"));
        assert!(!filter.allows("~PERSONAL"));
    }
}
