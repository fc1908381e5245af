//! Variable environment for rendering: a shared immutable base plus a
//! per-dotfile overlay.
use std::collections::BTreeMap;
use std::sync::Arc;

/// Immutable variable base shared by every dotfile of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables(Arc<BTreeMap<String, String>>);

impl Variables {
    /// Wrap resolved variables.
    #[must_use]
    pub fn new(vars: BTreeMap<String, String>) -> Self {
        Self(Arc::new(vars))
    }

    /// Value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Every variable, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Variables defined by the user (`profile` and `_`-prefixed built-ins
    /// excluded).
    pub fn user_variables(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0
            .iter()
            .filter(|(k, _)| k.as_str() != "profile" && !k.starts_with('_'))
    }
}

/// Variables visible while handling one dotfile.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    base: Variables,
    overlay: BTreeMap<String, String>,
}

impl RenderContext {
    /// Context with the base only.
    #[must_use]
    pub fn new(base: &Variables) -> Self {
        Self {
            base: base.clone(),
            overlay: BTreeMap::new(),
        }
    }

    /// Context with a dotfile overlay; overlay entries shadow the base.
    #[must_use]
    pub fn with_overlay(base: &Variables, overlay: BTreeMap<String, String>) -> Self {
        Self {
            base: base.clone(),
            overlay,
        }
    }

    /// Value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.overlay
            .get(name)
            .map(String::as_str)
            .or_else(|| self.base.get(name))
    }

    /// Shared base.
    #[must_use]
    pub const fn base(&self) -> &Variables {
        &self.base
    }

    /// Flattened view handed to the template engine.
    #[must_use]
    pub fn merged(&self) -> BTreeMap<&str, &str> {
        self.base
            .iter()
            .chain(self.overlay.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn base() -> Variables {
        Variables::new(BTreeMap::from([
            ("editor".to_string(), "vim".to_string()),
            ("profile".to_string(), "home".to_string()),
            ("_dotdrop_dotpath".to_string(), "/repo".to_string()),
        ]))
    }

    #[test]
    fn overlay_shadows_base() {
        let ctx = RenderContext::with_overlay(
            &base(),
            BTreeMap::from([("editor".to_string(), "nvim".to_string())]),
        );
        assert_eq!(ctx.get("editor"), Some("nvim"));
        assert_eq!(ctx.merged()["editor"], "nvim");
        assert_eq!(ctx.base().get("editor"), Some("vim"));
    }

    #[test]
    fn overlays_do_not_leak_between_contexts() {
        let shared = base();
        let a = RenderContext::with_overlay(
            &shared,
            BTreeMap::from([("_dotfile_key".to_string(), "f_a".to_string())]),
        );
        let b = RenderContext::new(&shared);
        assert_eq!(a.get("_dotfile_key"), Some("f_a"));
        assert_eq!(b.get("_dotfile_key"), None);
    }

    #[test]
    fn user_variables_exclude_builtins() {
        let vars = base();
        let names: Vec<&String> = vars.user_variables().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["editor"]);
    }
}
