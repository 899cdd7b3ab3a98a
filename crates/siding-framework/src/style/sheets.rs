//! Per-widget stylesheet tracking.

use std::sync::{Arc, Weak};

use tracing::debug;

/// Prefix marking a raw stylesheet entry.
const DATA_PREFIX: &str = "data:";

/// A host widget that accepts a stylesheet.
pub trait StyledWidget: Send + Sync {
    fn style_sheet(&self) -> String;

    fn set_style_sheet(&self, qss: &str);
}

struct Entry {
    widget: Weak<dyn StyledWidget>,
    sheets: Vec<String>,
}

impl Entry {
    fn is(&self, widget: &Arc<dyn StyledWidget>) -> bool {
        std::ptr::addr_eq(self.widget.as_ptr(), Arc::as_ptr(widget))
    }
}

/// Widgets with managed stylesheets. Widgets are held weakly and forgotten
/// once dropped.
#[derive(Default)]
pub(crate) struct ManagedWidgets {
    entries: Vec<Entry>,
}

impl ManagedWidgets {
    fn prune(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|e| e.widget.strong_count() > 0);
        if self.entries.len() != before {
            debug!(dropped = before - self.entries.len(), "Forgot dropped widgets");
        }
    }

    fn position(&mut self, widget: &Arc<dyn StyledWidget>) -> Option<usize> {
        self.prune();
        self.entries.iter().position(|e| e.is(widget))
    }

    /// Appends entries and returns the widget's full list.
    pub(crate) fn add(
        &mut self,
        widget: &Arc<dyn StyledWidget>,
        paths: impl IntoIterator<Item = String>,
    ) -> Vec<String> {
        let index = match self.position(widget) {
            Some(index) => index,
            None => {
                let existing = widget.style_sheet();
                let sheets = if existing.is_empty() {
                    Vec::new()
                } else {
                    vec![format!("{DATA_PREFIX}{existing}")]
                };
                self.entries.push(Entry {
                    widget: Arc::downgrade(widget),
                    sheets,
                });
                self.entries.len() - 1
            }
        };
        let sheets = &mut self.entries[index].sheets;
        sheets.extend(paths);
        sheets.clone()
    }

    pub(crate) fn list(&mut self, widget: &Arc<dyn StyledWidget>) -> Vec<String> {
        self.position(widget)
            .map(|i| self.entries[i].sheets.clone())
            .unwrap_or_default()
    }

    /// Removes entries (all of them when `paths` is empty). Returns the
    /// remaining list, or `None` if the widget was not managed.
    pub(crate) fn remove<'p>(
        &mut self,
        widget: &Arc<dyn StyledWidget>,
        paths: impl IntoIterator<Item = &'p str>,
    ) -> Option<Vec<String>> {
        let index = self.position(widget)?;
        let paths: Vec<&str> = paths.into_iter().collect();
        let sheets = &mut self.entries[index].sheets;
        if paths.is_empty() {
            sheets.clear();
        } else {
            for path in paths {
                if let Some(i) = sheets.iter().position(|s| s == path) {
                    sheets.remove(i);
                }
            }
        }

        let remaining = sheets.clone();
        if remaining.is_empty() {
            self.entries.remove(index);
        }
        Some(remaining)
    }

    /// Every live widget with its entries.
    pub(crate) fn live(&mut self) -> Vec<(Arc<dyn StyledWidget>, Vec<String>)> {
        self.entries
            .iter()
            .filter_map(|e| e.widget.upgrade().map(|w| (w, e.sheets.clone())))
            .collect()
    }
}

/// Joins entries into one stylesheet, inlining `data:` entries and loading
/// the others with `load`.
pub(crate) fn compose<F>(sheets: &[String], mut load: F) -> String
where
    F: FnMut(&str) -> String,
{
    sheets
        .iter()
        .map(|s| match s.strip_prefix(DATA_PREFIX) {
            Some(raw) => raw.to_string(),
            None => load(s),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Widget(Mutex<String>);

    impl StyledWidget for Widget {
        fn style_sheet(&self) -> String {
            self.0.lock().clone()
        }

        fn set_style_sheet(&self, qss: &str) {
            *self.0.lock() = qss.to_string();
        }
    }

    fn widget(initial: &str) -> Arc<dyn StyledWidget> {
        Arc::new(Widget(Mutex::new(initial.to_string())))
    }

    #[test]
    fn test_existing_sheet_is_kept_as_data() {
        let mut managed = ManagedWidgets::default();
        let w = widget("* { color: red; }");

        let sheets = managed.add(&w, ["a.qss".to_string()]);
        assert_eq!(sheets, vec!["data:* { color: red; }", "a.qss"]);
        assert_eq!(compose(&sheets, |p| format!("/* {p} */")), "* { color: red; }\n/* a.qss */");
    }

    #[test]
    fn test_remove_and_forget() {
        let mut managed = ManagedWidgets::default();
        let w = widget("");
        managed.add(&w, ["a.qss".to_string(), "b.qss".to_string()]);

        assert_eq!(managed.remove(&w, ["a.qss", "zzz.qss"]), Some(vec!["b.qss".to_string()]));
        assert_eq!(managed.remove(&w, []), Some(Vec::new()));
        assert!(managed.list(&w).is_empty());
        assert_eq!(managed.remove(&w, []), None);
    }

    #[test]
    fn test_dropped_widgets_are_pruned() {
        let mut managed = ManagedWidgets::default();
        let keep = widget("");
        managed.add(&keep, ["a.qss".to_string()]);
        {
            let gone = widget("");
            managed.add(&gone, ["b.qss".to_string()]);
        }
        assert_eq!(managed.live().len(), 1);
        assert_eq!(managed.list(&keep), vec!["a.qss"]);
    }
}
