use super::ElementHandle;
use crate::error::{Error, Result};
use indexmap::IndexMap;

/// Marker attribute naming an element for lookup after a render.
pub const EXPORT_ATTRIBUTE: &str = "data-export";

/// Export handles of one render, in document order.
#[derive(Debug, Clone, Default)]
pub struct Exports {
    handles: Vec<ElementHandle>,
}

impl Exports {
    pub(crate) fn new(handles: Vec<ElementHandle>) -> Self {
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ElementHandle> {
        self.handles.iter()
    }

    /// Every export carrying `name`, in document order.
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ElementHandle> + 'a {
        self.handles
            .iter()
            .filter(move |handle| handle.export_name().as_deref() == Some(name))
    }

    /// Folds into name -> handle. A later duplicate replaces an earlier one.
    pub fn named(&self) -> NamedExports {
        let mut map = IndexMap::new();
        for handle in &self.handles {
            if let Some(name) = handle.export_name() {
                map.insert(name, handle.clone());
            }
        }
        NamedExports { map }
    }

    pub fn into_vec(self) -> Vec<ElementHandle> {
        self.handles
    }
}

impl IntoIterator for Exports {
    type Item = ElementHandle;
    type IntoIter = std::vec::IntoIter<ElementHandle>;

    fn into_iter(self) -> Self::IntoIter {
        self.handles.into_iter()
    }
}

impl<'a> IntoIterator for &'a Exports {
    type Item = &'a ElementHandle;
    type IntoIter = std::slice::Iter<'a, ElementHandle>;

    fn into_iter(self) -> Self::IntoIter {
        self.handles.iter()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NamedExports {
    map: IndexMap<String, ElementHandle>,
}

impl NamedExports {
    pub fn get(&self, name: &str) -> Option<&ElementHandle> {
        self.map.get(name)
    }

    pub fn optional(&self, name: &str) -> Option<ElementHandle> {
        self.map.get(name).cloned()
    }

    pub fn require(&self, name: &str) -> Result<ElementHandle> {
        self.optional(name).ok_or_else(|| Error::MissingExport {
            name: name.to_owned(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Names in order of first appearance.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A typed view over the exports a widget's markup declares, built right
/// after each render so a missing required export fails there.
pub trait ExportSet: Sized {
    fn from_exports(exports: &Exports) -> Result<Self>;
}

impl ExportSet for Exports {
    fn from_exports(exports: &Exports) -> Result<Self> {
        Ok(exports.clone())
    }
}

impl ExportSet for NamedExports {
    fn from_exports(exports: &Exports) -> Result<Self> {
        Ok(exports.named())
    }
}
