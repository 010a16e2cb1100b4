use scenewright_schema::ElementRef;

/// The renderer's live element table, used to resolve animation targets that
/// refer to elements from earlier turns.
#[derive(Debug, Clone, Default)]
pub struct SceneIndex {
    entries: Vec<ElementRef>,
}

impl SceneIndex {
    pub fn new(entries: Vec<ElementRef>) -> Self {
        Self { entries }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Option<S>, S)>,
        S: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(id, name)| ElementRef {
                    id: id.map(Into::into),
                    name: name.into(),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn by_id(&self, id: &str) -> Option<&ElementRef> {
        self.entries.iter().find(|e| e.id.as_deref() == Some(id))
    }

    pub fn by_name(&self, name: &str) -> Option<&ElementRef> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Case-insensitive, whitespace-trimmed name match.
    pub fn by_name_loose(&self, name: &str) -> Option<&ElementRef> {
        let needle = name.trim();
        self.entries
            .iter()
            .find(|e| e.name.trim().eq_ignore_ascii_case(needle))
    }
}

impl FromIterator<ElementRef> for SceneIndex {
    fn from_iter<T: IntoIterator<Item = ElementRef>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let scene = SceneIndex::from_pairs([(Some("el-7"), "Score Bug"), (None, "Ticker")]);
        assert_eq!(scene.len(), 2);
        assert_eq!(scene.by_id("el-7").unwrap().name, "Score Bug");
        assert!(scene.by_name("score bug").is_none());
        assert_eq!(scene.by_name_loose(" score bug ").unwrap().id.as_deref(), Some("el-7"));
        assert!(scene.by_id("Ticker").is_none());
    }
}
