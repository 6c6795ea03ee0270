//! Category filter over points of interest

use crate::PointOfInterest;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Whether the filter is bypassed or restricted to a selection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FilterMode {
    /// Every POI is visible regardless of the selection
    All,
    /// Only POIs sharing a category with the selection are visible
    #[default]
    Selected,
}

/// Set of selected categories
///
/// In [`FilterMode::Selected`] a POI is visible when its categories
/// intersect the selection; an empty selection shows nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CategoryFilter {
    selected: BTreeSet<String>,
    mode: FilterMode,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl CategoryFilter {
    /// Filter with the given categories selected
    pub fn with_selected<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selected: categories.into_iter().map(Into::into).collect(),
            mode: FilterMode::Selected,
        }
    }

    /// Filter that shows everything
    pub fn all() -> Self {
        Self {
            selected: BTreeSet::new(),
            mode: FilterMode::All,
        }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    pub fn is_selected(&self, category: &str) -> bool {
        self.selected.contains(category)
    }

    /// Add or remove a category; returns whether it is now selected
    ///
    /// Toggling leaves [`FilterMode::All`].
    pub fn toggle(&mut self, category: &str) -> bool {
        self.mode = FilterMode::Selected;
        if self.selected.remove(category) {
            false
        } else {
            self.selected.insert(category.to_string());
            true
        }
    }

    pub fn select(&mut self, category: &str) {
        self.mode = FilterMode::Selected;
        self.selected.insert(category.to_string());
    }

    pub fn deselect(&mut self, category: &str) {
        self.mode = FilterMode::Selected;
        self.selected.remove(category);
    }

    /// Empty the selection (nothing visible afterwards)
    pub fn clear(&mut self) {
        self.mode = FilterMode::Selected;
        self.selected.clear();
    }

    /// Bypass the selection and show every POI
    pub fn select_all(&mut self) {
        self.mode = FilterMode::All;
    }

    pub fn matches(&self, poi: &PointOfInterest) -> bool {
        match self.mode {
            FilterMode::All => true,
            FilterMode::Selected => poi.categories.iter().any(|c| self.selected.contains(c)),
        }
    }

    /// POIs passing the filter, in input order
    pub fn apply<'a>(&'a self, pois: &'a [PointOfInterest]) -> impl Iterator<Item = &'a PointOfInterest> {
        pois.iter().filter(move |poi| self.matches(poi))
    }
}
