//! Metadata categories
//!
//! The closed set of metadata classes the broker tracks, plus a fixed-size
//! table keyed by category.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// Class of metadata tracked by the broker
///
/// Each category is served by exactly one connector. The three `*S3`
/// categories are object-store listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Raw files landed in the incoming-data prefix
    IncomingDataS3,
    /// Objects under the data-sources prefix
    DataSourcesS3,
    /// Objects under the feature-sets prefix
    FeatureSetsS3,
    /// Data catalog databases and tables
    DataCatalog,
    /// Feature store feature groups
    FeatureStore,
    /// Model registry packages
    Models,
    /// Inference endpoints
    Endpoints,
}

impl Category {
    /// Every category, in table order
    pub const ALL: [Category; 7] = [
        Category::IncomingDataS3,
        Category::DataSourcesS3,
        Category::FeatureSetsS3,
        Category::DataCatalog,
        Category::FeatureStore,
        Category::Models,
        Category::Endpoints,
    ];

    /// Number of categories
    pub const COUNT: usize = Self::ALL.len();

    /// Position of this category in [`Category::ALL`]
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Stable snake-case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IncomingDataS3 => "incoming_data_s3",
            Self::DataSourcesS3 => "data_sources_s3",
            Self::FeatureSetsS3 => "feature_sets_s3",
            Self::DataCatalog => "data_catalog",
            Self::FeatureStore => "feature_store",
            Self::Models => "models",
            Self::Endpoints => "endpoints",
        }
    }

    /// Path segment used for this category's storage location
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::IncomingDataS3 => "incoming-data",
            Self::DataSourcesS3 => "data-sources",
            Self::FeatureSetsS3 => "feature-sets",
            Self::DataCatalog => "data-catalog",
            Self::FeatureStore => "feature-store",
            Self::Models => "models",
            Self::Endpoints => "endpoints",
        }
    }

    /// Whether snapshots of this category are object listings
    #[inline]
    #[must_use]
    pub const fn is_object_store(self) -> bool {
        matches!(
            self,
            Self::IncomingDataS3 | Self::DataSourcesS3 | Self::FeatureSetsS3
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Unrecognized category name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: '{0}'")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Fixed-size table holding one value per category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMap<T> {
    slots: [T; Category::COUNT],
}

impl<T> CategoryMap<T> {
    /// Build table by computing each category's value
    pub fn from_fn(mut f: impl FnMut(Category) -> T) -> Self {
        Self {
            slots: std::array::from_fn(|i| f(Category::ALL[i])),
        }
    }

    /// Iterate `(category, value)` pairs in table order
    pub fn iter(&self) -> impl Iterator<Item = (Category, &T)> {
        Category::ALL.into_iter().zip(self.slots.iter())
    }

    /// Map every value into a new table
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CategoryMap<U> {
        CategoryMap {
            slots: self.slots.map(f),
        }
    }
}

impl<T: Default> Default for CategoryMap<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<Category> for CategoryMap<T> {
    type Output = T;

    #[inline]
    fn index(&self, category: Category) -> &T {
        &self.slots[category.index()]
    }
}

impl<T> IndexMut<Category> for CategoryMap<T> {
    #[inline]
    fn index_mut(&mut self, category: Category) -> &mut T {
        &mut self.slots[category.index()]
    }
}
