//! Read-only view of the category hierarchy.
//!
//! The registry is owned by a separate category-management component; this
//! crate only asks one question of it: may a transaction be assigned here?

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A main category or a subcategory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Income categories cannot be renamed or deleted by the registry UI.
    #[serde(default)]
    pub is_income: bool,
    /// Only meaningful for top-level categories. A top-level category that
    /// accepts subcategories is a grouping node, never an assignment target.
    #[serde(default = "default_allow_subcategories")]
    pub allow_subcategories: bool,
    /// Derived from `parent_id` links when the registry is built.
    #[serde(default, skip_serializing)]
    pub child_ids: Vec<String>,
}

fn default_allow_subcategories() -> bool {
    true
}

impl Category {
    /// Top-level category that groups subcategories.
    pub fn main(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: None,
            is_income: false,
            allow_subcategories: true,
            child_ids: Vec::new(),
        }
    }

    /// Top-level category configured to take transactions directly.
    pub fn standalone(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            allow_subcategories: false,
            ..Self::main(id, name)
        }
    }

    pub fn sub(id: impl Into<String>, name: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            allow_subcategories: false,
            ..Self::main(id, name)
        }
    }

    pub fn income(mut self) -> Self {
        self.is_income = true;
        self
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Why a category cannot take a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LeafViolation {
    #[error("category does not exist")]
    UnknownCategory,
    #[error("category has subcategories")]
    HasSubcategories,
    #[error("top-level category is configured for subcategories")]
    AcceptsSubcategories,
}

/// Snapshot of the category hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryRegistry {
    categories: BTreeMap<String, Category>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a flat list. `child_ids` is recomputed from `parent_id`
    /// links; whatever the input carried there is discarded.
    pub fn from_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut map: BTreeMap<String, Category> = categories
            .into_iter()
            .map(|mut c| {
                c.child_ids.clear();
                (c.id.clone(), c)
            })
            .collect();

        let links: Vec<(String, String)> = map
            .values()
            .filter_map(|c| c.parent_id.clone().map(|p| (p, c.id.clone())))
            .collect();
        for (parent, child) in links {
            if let Some(p) = map.get_mut(&parent) {
                p.child_ids.push(child);
            }
        }

        Self { categories: map }
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Category> {
        self.categories.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn children(&self, id: &str) -> Vec<&Category> {
        self.get(id)
            .map(|c| c.child_ids.iter().filter_map(|cid| self.get(cid)).collect())
            .unwrap_or_default()
    }

    /// Every category a transaction may be assigned to.
    pub fn leaves(&self) -> Vec<&Category> {
        self.iter().filter(|c| self.is_leaf(&c.id)).collect()
    }

    /// Income categories are structurally locked against rename/delete.
    pub fn is_protected(&self, id: &str) -> bool {
        self.get(id).is_some_and(|c| c.is_income)
    }

    pub fn is_leaf(&self, id: &str) -> bool {
        self.validate_assignment(id).is_ok()
    }

    /// A leaf is a subcategory, or a top-level category that disallows
    /// subcategories and currently has none.
    pub fn validate_assignment(&self, id: &str) -> Result<(), LeafViolation> {
        let category = self.get(id).ok_or(LeafViolation::UnknownCategory)?;
        if !category.child_ids.is_empty() {
            return Err(LeafViolation::HasSubcategories);
        }
        if category.is_top_level() && category.allow_subcategories {
            return Err(LeafViolation::AcceptsSubcategories);
        }
        Ok(())
    }

    /// Human-readable "Main > Sub" path.
    pub fn display_name(&self, id: &str) -> String {
        match self.get(id) {
            None => id.to_string(),
            Some(c) => match c.parent_id.as_deref().and_then(|p| self.get(p)) {
                Some(parent) => format!("{} > {}", parent.name, c.name),
                None => c.name.clone(),
            },
        }
    }
}
