//! Category Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::{Slug, ValueError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub icon: String,
    pub is_active: bool,
    pub order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default)]
pub struct CategoryDraft { pub name: String, pub description: String, pub icon: String, pub is_active: bool, pub order: i32 }

impl Category {
    pub fn create(draft: CategoryDraft) -> Result<Self, ValueError> {
        Ok(Self {
            id: Uuid::now_v7(), slug: Slug::from_name(&draft.name)?, name: draft.name, description: draft.description,
            icon: draft.icon, is_active: draft.is_active, order: draft.order, created_at: Utc::now(),
        })
    }

    pub fn apply(&mut self, draft: CategoryDraft) -> Result<(), ValueError> {
        self.slug = Slug::from_name(&draft.name)?;
        self.name = draft.name;
        self.description = draft.description;
        self.icon = draft.icon;
        self.is_active = draft.is_active;
        self.order = draft.order;
        Ok(())
    }
}
