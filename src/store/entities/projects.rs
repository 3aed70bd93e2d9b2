//! Project collection, maintained locally.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::store::action::Action;
use crate::store::error::StoreError;
use crate::store::status::{Entity, ResourceStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
  pub id: u64,
  pub name: String,
}

impl Entity for Project {
  fn id(&self) -> u64 {
    self.id
  }
}

pub const RESOURCE: &str = "projects";

pub type ProjectsState = ResourceStatus<Project>;

#[derive(Debug, Clone)]
pub enum ProjectAction {
  Added { name: String },
}

impl ProjectAction {
  pub fn type_name(&self) -> &'static str {
    match self {
      ProjectAction::Added { .. } => "projects/projectAdded",
    }
  }
}

pub fn reduce(
  projects: &Arc<ProjectsState>,
  action: &ProjectAction,
) -> Result<Arc<ProjectsState>, StoreError> {
  match action {
    ProjectAction::Added { name } => projects
      .with_added(|id| Project {
        id,
        name: name.clone(),
      })
      .map(Arc::new)
      .ok_or(StoreError::IdsExhausted { resource: RESOURCE }),
  }
}

pub fn project_added(name: impl Into<String>) -> Action {
  Action::Projects(ProjectAction::Added { name: name.into() })
}
