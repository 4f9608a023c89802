//! Merging parsed records into the project aggregate.

use tracing::debug;

use crate::domain::{Page, Project, UserStory};
use crate::errors::SyncError;
use crate::store::StoreHandle;

/// Append `stories` to the page named `page_name` (case-insensitive match),
/// creating the page with a slugified route when absent. Stories are never
/// deduplicated here; duplicate avoidance is the prompt's job. Returns the
/// id of the page that received the stories.
pub fn merge_user_stories(
    project: &mut Project,
    page_name: &str,
    stories: Vec<UserStory>,
) -> String {
    let idx = match project
        .pages
        .iter()
        .position(|p| p.name.eq_ignore_ascii_case(page_name))
    {
        Some(idx) => idx,
        None => {
            debug!(page = page_name, project_id = project.id, "creating page");
            project.pages.push(Page::new(page_name));
            project.pages.len() - 1
        }
    };
    let page = &mut project.pages[idx];
    page.user_stories.extend(stories);
    page.id.clone()
}

/// Persist the aggregate as a single write.
pub async fn save_project(store: &StoreHandle, project: &Project) -> Result<(), SyncError> {
    let snapshot = project.clone();
    store
        .call(move |s| s.save_project(&snapshot))
        .await
        .map_err(SyncError::Store)
}
