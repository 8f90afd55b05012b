use serde::{Deserialize, Serialize};

/// One accessibility node located in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiElement {
    /// Opaque handle understood by the snapshot that produced it.
    pub node_id: u64,
    pub view_id: Option<String>,
    pub text: Option<String>,
    pub class_name: Option<String>,
}

impl UiElement {
    pub fn has_class(&self, candidates: &[&str]) -> bool {
        self.class_name
            .as_deref()
            .is_some_and(|class| candidates.contains(&class))
    }
}

/// Read view of the foreground window of the observed app.
///
/// Implementations may be live: repeated lookups can see newer UI state.
pub trait UiSnapshot: Send + Sync {
    fn package(&self) -> &str;

    fn find_by_id(&self, view_id: &str) -> Vec<UiElement>;

    /// Case-insensitive substring match over text and content descriptions.
    fn find_by_text(&self, text: &str) -> Vec<UiElement>;

    /// Click the element. Returns whether the platform accepted the action.
    fn perform_click(&self, element: &UiElement) -> bool;
}

/// Global actions that are not tied to a node.
pub trait AutomationDriver: Send + Sync {
    fn navigate_back(&self) -> bool;
}
