use serde::Serialize;

/// Metadata the presentation layer needs to render a static page.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PageMeta {
    pub slug: &'static str,
    pub path: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub in_navigation: bool,
}
