//! The surface element a plugin renders into.

use std::collections::HashMap;

use crate::protocol::NULL_LITERAL;

/// A plugin's container: markup content, inline style and attachment state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    id: String,
    content: String,
    style: HashMap<String, String>,
    attached: bool,
}

impl Container {
    /// Creates an attached, empty container.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: String::new(),
            style: HashMap::new(),
            attached: true,
        }
    }

    /// Container id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current markup content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether the container is attached to the surface.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Resolved value of a style property.
    pub fn style(&self, property: &str) -> Option<&str> {
        self.style.get(property).map(String::as_str)
    }

    /// Appends text, turning newlines into line breaks.
    pub fn write(&mut self, text: &str) {
        self.content.push_str(&text.replace('\n', "<br>"));
    }

    /// Replaces the content.
    pub fn set_content(&mut self, markup: impl Into<String>) {
        self.content = markup.into();
    }

    /// Empties the content.
    pub fn clear(&mut self) {
        self.content.clear();
    }

    /// Applies `key=value` rules separated by `;`.
    ///
    /// A `NULL` or empty value removes the property. Segments without `=`
    /// (including the empty segment after a trailing `;`) are ignored.
    pub fn apply_css(&mut self, rules: &str) {
        for rule in rules.split(';') {
            let Some((key, value)) = rule.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            if value.is_empty() || value == NULL_LITERAL {
                self.style.remove(key);
            } else {
                self.style.insert(key.to_string(), value.to_string());
            }
        }
    }

    /// Reports comma-separated properties as `name=value\n` lines, in
    /// request order, with `NULL` for unset properties.
    pub fn query_css(&self, properties: &str) -> String {
        properties
            .split(',')
            .filter(|p| !p.is_empty())
            .map(|p| format!("{p}={}\n", self.style(p).unwrap_or(NULL_LITERAL)))
            .collect()
    }

    /// Attaches the container to the surface.
    pub fn attach(&mut self) {
        self.attached = true;
    }

    /// Detaches the container from the surface.
    pub fn detach(&mut self) {
        self.attached = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_translates_newlines() {
        let mut container = Container::new("clock");
        container.write("a\nb");
        container.write("\nc");
        assert_eq!(container.content(), "a<br>b<br>c");
    }

    #[test]
    fn test_set_then_get_css() {
        let mut container = Container::new("clock");
        container.apply_css("left=10px;top=20px;");
        assert_eq!(container.query_css("top,left"), "top=20px\nleft=10px\n");
    }

    #[test]
    fn test_null_clears_property() {
        let mut container = Container::new("clock");
        container.apply_css("left=10px");
        container.apply_css("left=NULL");
        assert_eq!(container.query_css("left"), "left=NULL\n");

        container.apply_css("top=1px;top=");
        assert_eq!(container.style("top"), None);
    }

    #[test]
    fn test_unstyled_container_reports_null() {
        let container = Container::new("clock");
        assert_eq!(container.query_css("left,top,"), "left=NULL\ntop=NULL\n");
    }

    #[test]
    fn test_segments_without_value_are_ignored() {
        let mut container = Container::new("clock");
        container.apply_css("color;;=red;width=5px");
        assert_eq!(container.style("color"), None);
        assert_eq!(container.style("width"), Some("5px"));
    }
}
