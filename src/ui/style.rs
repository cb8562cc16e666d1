use serde::{Deserialize, Serialize};

/// Marker value meaning "use the plugin's own look"
pub const DEFAULT_TOOL_STYLE: &str = "default";

/// Style shared by the UI plugins of a map module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolStyle {
    pub tool_style: Option<String>,
    pub font: Option<String>,
    pub colour_scheme: Option<serde_json::Value>,
}

impl ToolStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool_style(mut self, tool_style: impl Into<String>) -> Self {
        self.tool_style = Some(tool_style.into());
        self
    }

    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.font = Some(font.into());
        self
    }

    pub fn with_colour_scheme(mut self, scheme: serde_json::Value) -> Self {
        self.colour_scheme = Some(scheme);
        self
    }

    /// Tool style to hand to plugins; `"default"` counts as none
    pub fn effective_tool_style(&self) -> Option<&str> {
        self.tool_style
            .as_deref()
            .filter(|style| *style != DEFAULT_TOOL_STYLE)
    }

    pub fn font(&self) -> Option<&str> {
        self.font.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_style_is_hidden() {
        let style = ToolStyle::new().with_tool_style("default");
        assert_eq!(style.effective_tool_style(), None);

        let style = ToolStyle::new().with_tool_style("rounded-dark");
        assert_eq!(style.effective_tool_style(), Some("rounded-dark"));
    }

    #[test]
    fn test_style_from_json() {
        let style: ToolStyle = serde_json::from_str(
            r#"{ "toolStyle": "sharp-light", "font": "georgia", "colourScheme": { "bgColour": "3f3f3f" } }"#,
        )
        .unwrap();
        assert_eq!(style.effective_tool_style(), Some("sharp-light"));
        assert_eq!(style.font(), Some("georgia"));
        assert!(style.colour_scheme.is_some());
    }
}
