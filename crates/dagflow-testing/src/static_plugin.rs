//! Declarative plugin for tests

use async_trait::async_trait;
use dagflow::{
    DimensionDescriptor, PlanContext, Plugin, PromptContext, ProviderSelection, Result,
};
use std::collections::HashMap;

/// A plugin assembled from static declarations.
///
/// Prompts are generated as `"<dimension>: <section contents>"`; provider
/// selection defaults to the plugin-wide default provider unless overridden
/// per dimension. Tests needing lifecycle hooks implement [`Plugin`]
/// directly (usually delegating the static parts to this type).
///
/// # Example
///
/// ```rust,ignore
/// use dagflow_testing::StaticPlugin;
///
/// let plugin = StaticPlugin::new("mock")
///     .with_section_dimension("sentiment")
///     .with_section_dimension("topics")
///     .with_section_dimension("summary")
///     .with_dependency("summary", ["sentiment", "topics"]);
/// ```
#[derive(Debug, Clone)]
pub struct StaticPlugin {
    default_provider: String,
    dimensions: Vec<DimensionDescriptor>,
    dependencies: HashMap<String, Vec<String>>,
    selections: HashMap<String, ProviderSelection>,
}

impl StaticPlugin {
    /// Plugin whose dimensions all run against `default_provider`.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            default_provider: default_provider.into(),
            dimensions: Vec::new(),
            dependencies: HashMap::new(),
            selections: HashMap::new(),
        }
    }

    /// Declare a dimension from a full descriptor.
    #[must_use]
    pub fn with_dimension(mut self, descriptor: DimensionDescriptor) -> Self {
        self.dimensions.push(descriptor);
        self
    }

    /// Declare a section-scope dimension.
    #[must_use]
    pub fn with_section_dimension(self, name: impl Into<String>) -> Self {
        self.with_dimension(DimensionDescriptor::section(name))
    }

    /// Declare a global-scope dimension.
    #[must_use]
    pub fn with_global_dimension(self, name: impl Into<String>) -> Self {
        self.with_dimension(DimensionDescriptor::global(name))
    }

    /// Declare dependencies for a dimension.
    #[must_use]
    pub fn with_dependency<I, S>(mut self, dimension: impl Into<String>, upstream: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .insert(dimension.into(), upstream.into_iter().map(Into::into).collect());
        self
    }

    /// Override provider selection for one dimension.
    #[must_use]
    pub fn with_selection(
        mut self,
        dimension: impl Into<String>,
        selection: ProviderSelection,
    ) -> Self {
        self.selections.insert(dimension.into(), selection);
        self
    }
}

#[async_trait]
impl Plugin for StaticPlugin {
    fn dimensions(&self) -> Vec<DimensionDescriptor> {
        self.dimensions.clone()
    }

    async fn define_dependencies(
        &self,
        _ctx: &PlanContext<'_>,
    ) -> Result<HashMap<String, Vec<String>>> {
        Ok(self.dependencies.clone())
    }

    async fn create_prompt(&self, ctx: &PromptContext<'_>) -> Result<String> {
        let contents: Vec<&str> = ctx
            .sections
            .iter()
            .map(|section| section.content.as_str())
            .collect();
        Ok(format!("{}: {}", ctx.context.dimension, contents.join(" | ")))
    }

    fn select_provider(&self, dimension: &str) -> ProviderSelection {
        self.selections
            .get(dimension)
            .cloned()
            .unwrap_or_else(|| ProviderSelection::new(&self.default_provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagflow::DimensionContext;

    #[tokio::test]
    async fn test_static_plugin_declarations() {
        let plugin = StaticPlugin::new("mock")
            .with_section_dimension("a")
            .with_global_dimension("g")
            .with_dependency("g", ["a"]);

        let dimensions = plugin.dimensions();
        assert_eq!(dimensions.len(), 2);
        assert!(dimensions[1].is_global());

        let ctx = PlanContext {
            process_id: "p",
            sections: &[],
            metadata: None,
        };
        let dependencies = plugin.define_dependencies(&ctx).await.unwrap();
        assert_eq!(dependencies["g"], vec!["a"]);
    }

    #[tokio::test]
    async fn test_prompt_joins_section_contents() {
        let plugin = StaticPlugin::new("mock").with_section_dimension("d");
        let dim_ctx = DimensionContext {
            process_id: "p".into(),
            dimension: "d".into(),
            is_global: false,
            section_index: Some(0),
            total_sections: 2,
        };
        let sections = vec!["one".into(), "two".into()];
        let deps = HashMap::new();
        let globals = HashMap::new();
        let prompt = plugin
            .create_prompt(&PromptContext {
                context: &dim_ctx,
                sections: &sections,
                dependencies: &deps,
                global_results: &globals,
            })
            .await
            .unwrap();
        assert_eq!(prompt, "d: one | two");
    }

    #[test]
    fn test_selection_override() {
        let plugin = StaticPlugin::new("mock")
            .with_section_dimension("d")
            .with_selection("d", ProviderSelection::new("special"));
        assert_eq!(plugin.select_provider("d").provider, "special");
        assert_eq!(plugin.select_provider("other").provider, "mock");
    }
}
