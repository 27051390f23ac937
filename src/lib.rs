use clap::ValueEnum;

pub mod auth;
pub mod charts;
pub mod dataset;
pub mod harness;
pub mod logging;
pub mod partition;
pub mod probe;
pub mod report;
pub mod sampler;
pub mod scenarios;
pub mod schema;

/// Load-test scenario to run against an RHDH instance.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum ScenarioKind {
    /// Catalog entity-facets listing for components.
    ListCatalog,
    /// Software-catalog search queries.
    SearchCatalog,
    /// OpenShift license endpoint.
    OcLicense,
    /// Catalog browsing with fixed facet/entity query tables.
    #[value(name = "mvp-1dot1")]
    Mvp1dot1,
    /// Full catalog user journey (facets, by-query, by-refs, paging).
    #[default]
    Mvp,
    /// Orchestrator workflow execution.
    Orchestrator,
    /// Permission-driven workflows across enabled plugins.
    Realistic,
}

impl ScenarioKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioKind::ListCatalog => "list-catalog",
            ScenarioKind::SearchCatalog => "search-catalog",
            ScenarioKind::OcLicense => "oc-license",
            ScenarioKind::Mvp1dot1 => "mvp-1dot1",
            ScenarioKind::Mvp => "mvp",
            ScenarioKind::Orchestrator => "orchestrator",
            ScenarioKind::Realistic => "realistic",
        }
    }

    /// Prefix of the synthetic usernames provisioned for this scenario.
    pub fn username_prefix(&self) -> &'static str {
        match self {
            ScenarioKind::Orchestrator => "t_",
            ScenarioKind::Realistic => "t",
            _ => "test",
        }
    }

    /// Whether virtual users authenticate before running tasks.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ScenarioKind::Mvp1dot1
                | ScenarioKind::Mvp
                | ScenarioKind::Orchestrator
                | ScenarioKind::Realistic
        )
    }
}

/// Horizontal axis scale for generated charts.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum XScale {
    #[default]
    Linear,
    Log,
}

/// Chart rendering flavour.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum ChartFormat {
    /// Static SVG rendered server-side and inlined into the report.
    #[default]
    Svg,
    /// Plotly figures rendered in the browser, with a zip download of all charts.
    Interactive,
}
