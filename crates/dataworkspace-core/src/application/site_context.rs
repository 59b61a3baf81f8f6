//! Values made available to every rendered page

use serde::{Deserialize, Serialize};

use crate::config::SiteSettings;

/// Common page context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteContext {
    /// Link to the root of the application domain
    pub root_href: String,
    /// Google Analytics property
    pub google_analytics_site_id: Option<String>,
    /// Whether the visualisations tab is shown
    pub can_see_visualisations_tab: bool,
    /// Google Tag Manager container
    pub gtm_container_id: Option<String>,
    /// Google Tag Manager environment query parameters
    pub gtm_container_environment_params: Option<String>,
}

impl SiteContext {
    /// Build the context for a request made over `scheme`.
    ///
    /// Performs no store lookups: a failing query here would also fail the
    /// error page that renders with this context.
    pub fn common(scheme: &str, settings: &SiteSettings) -> Self {
        Self {
            root_href: format!("{}://{}/", scheme, settings.application_root_domain),
            google_analytics_site_id: settings.google_analytics_site_id.clone(),
            can_see_visualisations_tab: false,
            gtm_container_id: settings.gtm_container_id.clone(),
            gtm_container_environment_params: settings.gtm_container_environment_params.clone(),
        }
    }
}
