// src/exec/simulated.rs

//! In-memory driver backing the `flowdag` binary.
//!
//! There is no browser behind it: pages are just a history of URLs, every
//! selector resolves unless listed in `missing_selectors`, and element text
//! comes from the `[simulation.texts]` table or from values filled earlier in
//! the run. Failures can be provoked from the plan file to exercise recovery.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::driver::{ActionDriver, ActionError, ActionFuture, ElementHandle};

/// `[simulation]` section of a plan file.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Selectors that never resolve.
    #[serde(default)]
    pub missing_selectors: Vec<String>,

    /// URLs whose navigation fails.
    #[serde(default)]
    pub unreachable_urls: Vec<String>,

    /// Text returned for elements, keyed by selector.
    #[serde(default)]
    pub texts: BTreeMap<String, String>,

    /// Artificial delay applied to every operation.
    #[serde(default)]
    pub latency_ms: u64,

    /// URL of the page before the first navigation.
    #[serde(default = "default_start_url")]
    pub start_url: String,
}

fn default_start_url() -> String {
    "about:blank".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            missing_selectors: Vec::new(),
            unreachable_urls: Vec::new(),
            texts: BTreeMap::new(),
            latency_ms: 0,
            start_url: default_start_url(),
        }
    }
}

#[derive(Debug)]
struct PageState {
    history: Vec<String>,
    fields: HashMap<String, String>,
    scroll: (i64, i64),
}

#[derive(Debug)]
pub struct SimulatedDriver {
    config: SimulationConfig,
    page: Mutex<PageState>,
}

impl SimulatedDriver {
    pub fn new(config: SimulationConfig) -> Self {
        let page = PageState {
            history: vec![config.start_url.clone()],
            fields: HashMap::new(),
            scroll: (0, 0),
        };
        Self {
            config,
            page: Mutex::new(page),
        }
    }

    /// Visited URLs, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.page().history.clone()
    }

    /// Value last filled into `selector`, if any.
    pub fn field_value(&self, selector: &str) -> Option<String> {
        self.page().fields.get(selector).cloned()
    }

    pub fn scroll_position(&self) -> (i64, i64) {
        self.page().scroll
    }

    fn page(&self) -> MutexGuard<'_, PageState> {
        self.page.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }
    }
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl ActionDriver for SimulatedDriver {
    fn navigate<'a>(&'a self, url: &'a str) -> ActionFuture<'a, ()> {
        Box::pin(async move {
            self.latency().await;

            if url.trim().is_empty() {
                return Err(ActionError::InvalidAction("empty url".to_string()));
            }
            if self.config.unreachable_urls.iter().any(|u| u == url) {
                return Err(ActionError::Navigation(format!("could not reach {url}")));
            }

            debug!(%url, "simulated navigation");
            let mut page = self.page();
            page.history.push(url.to_string());
            page.fields.clear();
            page.scroll = (0, 0);
            Ok(())
        })
    }

    fn find<'a>(&'a self, selector: &'a str) -> ActionFuture<'a, Option<ElementHandle>> {
        Box::pin(async move {
            self.latency().await;

            if self.config.missing_selectors.iter().any(|s| s == selector) {
                debug!(%selector, "simulated element missing");
                return Ok(None);
            }
            Ok(Some(ElementHandle::new(selector)))
        })
    }

    fn click<'a>(&'a self, element: &'a ElementHandle) -> ActionFuture<'a, ()> {
        Box::pin(async move {
            self.latency().await;
            debug!(selector = %element.selector, "simulated click");
            Ok(())
        })
    }

    fn fill<'a>(&'a self, element: &'a ElementHandle, text: &'a str) -> ActionFuture<'a, ()> {
        Box::pin(async move {
            self.latency().await;
            self.page()
                .fields
                .insert(element.selector.clone(), text.to_string());
            Ok(())
        })
    }

    fn clear<'a>(&'a self, element: &'a ElementHandle) -> ActionFuture<'a, ()> {
        Box::pin(async move {
            self.latency().await;
            self.page().fields.remove(&element.selector);
            Ok(())
        })
    }

    fn scroll_into_view<'a>(&'a self, element: &'a ElementHandle) -> ActionFuture<'a, ()> {
        Box::pin(async move {
            self.latency().await;
            debug!(selector = %element.selector, "simulated scroll into view");
            Ok(())
        })
    }

    fn text<'a>(&'a self, element: &'a ElementHandle) -> ActionFuture<'a, String> {
        Box::pin(async move {
            self.latency().await;
            if let Some(text) = self.config.texts.get(&element.selector) {
                return Ok(text.clone());
            }
            Ok(self
                .page()
                .fields
                .get(&element.selector)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn scroll(&self, dx: i64, dy: i64) -> ActionFuture<'_, ()> {
        Box::pin(async move {
            self.latency().await;
            let mut page = self.page();
            page.scroll.0 = page.scroll.0.saturating_add(dx);
            page.scroll.1 = page.scroll.1.saturating_add(dy);
            Ok(())
        })
    }

    fn go_back(&self) -> ActionFuture<'_, ()> {
        Box::pin(async move {
            self.latency().await;
            let mut page = self.page();
            if page.history.len() <= 1 {
                return Err(ActionError::Navigation(
                    "no previous page in history".to_string(),
                ));
            }
            page.history.pop();
            page.fields.clear();
            Ok(())
        })
    }

    fn current_url(&self) -> ActionFuture<'_, String> {
        Box::pin(async move {
            self.latency().await;
            let page = self.page();
            Ok(page
                .history
                .last()
                .cloned()
                .unwrap_or_else(|| self.config.start_url.clone()))
        })
    }

    fn wait(&self, duration: Duration) -> ActionFuture<'_, ()> {
        Box::pin(async move {
            tokio::time::sleep(duration).await;
            Ok(())
        })
    }
}
