/// Finds the tab holding the transactions page and extracts from it
use crate::dom::DomNode;
use crate::error::{ExtractError, HostError, Result};
use crate::extractor::extract_all;
use crate::settings::{Settings, TargetMatch};
use crate::transaction::{SurfaceKind, TabInfo, Transaction};

/// URL prefix of the extension's own pages
pub const EXTENSION_URL_PREFIX: &str = "chrome-extension://";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// Popup: the active tab of the current window
    Embedded,
    /// Standalone window: search every open tab
    Detached,
}

impl From<SurfaceKind> for ExtractMode {
    fn from(kind: SurfaceKind) -> Self {
        match kind {
            SurfaceKind::Popup => ExtractMode::Embedded,
            SurfaceKind::Detached => ExtractMode::Detached,
        }
    }
}

/// Tab and scripting capabilities of the browser
#[allow(async_fn_in_trait)]
pub trait TabHost {
    async fn active_tab(&self) -> std::result::Result<Option<TabInfo>, HostError>;

    async fn all_tabs(&self) -> std::result::Result<Vec<TabInfo>, HostError>;

    /// Run the snapshot script inside the tab and return the page tree.
    /// Elements with any of `text_classes` keep their rendered text even
    /// when they have element children.
    async fn snapshot(&self, tab_id: i32, text_classes: &[String]) -> std::result::Result<DomNode, HostError>;
}

/// Records extracted from one tab
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub tab: TabInfo,
    pub transactions: Vec<Transaction>,
}

/// Resolve the target tab for `mode`, snapshot it and extract.
/// No retries; the caller decides whether to try again.
pub async fn extract<H: TabHost>(host: &H, mode: ExtractMode, settings: &Settings) -> Result<Extraction> {
    let tab = resolve_target_tab(host, mode, &settings.target).await?;
    log::info!("Extracting from tab {} ({})", tab.id, tab.url);

    let root = host
        .snapshot(tab.id, &settings.signature.rendered_text_classes())
        .await
        .map_err(ExtractError::from_host)?;
    let transactions = extract_all(&root, &settings.signature, &settings.repair);

    Ok(Extraction { tab, transactions })
}

pub async fn resolve_target_tab<H: TabHost>(host: &H, mode: ExtractMode, target: &TargetMatch) -> Result<TabInfo> {
    let tab = match mode {
        ExtractMode::Embedded => host
            .active_tab()
            .await
            .map_err(|e| ExtractError::InjectionFailed(e.0))?
            .filter(|tab| !is_extension_page(tab)),
        ExtractMode::Detached => {
            let tabs = host
                .all_tabs()
                .await
                .map_err(|e| ExtractError::InjectionFailed(e.0))?;
            pick_target_tab(&tabs, target).cloned()
        }
    };

    tab.ok_or(ExtractError::NoTargetTab)
}

/// Prefer a tab that looks like the target app; otherwise the newest tab
/// that is not one of the extension's own pages
pub fn pick_target_tab<'a>(tabs: &'a [TabInfo], target: &TargetMatch) -> Option<&'a TabInfo> {
    let candidates = tabs.iter().filter(|tab| !is_extension_page(tab));

    candidates
        .clone()
        .find(|tab| target.matches(&tab.url, &tab.title))
        .or_else(|| candidates.max_by_key(|tab| tab.id))
}

fn is_extension_page(tab: &TabInfo) -> bool {
    tab.url.starts_with(EXTENSION_URL_PREFIX)
}
