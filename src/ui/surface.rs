/// Transaction view shared by the popup and the detached window
use std::rc::Rc;

use patternfly_yew::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlInputElement;
use yew::prelude::*;

use super::components::TransactionTable;
use crate::bridge::{
    ChromeStorage, ChromeTabs, IntervalGuard, WindowListener, close_current_window, export_to_file,
    focus_detached_window, open_detached_window,
};
use crate::cache::CacheStore;
use crate::error::HostError;
use crate::operations::{export_json, visible_transactions};
use crate::orchestrator::{ExtractMode, extract};
use crate::settings::Settings;
use crate::storage::{Clock, SystemClock};
use crate::sync::{
    InstanceRegistry, Liveness, clear_handoffs, newer_handoff, publish_handoff, resolve_initial_state,
};
use crate::transaction::{InstanceMarker, SurfaceKind, SyncState, Transaction};

/// Long-lived services built once per page and handed to the root component
#[derive(Clone)]
pub struct Services {
    pub settings: Rc<Settings>,
    pub store: Rc<CacheStore<ChromeStorage>>,
    pub registry: Rc<InstanceRegistry<ChromeStorage, SystemClock>>,
}

impl Services {
    pub fn new(settings: Settings) -> Services {
        let store = CacheStore::new(ChromeStorage, settings.cache.clone());
        let registry = InstanceRegistry::new(ChromeStorage, SystemClock, settings.liveness.clone());
        Services {
            settings: Rc::new(settings),
            store: Rc::new(store),
            registry: Rc::new(registry),
        }
    }

    pub async fn load() -> Services {
        Services::new(Settings::load(&ChromeStorage).await)
    }
}

impl PartialEq for Services {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.store, &other.store) && Rc::ptr_eq(&self.registry, &other.registry)
    }
}

#[derive(Properties, PartialEq)]
pub struct SurfaceProps {
    pub kind: SurfaceKind,
    pub services: Services,
}

#[derive(Clone, PartialEq)]
enum SurfaceStatus {
    Loading,
    Idle,
    Extracting,
    Error(String),
}

/// Handles for the parts of the view that travel in a handoff
#[derive(Clone)]
struct ViewState {
    transactions: UseStateHandle<Vec<Transaction>>,
    search_term: UseStateHandle<String>,
    privacy_mode: UseStateHandle<bool>,
    clover_mode: UseStateHandle<bool>,
}

impl ViewState {
    fn apply(&self, state: SyncState) {
        self.transactions.set(state.transactions);
        self.search_term.set(state.search_term);
        self.privacy_mode.set(state.privacy_mode);
        self.clover_mode.set(state.clover_mode);
    }
}

#[function_component(TransactionSurface)]
pub fn transaction_surface(props: &SurfaceProps) -> Html {
    let kind = props.kind;
    let services = props.services.clone();

    let status = use_state(|| SurfaceStatus::Loading);
    let transactions = use_state(Vec::<Transaction>::new);
    let search_term = use_state(String::new);
    let privacy_mode = use_state(|| false);
    let clover_mode = use_state(|| false);
    let notice = use_state(|| None::<String>);
    let poller = use_mut_ref(|| None::<IntervalGuard>);
    let marker = use_mut_ref(|| None::<InstanceMarker>);
    let adopted_at = use_mut_ref(|| 0.0_f64);
    let view = ViewState {
        transactions: transactions.clone(),
        search_term: search_term.clone(),
        privacy_mode: privacy_mode.clone(),
        clover_mode: clover_mode.clone(),
    };

    // Restore state on mount
    {
        let services = services.clone();
        let status = status.clone();
        let view = view.clone();
        let adopted_at = adopted_at.clone();
        use_effect_with((), move |_| {
            spawn_local(async move {
                let swept = services.store.cleanup().await;
                if swept > 0 {
                    log::debug!("Swept {} expired cache entries", swept);
                }
                log::debug!("Cache: {:?}", services.store.stats().await);

                let initial = resolve_initial_state(&ChromeStorage, services.store.as_ref(), kind).await;
                log::info!(
                    "{} starting from {:?} with {} transactions",
                    kind.as_str(),
                    initial.source,
                    initial.state.transactions.len()
                );

                *adopted_at.borrow_mut() = initial.state.timestamp;
                view.apply(initial.state);
                status.set(SurfaceStatus::Idle);
            });
            || ()
        });
    }

    // A surface that is focused rather than reopened picks up handoffs here
    {
        let view = view.clone();
        let adopted_at = adopted_at.clone();
        use_effect_with((), move |_| {
            let listener = WindowListener::add("focus", move || {
                let view = view.clone();
                let adopted_at = adopted_at.clone();
                spawn_local(async move {
                    let since = *adopted_at.borrow();
                    if let Some(state) = newer_handoff(&ChromeStorage, kind, since).await {
                        log::info!("Adopting {} handoff on focus", kind.other().as_str());
                        *adopted_at.borrow_mut() = state.timestamp;
                        view.apply(state);
                    }
                });
            });
            if let Err(e) = &listener {
                log::warn!("Focus handoff unavailable: {}", e);
            }
            move || drop(listener)
        });
    }

    // Liveness: close this window once a newer instance of the same kind takes over
    {
        let registry = services.registry.clone();
        let poller = poller.clone();
        let marker = marker.clone();
        use_effect_with((), move |_| {
            {
                let registry = registry.clone();
                let poller = poller.clone();
                let marker = marker.clone();
                spawn_local(async move {
                    let own = match registry.register(kind).await {
                        Ok(own) => own,
                        Err(e) => {
                            log::warn!("Could not register {} instance: {}", kind.as_str(), e);
                            return;
                        }
                    };
                    *marker.borrow_mut() = Some(own.clone());

                    let interval_ms = registry.config().poll_interval_ms;
                    let ticking = registry.clone();
                    let guard = IntervalGuard::start(interval_ms, move || {
                        let registry = ticking.clone();
                        let own = own.clone();
                        spawn_local(async move {
                            if registry.heartbeat(kind, &own).await == Liveness::Superseded {
                                close_current_window();
                            }
                        });
                    });

                    match guard {
                        Ok(guard) => *poller.borrow_mut() = Some(guard),
                        Err(e) => log::warn!("Liveness polling unavailable: {}", e),
                    }
                });
            }

            move || {
                poller.borrow_mut().take();
                if let Some(own) = marker.borrow_mut().take() {
                    spawn_local(async move {
                        registry.release(kind, &own).await;
                    });
                }
            }
        });
    }

    let snapshot = SyncState {
        transactions: (*transactions).clone(),
        search_term: (*search_term).clone(),
        privacy_mode: *privacy_mode,
        clover_mode: *clover_mode,
        timestamp: 0.0,
    };

    let on_extract = {
        let services = services.clone();
        let status = status.clone();
        let transactions = transactions.clone();
        let notice = notice.clone();
        Callback::from(move |_| {
            if *status == SurfaceStatus::Extracting {
                return;
            }
            status.set(SurfaceStatus::Extracting);
            notice.set(None);

            let services = services.clone();
            let status = status.clone();
            let transactions = transactions.clone();
            let notice = notice.clone();
            spawn_local(async move {
                match extract(&ChromeTabs, ExtractMode::from(kind), &services.settings).await {
                    Ok(extraction) => {
                        services.store.set_current_url(&extraction.tab.url);
                        services
                            .store
                            .set(&extraction.transactions, Some(&extraction.tab.url))
                            .await;
                        if extraction.transactions.is_empty() {
                            notice.set(Some("No transactions found on this page.".to_string()));
                        }
                        transactions.set(extraction.transactions);
                        status.set(SurfaceStatus::Idle);
                    }
                    Err(e) => {
                        log::error!("Extraction failed: {:?}", e);
                        status.set(SurfaceStatus::Error(e.to_string()));
                    }
                }
            });
        })
    };

    let on_handoff = {
        let services = services.clone();
        let status = status.clone();
        let snapshot = snapshot.clone();
        Callback::from(move |_| {
            let services = services.clone();
            let status = status.clone();
            let snapshot = snapshot.clone();
            spawn_local(async move {
                let now = SystemClock.now_ms();
                if let Err(e) = publish_handoff(&ChromeStorage, kind, &snapshot, now).await {
                    log::warn!("Handoff not saved: {}", e);
                }

                if kind == SurfaceKind::Popup {
                    if let Err(e) = show_detached_window(&services).await {
                        status.set(SurfaceStatus::Error(format!("Could not open the detached window: {}", e)));
                        return;
                    }
                }
                close_current_window();
            });
        })
    };

    let on_search_input = {
        let search_term = search_term.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                search_term.set(input.value());
            }
        })
    };

    let on_privacy_toggle = {
        let privacy_mode = privacy_mode.clone();
        Callback::from(move |_: Event| privacy_mode.set(!*privacy_mode))
    };

    let on_clover_toggle = {
        let clover_mode = clover_mode.clone();
        Callback::from(move |_: Event| clover_mode.set(!*clover_mode))
    };

    let visible = visible_transactions(&transactions, &search_term, *privacy_mode);

    let on_export = {
        let visible = visible.clone();
        let status = status.clone();
        Callback::from(move |_| match export_json(&visible) {
            Ok(json) => {
                let filename = format!("transactions-{}.json", SystemClock.now_ms() as i64);
                export_to_file(&json, &filename);
            }
            Err(e) => status.set(SurfaceStatus::Error(format!("Export failed: {}", e))),
        })
    };

    let on_clear = {
        let services = services.clone();
        let transactions = transactions.clone();
        let notice = notice.clone();
        Callback::from(move |_| {
            let services = services.clone();
            let transactions = transactions.clone();
            let notice = notice.clone();
            spawn_local(async move {
                services.store.clear(None).await;
                if let Err(e) = clear_handoffs(&ChromeStorage).await {
                    log::warn!("Handoff snapshots not cleared: {}", e);
                }
                transactions.set(Vec::new());
                notice.set(Some("Cache cleared.".to_string()));
            });
        })
    };

    let is_busy = matches!(*status, SurfaceStatus::Loading | SurfaceStatus::Extracting);
    let handoff_label = match kind {
        SurfaceKind::Popup => "Detach",
        SurfaceKind::Detached => "Return to popup",
    };

    html! {
        <div class={classes!("surface", kind.as_str())}>
            <h1 class="surface-title">{"Transaction Extractor"}</h1>

            <div class="flex-row-gap">
                <Button onclick={on_extract} disabled={is_busy} variant={ButtonVariant::Primary}>
                    {"Extract transactions"}
                </Button>
                <Button onclick={on_handoff} disabled={is_busy} variant={ButtonVariant::Secondary}>
                    {handoff_label}
                </Button>
            </div>

            // Status display
            {match &*status {
                SurfaceStatus::Loading => html! {
                    <div class="loading-text-center">
                        <Spinner />
                        <p class="loading-text">{"Loading..."}</p>
                    </div>
                },
                SurfaceStatus::Extracting => html! {
                    <div class="loading-text-center">
                        <Spinner />
                        <p class="loading-text">{"Reading page..."}</p>
                    </div>
                },
                SurfaceStatus::Error(err) => html! {
                    <div class="message-top-margin">
                        <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                            {err.clone()}
                        </Alert>
                    </div>
                },
                SurfaceStatus::Idle => html! {}
            }}

            if let Some(message) = (*notice).clone() {
                <Alert r#type={AlertType::Info} title={message} inline={true}>
                </Alert>
            }

            <div class="search-container">
                <input
                    type="text"
                    class="search-input"
                    placeholder="Search customer, date, amount or ID..."
                    value={(*search_term).clone()}
                    oninput={on_search_input}
                />
            </div>

            <div class="toggle-row">
                <label class="toggle">
                    <input type="checkbox" checked={*privacy_mode} onchange={on_privacy_toggle} />
                    {" Privacy mode"}
                </label>
                <label class="toggle">
                    <input type="checkbox" checked={*clover_mode} onchange={on_clover_toggle} />
                    {" Clover mode"}
                </label>
            </div>

            <TransactionTable rows={visible.clone()} compact={*clover_mode} />

            <div class="surface-footer">
                <span class="result-count">
                    {format!("{} of {} transactions", visible.len(), transactions.len())}
                </span>
                <Button onclick={on_export} disabled={visible.is_empty()} variant={ButtonVariant::Secondary}>
                    {"Export JSON"}
                </Button>
                <Button onclick={on_clear} disabled={is_busy} variant={ButtonVariant::Link}>
                    {"Clear cache"}
                </Button>
            </div>
        </div>
    }
}

/// Bring up the detached window, reusing a live one when it exists
async fn show_detached_window(services: &Services) -> Result<(), HostError> {
    if services.registry.has_live_instance(SurfaceKind::Detached).await && focus_detached_window().await? {
        return Ok(());
    }
    open_detached_window().await
}
