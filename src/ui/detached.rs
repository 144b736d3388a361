/// Standalone window that outlives the popup
use yew::prelude::*;

use super::surface::{Services, TransactionSurface};
use crate::transaction::SurfaceKind;

#[derive(Properties, PartialEq)]
pub struct DetachedAppProps {
    pub services: Services,
}

#[function_component(DetachedApp)]
pub fn detached_app(props: &DetachedAppProps) -> Html {
    html! {
        <div class="container-max-width detached">
            <TransactionSurface kind={SurfaceKind::Detached} services={props.services.clone()} />
        </div>
    }
}
