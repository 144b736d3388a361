/// Toolbar popup
use yew::prelude::*;

use super::surface::{Services, TransactionSurface};
use crate::transaction::SurfaceKind;

#[derive(Properties, PartialEq)]
pub struct AppProps {
    pub services: Services,
}

#[function_component(App)]
pub fn app(props: &AppProps) -> Html {
    html! {
        <div class="padding-20 popup">
            <TransactionSurface kind={SurfaceKind::Popup} services={props.services.clone()} />
        </div>
    }
}
