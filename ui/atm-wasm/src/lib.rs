//! ATM client WASM frontend.
//!
//! Connects to the injected wallet, binds the `Assessment` contract and
//! renders balance, deposit/withdraw controls and the session history.

pub mod dom;
pub mod ethereum;
pub mod events;
pub mod platform;
pub mod render;

use atm_contract::ASSESSMENT_ARTIFACT;
use atm_core::{App, AtmConfig, Store};
use std::rc::Rc;
use tracing::{info, warn};
use wasm_bindgen::prelude::*;

pub type AtmApp = App<ethereum::InjectedProvider, platform::BrowserClock>;

/// WASM entry point – called automatically when the module is instantiated.
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    // Improve panic messages in the browser console
    console_error_panic_hook::set_once();

    init().await
}

/// Main initialisation sequence.
async fn init() -> Result<(), JsValue> {
    let query = gloo_utils::window().location().search().unwrap_or_default();
    let (config, warnings) = AtmConfig::from_query(&query);
    if let Err(err) = platform::init_logging(config.log_level) {
        gloo_console::warn!(format!("console logging unavailable: {err}"));
    }
    for warning in warnings {
        warn!("{warning}");
    }
    info!(contract = %config.contract_address, "starting ATM client");

    let els = dom::Elements::bind()?;

    let provider = ethereum::InjectedProvider::detect();
    let app: Rc<AtmApp> = Rc::new(App::new(
        config,
        ASSESSMENT_ARTIFACT,
        provider,
        platform::BrowserClock,
    ));

    {
        let els2 = els.clone();
        app.subscribe(move |store| render::render(&els2, &store.view()));
    }
    render::render(&els, &app.with_store(Store::view));

    // Bind all event listeners
    events::bind_events(&els, &app);

    // Detect wallet and pick up an already-authorized account
    app.init().await;

    Ok(())
}
