//! Event binding.
//!
//! Wires all UI event listeners to `App` actions. Async actions are spawned
//! via `wasm_bindgen_futures::spawn_local`; their outcome reaches the page
//! through the store, so the handlers below only log.

use crate::dom::{self, Elements};
use crate::AtmApp;
use atm_types::TxKind;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Helper: attach async click handler to an element.
macro_rules! on_click_async {
    ($el:expr, $app:expr, $handler:expr) => {{
        let app = $app.clone();
        let cb = Closure::wrap(Box::new(move |_: web_sys::MouseEvent| {
            let app2 = app.clone();
            wasm_bindgen_futures::spawn_local(async move {
                $handler(&app2).await;
            });
        }) as Box<dyn FnMut(_)>);
        $el.add_event_listener_with_callback("click", cb.as_ref().unchecked_ref())
            .unwrap();
        cb.forget();
    }};
}

/// Helper: attach sync click handler.
macro_rules! on_click {
    ($el:expr, $cb:expr) => {{
        let cb = Closure::wrap(Box::new($cb) as Box<dyn FnMut(web_sys::MouseEvent)>);
        $el.add_event_listener_with_callback("click", cb.as_ref().unchecked_ref())
            .unwrap();
        cb.forget();
    }};
}

/// Bind all UI event listeners. Call once after init.
pub fn bind_events(els: &Elements, app: &Rc<AtmApp>) {
    // ── Connect ──
    on_click_async!(els.connect_btn, app, on_connect);

    // ── Amount inputs ──
    for (kind, input) in [
        (TxKind::Deposit, els.deposit_input.clone()),
        (TxKind::Withdrawal, els.withdraw_input.clone()),
    ] {
        let app2 = app.clone();
        let input2 = input.clone();
        let cb = Closure::wrap(Box::new(move |_: web_sys::Event| {
            app2.set_input(kind, dom::get_input_value(&input2));
        }) as Box<dyn FnMut(_)>);
        input
            .add_event_listener_with_callback("input", cb.as_ref().unchecked_ref())
            .unwrap();
        cb.forget();
    }

    // ── Deposit / Withdraw ──
    on_click_async!(els.deposit_btn, app, on_deposit);
    on_click_async!(els.withdraw_btn, app, on_withdraw);

    // ── History ──
    {
        let app2 = app.clone();
        on_click!(els.clear_history_btn, move |_: web_sys::MouseEvent| {
            app2.clear_history();
        });
    }

    // ── Notice ──
    {
        let app2 = app.clone();
        on_click!(els.notice_dismiss_btn, move |_: web_sys::MouseEvent| {
            app2.dismiss_notice();
        });
    }
}

async fn on_connect(app: &Rc<AtmApp>) {
    if let Err(err) = app.connect().await {
        tracing::debug!(%err, "connect did not complete");
    }
}

async fn on_deposit(app: &Rc<AtmApp>) {
    if let Err(err) = app.deposit().await {
        tracing::debug!(%err, "deposit did not complete");
    }
}

async fn on_withdraw(app: &Rc<AtmApp>) {
    if let Err(err) = app.withdraw().await {
        tracing::debug!(%err, "withdraw did not complete");
    }
}
