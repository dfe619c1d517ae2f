//! DOM element bindings.
//!
//! All fields are resolved once at startup. To add new UI elements, add a
//! field here and bind it in `Elements::bind()`.

use gloo_utils::document;
use wasm_bindgen::prelude::*;
use web_sys::{Element, HtmlButtonElement, HtmlInputElement};

// ── Helpers ──

pub fn by_id(id: &str) -> Option<Element> {
    document().get_element_by_id(id)
}

pub fn by_id_typed<T: JsCast>(id: &str) -> Option<T> {
    by_id(id).and_then(|e| e.dyn_into::<T>().ok())
}

pub fn set_text(el: &Element, text: &str) {
    el.set_text_content(Some(text));
}

pub fn get_input_value(el: &HtmlInputElement) -> String {
    el.value().trim().to_string()
}

/// Only writes when the value differs, so re-rendering while the user types
/// does not move the caret.
pub fn sync_input_value(el: &HtmlInputElement, val: &str) {
    if el.value() != val {
        el.set_value(val);
    }
}

pub fn toggle_class(el: &Element, cls: &str, force: bool) {
    let _ = el.class_list().toggle_with_force(cls, force);
}

pub fn show(el: &Element, visible: bool) {
    toggle_class(el, "hidden", !visible);
}

pub fn create_element(tag: &str) -> Result<Element, JsValue> {
    document().create_element(tag)
}

pub fn clear_children(el: &Element) {
    while let Some(child) = el.first_child() {
        let _ = el.remove_child(&child);
    }
}

// ── Elements struct ──

/// All DOM element references used by the ATM page.
/// Clone-friendly (all inner types are reference-counted via JS GC).
#[derive(Clone)]
pub struct Elements {
    // Sections
    pub install_notice: Element,
    pub connect_section: Element,
    pub dashboard: Element,

    // Connect
    pub connect_btn: HtmlButtonElement,

    // Account
    pub account_display: Element,
    pub balance_display: Element,

    // Deposit
    pub deposit_input: HtmlInputElement,
    pub deposit_btn: HtmlButtonElement,
    pub deposit_status: Element,

    // Withdraw
    pub withdraw_input: HtmlInputElement,
    pub withdraw_btn: HtmlButtonElement,
    pub withdraw_status: Element,

    // History
    pub history_list: Element,
    pub clear_history_btn: HtmlButtonElement,

    // Notice
    pub notice: Element,
    pub notice_text: Element,
    pub notice_dismiss_btn: HtmlButtonElement,
}

macro_rules! get_el {
    ($id:expr) => {
        by_id($id).ok_or_else(|| JsValue::from_str(&format!("missing element #{}", $id)))?
    };
}

macro_rules! get_input {
    ($id:expr) => {
        by_id_typed::<HtmlInputElement>($id)
            .ok_or_else(|| JsValue::from_str(&format!("missing input #{}", $id)))?
    };
}

macro_rules! get_button {
    ($id:expr) => {
        by_id_typed::<HtmlButtonElement>($id)
            .ok_or_else(|| JsValue::from_str(&format!("missing button #{}", $id)))?
    };
}

impl Elements {
    /// Resolve all DOM references. Call once after DOMContentLoaded.
    pub fn bind() -> Result<Elements, JsValue> {
        Ok(Elements {
            install_notice: get_el!("installNotice"),
            connect_section: get_el!("connectSection"),
            dashboard: get_el!("dashboard"),

            connect_btn: get_button!("connectBtn"),

            account_display: get_el!("accountDisplay"),
            balance_display: get_el!("balanceDisplay"),

            deposit_input: get_input!("depositInput"),
            deposit_btn: get_button!("depositBtn"),
            deposit_status: get_el!("depositStatus"),

            withdraw_input: get_input!("withdrawInput"),
            withdraw_btn: get_button!("withdrawBtn"),
            withdraw_status: get_el!("withdrawStatus"),

            history_list: get_el!("historyList"),
            clear_history_btn: get_button!("clearHistoryBtn"),

            notice: get_el!("notice"),
            notice_text: get_el!("noticeText"),
            notice_dismiss_btn: get_button!("noticeDismissBtn"),
        })
    }
}
