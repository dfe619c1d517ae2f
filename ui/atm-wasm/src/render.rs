//! Declarative render: the page is redrawn from a `View` after every store
//! change. Nothing here reads or writes application state.

use crate::dom::{self, Elements};
use atm_core::{Dashboard, HistoryRow, Notice, NoticeLevel, OperationView, View};
use gloo_utils::document;
use wasm_bindgen::JsValue;
use web_sys::{Element, HtmlButtonElement, HtmlInputElement};

pub fn render(els: &Elements, view: &View) {
    match view {
        View::InstallWallet { message } => {
            dom::set_text(&els.install_notice, message);
            dom::show(&els.install_notice, true);
            dom::show(&els.connect_section, false);
            dom::show(&els.dashboard, false);
            render_notice(els, None);
        }
        View::Connect { notice } => {
            dom::show(&els.install_notice, false);
            dom::show(&els.connect_section, true);
            dom::show(&els.dashboard, false);
            render_notice(els, notice.as_ref());
        }
        View::Dashboard(dash) => {
            dom::show(&els.install_notice, false);
            dom::show(&els.connect_section, false);
            dom::show(&els.dashboard, true);
            render_dashboard(els, dash);
        }
    }
}

fn render_dashboard(els: &Elements, dash: &Dashboard) {
    dom::set_text(&els.account_display, &dash.account);
    dom::set_text(
        &els.balance_display,
        dash.balance.as_deref().unwrap_or("…"),
    );

    render_operation(&els.deposit_input, &els.deposit_btn, &els.deposit_status, &dash.deposit);
    render_operation(
        &els.withdraw_input,
        &els.withdraw_btn,
        &els.withdraw_status,
        &dash.withdrawal,
    );

    if let Err(e) = render_history(&els.history_list, &dash.history) {
        tracing::error!("history render failed: {:?}", e);
    }
    els.clear_history_btn.set_disabled(dash.history.is_empty());

    render_notice(els, dash.notice.as_ref());
}

fn render_operation(
    input: &HtmlInputElement,
    button: &HtmlButtonElement,
    status: &Element,
    op: &OperationView,
) {
    dom::sync_input_value(input, &op.input);
    button.set_disabled(!op.enabled);
    dom::set_text(status, op.status.as_deref().unwrap_or(""));
}

fn render_history(list: &Element, rows: &[HistoryRow]) -> Result<(), JsValue> {
    dom::clear_children(list);
    for row in rows {
        let li = dom::create_element("li")?;
        append_field(&li, "Timestamp:", &row.timestamp)?;
        append_field(&li, "Type:", row.kind)?;
        append_field(&li, "Added/Deducted:", &format!("{} ETH", row.change))?;
        append_field(&li, "New Balance:", &format!("{} ETH", row.new_balance))?;
        list.append_child(&li)?;
    }
    Ok(())
}

/// `<strong>label</strong> value<br>`
fn append_field(li: &Element, label: &str, value: &str) -> Result<(), JsValue> {
    let strong = dom::create_element("strong")?;
    dom::set_text(&strong, label);
    li.append_child(&strong)?;
    li.append_child(&document().create_text_node(&format!(" {value}")))?;
    let br = dom::create_element("br")?;
    li.append_child(&br)?;
    Ok(())
}

fn render_notice(els: &Elements, notice: Option<&Notice>) {
    match notice {
        Some(n) => {
            dom::set_text(&els.notice_text, &n.text);
            dom::toggle_class(&els.notice, "error", n.level == NoticeLevel::Error);
            dom::show(&els.notice, true);
        }
        None => dom::show(&els.notice, false),
    }
}
