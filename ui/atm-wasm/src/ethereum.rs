//! `window.ethereum` transport.
//!
//! Calls the injected provider's `request({ method, params })` and converts
//! between `serde_json::Value` and JS values on the way in and out.

use async_trait::async_trait;
use atm_provider::{Eip1193, ProviderError};
use js_sys::{Function, Object, Promise, Reflect};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

#[derive(Clone)]
pub struct InjectedProvider {
    ethereum: Object,
}

impl InjectedProvider {
    /// The injected provider, if the page has one.
    pub fn detect() -> Option<Self> {
        let window = web_sys::window()?;
        let ethereum = Reflect::get(&window, &JsValue::from_str("ethereum")).ok()?;
        if ethereum.is_undefined() || ethereum.is_null() {
            return None;
        }
        ethereum.dyn_into::<Object>().ok().map(|ethereum| Self { ethereum })
    }
}

#[async_trait(?Send)]
impl Eip1193 for InjectedProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let serializer = serde_wasm_bindgen::Serializer::json_compatible();
        let js_params = params
            .serialize(&serializer)
            .map_err(|e| ProviderError::internal(format!("params: {e}")))?;

        let args = Object::new();
        Reflect::set(&args, &JsValue::from_str("method"), &JsValue::from_str(method))
            .map_err(provider_error)?;
        Reflect::set(&args, &JsValue::from_str("params"), &js_params).map_err(provider_error)?;

        let request_fn = Reflect::get(&self.ethereum, &JsValue::from_str("request"))
            .map_err(provider_error)?
            .dyn_into::<Function>()
            .map_err(|_| ProviderError::internal("ethereum.request is not a function"))?;

        let promise = request_fn
            .call1(&self.ethereum, &args)
            .map_err(provider_error)?
            .dyn_into::<Promise>()
            .map_err(|_| ProviderError::internal("ethereum.request did not return a promise"))?;

        let result = JsFuture::from(promise).await.map_err(provider_error)?;
        if result.is_undefined() || result.is_null() {
            return Ok(Value::Null);
        }
        serde_wasm_bindgen::from_value(result)
            .map_err(|e| ProviderError::internal(format!("response: {e}")))
    }
}

/// Read `{ code, message }` off a thrown provider error.
fn provider_error(err: JsValue) -> ProviderError {
    let code = Reflect::get(&err, &JsValue::from_str("code"))
        .ok()
        .and_then(|c| c.as_f64())
        .map(|c| c as i64);
    let message = Reflect::get(&err, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{err:?}"));

    match code {
        Some(code) => ProviderError::new(code, message),
        None => ProviderError::internal(message),
    }
}
