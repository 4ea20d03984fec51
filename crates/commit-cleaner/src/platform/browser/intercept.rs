//! Prototype-level `value` interception for text controls.
//!
//! The native accessor pair of `HTMLInputElement.prototype.value` (and the
//! textarea one) is replaced with a pair that forwards reads and hands writes
//! to the [`ValueGuard`] first. The native setter is kept on the prototype so
//! the engine can still write without being intercepted, and a marker makes
//! the patch idempotent across engines on the same page.

use js_sys::{Function, Object, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::accessor::{InstallOutcome, ValueGuard};
use crate::dom::ControlKind;
use crate::error::AccessorError;

const PATCHED_KEY: &str = "__commitCleanerPatched";
const NATIVE_SET_KEY: &str = "__commitCleanerNativeSet";

const WRAP_ARGS: &str = "native, rewrite";
const WRAP_BODY: &str = "return {\n\
    get: function () { return native.get.call(this); },\n\
    set: function (v) { var r = rewrite(v); native.set.call(this, r === undefined ? v : r); },\n\
    configurable: true,\n\
    enumerable: !!native.enumerable\n\
};";

fn host_error(err: JsValue) -> AccessorError {
    AccessorError::Host(err.as_string().unwrap_or_else(|| format!("{err:?}")))
}

fn prototype(kind: ControlKind) -> Result<Object, AccessorError> {
    let window = web_sys::window().ok_or_else(|| AccessorError::Host("no window".to_string()))?;
    let constructor = Reflect::get(&window, &JsValue::from_str(kind.constructor_name())).map_err(host_error)?;
    let prototype = Reflect::get(&constructor, &JsValue::from_str("prototype")).map_err(host_error)?;
    prototype
        .dyn_into::<Object>()
        .map_err(|_| AccessorError::MissingDescriptor(kind))
}

pub fn patch_prototype(kind: ControlKind, guard: ValueGuard) -> Result<InstallOutcome, AccessorError> {
    let prototype = prototype(kind)?;
    let patched = Reflect::get(&prototype, &JsValue::from_str(PATCHED_KEY)).map_err(host_error)?;
    if patched.is_truthy() {
        return Ok(InstallOutcome::AlreadyInstalled);
    }

    let descriptor = Object::get_own_property_descriptor(&prototype, &JsValue::from_str("value"));
    if descriptor.is_undefined() || descriptor.is_null() {
        return Err(AccessorError::MissingDescriptor(kind));
    }
    let native_get = Reflect::get(&descriptor, &JsValue::from_str("get")).map_err(host_error)?;
    let native_set = Reflect::get(&descriptor, &JsValue::from_str("set")).map_err(host_error)?;
    if !native_get.is_function() || !native_set.is_function() {
        return Err(AccessorError::IncompleteDescriptor(kind));
    }

    let rewrite = Closure::<dyn FnMut(JsValue) -> JsValue>::new(move |incoming: JsValue| {
        incoming
            .as_string()
            .and_then(|text| guard.rewrite(&text))
            .map_or(JsValue::UNDEFINED, |cleaned| JsValue::from_str(&cleaned))
    })
    .into_js_value();

    let wrap = Function::new_with_args(WRAP_ARGS, WRAP_BODY);
    let wrapped = wrap
        .call2(&JsValue::NULL, &descriptor, &rewrite)
        .map_err(host_error)?
        .dyn_into::<Object>()
        .map_err(host_error)?;

    Object::define_property(&prototype, &JsValue::from_str("value"), &wrapped);
    Reflect::set(&prototype, &JsValue::from_str(NATIVE_SET_KEY), &native_set).map_err(host_error)?;
    Reflect::set(&prototype, &JsValue::from_str(PATCHED_KEY), &JsValue::TRUE).map_err(host_error)?;
    Ok(InstallOutcome::Installed)
}

/// Write `value` through the setter that was in place before patching.
/// Returns `false` when the prototype was never patched.
pub fn native_set(kind: ControlKind, element: &JsValue, value: &str) -> Result<bool, JsValue> {
    let Ok(prototype) = prototype(kind) else {
        return Ok(false);
    };
    let setter = Reflect::get(&prototype, &JsValue::from_str(NATIVE_SET_KEY))?;
    match setter.dyn_into::<Function>() {
        Ok(setter) => {
            setter.call1(element, &JsValue::from_str(value))?;
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}
