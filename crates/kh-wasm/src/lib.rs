//! WebAssembly bindings for KeyHighlight
//!
//! Exposes the pure matching and parsing operations to the extension's JS
//! glue. Profile data crosses the boundary as the JSON the extension already
//! keeps in storage.

use kh_core::{BoundaryCompiler, HighlightPlan, KeywordDelimiters, Profile, StoredSettings};
use kh_page::Message;
use wasm_bindgen::prelude::*;

fn warn(message: &str) {
    web_sys::console::warn_1(&JsValue::from_str(message));
}

fn to_js_array(items: &[String]) -> js_sys::Array {
    let array = js_sys::Array::new_with_length(items.len() as u32);
    for (i, item) in items.iter().enumerate() {
        array.set(i as u32, JsValue::from_str(item));
    }
    array
}

fn parse_profiles(profiles_json: &str) -> Result<Vec<Profile>, String> {
    serde_json::from_str(profiles_json).map_err(|e| format!("Invalid profiles JSON: {}", e))
}

fn matching_ids(profiles_json: &str, url: &str) -> Result<Vec<String>, String> {
    let profiles = parse_profiles(profiles_json)?;
    Ok(kh_core::find_matching_profiles(&profiles, url)
        .into_iter()
        .map(|p| p.id.clone())
        .collect())
}

fn signature_for(profiles_json: &str, url: &str) -> Result<String, String> {
    let profiles = parse_profiles(profiles_json)?;
    let matching = kh_core::find_matching_profiles(&profiles, url);
    Ok(kh_core::generate_signature(matching.iter().copied()))
}

fn plan_for(profiles_json: &str, url: &str) -> Result<HighlightPlan, String> {
    let profiles = parse_profiles(profiles_json)?;
    let matching = kh_core::find_matching_profiles(&profiles, url);
    Ok(kh_core::build_highlight_plan(&matching, url))
}

fn message_action(message_json: &str) -> Result<String, String> {
    let message: Message =
        serde_json::from_str(message_json).map_err(|e| format!("Invalid message: {}", e))?;
    let action = match message {
        Message::UpdateProfiles => "updateProfiles",
        Message::ToggleExtension { .. } => "toggleExtension",
        Message::ShowNotification { .. } => "showNotification",
        Message::ForceHighlightRefresh => "forceHighlightRefresh",
    };
    Ok(action.to_string())
}

// =============================================================================
// Exports
// =============================================================================

#[wasm_bindgen]
pub fn match_url(url: &str, pattern: &str) -> bool {
    kh_core::url_matches(url, pattern)
}

/// Split keyword input. Newlines only delimit when `include_newlines` is set.
#[wasm_bindgen]
pub fn parse_keywords(text: &str, include_newlines: bool) -> js_sys::Array {
    to_js_array(&kh_core::parse_keywords(text, include_newlines))
}

/// Split on commas only, e.g. for pasted CSV.
#[wasm_bindgen]
pub fn parse_keywords_comma_only(text: &str) -> js_sys::Array {
    to_js_array(&kh_core::parse_keywords_with(text, KeywordDelimiters::CommaOnly))
}

#[wasm_bindgen]
pub fn parse_url_list(text: &str) -> js_sys::Array {
    to_js_array(&kh_core::parse_url_list(text))
}

#[wasm_bindgen]
pub fn compile_boundary_pattern(keyword: &str) -> String {
    BoundaryCompiler::new().compile(keyword).to_string()
}

#[wasm_bindgen]
pub fn is_hex_color(value: &str) -> bool {
    kh_core::is_hex_color(value)
}

/// Ids of the profiles that apply to `url`, in stored order.
#[wasm_bindgen]
pub fn find_matching_profiles(profiles_json: &str, url: &str) -> Result<js_sys::Array, JsValue> {
    let ids = matching_ids(profiles_json, url).map_err(|e| JsValue::from_str(&e))?;
    Ok(to_js_array(&ids))
}

#[wasm_bindgen]
pub fn generate_signature(profiles_json: &str, url: &str) -> Result<String, JsValue> {
    signature_for(profiles_json, url).map_err(|e| JsValue::from_str(&e))
}

/// Highlight plan for `url` as JSON (`{colorMap, keywords, exactCase}`).
#[wasm_bindgen]
pub fn build_highlight_plan(profiles_json: &str, url: &str) -> Result<String, JsValue> {
    let plan = plan_for(profiles_json, url).map_err(|e| JsValue::from_str(&e))?;
    serde_json::to_string(&plan).map_err(|e| JsValue::from_str(&format!("Failed to encode plan: {}", e)))
}

/// Summary of stored settings. Malformed settings fall back to defaults.
#[wasm_bindgen]
pub fn get_settings_info(settings_json: &str) -> JsValue {
    let settings: StoredSettings = match serde_json::from_str(settings_json) {
        Ok(settings) => settings,
        Err(e) => {
            warn(&format!("KeyHighlight: malformed settings, using defaults: {}", e));
            StoredSettings::default()
        }
    };
    let active = settings.profiles.iter().filter(|p| p.is_active()).count();

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"enabled".into(), &JsValue::from(settings.extension_enabled));
    let _ = js_sys::Reflect::set(&result, &"profiles".into(), &JsValue::from(settings.profiles.len() as u32));
    let _ = js_sys::Reflect::set(&result, &"activeProfiles".into(), &JsValue::from(active as u32));
    let _ = js_sys::Reflect::set(&result, &"keywordBank".into(), &JsValue::from(settings.keyword_bank.len() as u32));
    result.into()
}

/// Validate an inbound message and return its action name.
#[wasm_bindgen]
pub fn parse_message(message_json: &str) -> Result<String, JsValue> {
    message_action(message_json).map_err(|e| {
        warn(&format!("KeyHighlight: {}", e));
        JsValue::from_str(&e)
    })
}
