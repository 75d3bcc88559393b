//! WASM bindings for the softcity-core library.
//!
//! All functions exposed to JavaScript via wasm-bindgen are defined here.
//! Every entry point returns a JSON string; failures are reported in the
//! `error` field instead of being thrown.

use wasm_bindgen::prelude::*;

use crate::error::Result;
use crate::layout::CityConfig;
use crate::load::LoadTable;
use crate::output::CityOutput;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console, js_name = error)]
    pub fn console_error(s: &str);
}

const SERIALIZE_FAILED: &str = r#"{"error":{"message":"failed to serialize output","invariant_violation":true}}"#;

/// Lay out a city from edge-list source with the default configuration
#[wasm_bindgen]
pub fn compile_city(source: &str) -> String {
    to_json(&run(source, &CityConfig::default(), None))
}

/// Lay out a city with a JSON `CityConfig` and a JSON `LoadTable`.
/// An empty string selects the default for either.
#[wasm_bindgen]
pub fn compile_city_with_options(source: &str, config_json: &str, loads_json: &str) -> String {
    let options = parse_config(config_json).and_then(|cfg| Ok((cfg, parse_loads(loads_json)?)));
    let output = match options {
        Ok((cfg, loads)) => run(source, &cfg, loads.as_ref()),
        Err(e) => {
            report_error(&format!("Error reading options: {e}"));
            CityOutput::failure(&e, &[])
        }
    };
    to_json(&output)
}

/// The default configuration as JSON, for editors to start from
#[wasm_bindgen]
pub fn default_config() -> String {
    serde_json::to_string(&CityConfig::default()).unwrap_or_else(|_| "{}".to_string())
}

fn run(source: &str, cfg: &CityConfig, loads: Option<&LoadTable>) -> CityOutput {
    let output = crate::compile_city_output(source, cfg, loads);
    if let Some(err) = &output.error {
        report_error(&format!("Error compiling city: {}", err.message));
    }
    output
}

fn parse_config(json: &str) -> Result<CityConfig> {
    if json.trim().is_empty() {
        return Ok(CityConfig::default());
    }
    let cfg: CityConfig = serde_json::from_str(json)?;
    cfg.validate()?;
    Ok(cfg)
}

fn parse_loads(json: &str) -> Result<Option<LoadTable>> {
    if json.trim().is_empty() {
        return Ok(None);
    }
    LoadTable::from_json(json).map(Some)
}

fn to_json(output: &CityOutput) -> String {
    serde_json::to_string(output).unwrap_or_else(|e| {
        report_error(&format!("Error serializing output: {e}"));
        SERIALIZE_FAILED.to_string()
    })
}

fn report_error(msg: &str) {
    tracing::error!("{msg}");
    // console bindings only exist inside a JS host
    #[cfg(target_arch = "wasm32")]
    console_error(msg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parse(json: &str) -> Value {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_compile_city_returns_nested_json() {
        let out = parse(&compile_city("\"x.A\" -> \"x.B\"\n"));

        assert!(out.get("error").is_none());
        assert_eq!(out["root"]["children"][0]["name"], "x");
        assert_eq!(out["root"]["children"][0]["children"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_warnings_are_reported_with_positions() {
        let out = parse(&compile_city("\"A\" -> \"B\"\noops\n"));

        assert_eq!(out["warnings"][0]["line"], 2);
        assert_eq!(out["warnings"][0]["column"], 1);
        assert!(out["root"].is_object());
    }

    #[test]
    fn test_options_are_applied() {
        let default = parse(&compile_city_with_options("\"A\" -> \"B\"", "", ""));
        let wide = parse(&compile_city_with_options("\"A\" -> \"B\"", r#"{"spacing": 4.0}"#, ""));

        let len = |v: &Value| v["root"]["footprint"]["length"].as_f64().unwrap();
        assert!(len(&wide) > len(&default));
    }

    #[test]
    fn test_bad_options_become_error_output() {
        let out = parse(&compile_city_with_options("\"A\" -> \"B\"", "{not json", ""));
        assert!(out["error"]["message"].as_str().unwrap().starts_with("JSON error"));
        assert!(out.get("root").is_none());

        let out = parse(&compile_city_with_options("", r#"{"spacing": -2}"#, ""));
        assert!(out["error"]["message"].as_str().unwrap().starts_with("Configuration error"));
    }

    #[test]
    fn test_loads_add_links() {
        let loads = r#"{"calls": [{"parent": "B", "component": "A", "load": 3.0}]}"#;
        let out = parse(&compile_city_with_options("\"A\" -> \"B\"", "", loads));

        assert_eq!(out["links"][0]["from"], "A");
        assert_eq!(out["links"][0]["to"], "B");
    }

    #[test]
    fn test_default_config_round_trips() {
        let cfg: CityConfig = serde_json::from_str(&default_config()).unwrap();
        assert_eq!(cfg, CityConfig::default());
    }
}
