// build.rs
//
// Compiles `locales/<lang>.toml` into the `t!` macro used for user-facing CLI text.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

const FALLBACK_LANG: &str = "en";

fn main() {
    // --- 1. Pick the language: `lang_*` feature first, then ARGTREE_LANG, then English ---
    let mut feature_langs: Vec<String> = env::vars()
        .filter_map(|(key, _)| key.strip_prefix("CARGO_FEATURE_LANG_").map(str::to_lowercase))
        .collect();
    feature_langs.sort();

    let lang = match feature_langs.first() {
        Some(first) => {
            if feature_langs.len() > 1 {
                println!(
                    "cargo:warning=Several language features are enabled ({:?}); using '{}'.",
                    feature_langs, first
                );
            }
            first.clone()
        }
        None => env::var("ARGTREE_LANG").unwrap_or_else(|_| FALLBACK_LANG.to_string()),
    };

    println!("cargo:rustc-env=ARGTREE_LANG_EFFECTIVE={}", lang);
    println!("cargo:rerun-if-env-changed=ARGTREE_LANG");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=locales/");

    // --- 2. English is the base table; every other language only overrides keys ---
    let mut table = load_table(FALLBACK_LANG)
        .unwrap_or_else(|e| panic!("Base locale could not be loaded: {}", e));

    if lang != FALLBACK_LANG {
        match load_table(&lang) {
            Ok(overrides) => {
                for key in overrides.keys() {
                    if !table.contains_key(key) {
                        println!(
                            "cargo:warning=Locale '{}' defines unknown key '{}'.",
                            lang, key
                        );
                    }
                }
                table.extend(overrides);
            }
            Err(e) => println!(
                "cargo:warning=Locale '{}' unavailable ({}). Falling back to '{}'.",
                lang, e, FALLBACK_LANG
            ),
        }
    }

    // --- 3. Emit the macro. Unknown keys become compile errors at the call site ---
    let mut code = String::from("#[macro_export]\nmacro_rules! t {\n");
    for (key, value) in &table {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        code.push_str(&format!("    (\"{}\") => {{ \"{}\" }};\n", key, escaped));
    }
    code.push_str(
        "    ($key:expr) => {{ compile_error!(concat!(\"Missing translation key: \", $key)) }};\n",
    );
    code.push('}');

    let out_dir = env::var("OUT_DIR").expect("cargo always sets OUT_DIR");
    fs::write(Path::new(&out_dir).join("translations.rs"), code)
        .expect("Failed to write generated translations");
}

fn load_table(lang: &str) -> Result<BTreeMap<String, String>, String> {
    let path = format!("locales/{}.toml", lang);
    let content = fs::read_to_string(&path).map_err(|e| format!("{}: {}", path, e))?;
    toml::from_str(&content).map_err(|e| format!("{}: {}", path, e))
}
