//! Maintenance console program (`main.rs`) and its manifest (`Cargo.toml`).
//!
//! The emitted program only declares the per-state tables and the BuildId;
//! the protocol, handshake and REPL live in [`crate::console`]. The manifest
//! makes the `console/` directory a standalone package depending on this
//! crate, so `cargo run` works there without a host workspace.

use super::{Emitter, GENERATED_BANNER};
use crate::error::StatewireError;
use crate::model::{DeviceRole, Model};

pub fn generate_console(model: &Model, build_id: u32) -> Result<String, StatewireError> {
    super::check_preconditions(model)?;
    let mut e = Emitter::new();
    e.line(format!("// {GENERATED_BANNER}"));
    e.line("use statewire::console::StateTable;");
    e.line("use statewire::scalar::ScalarType;");
    e.blank();
    e.line(format!("const BUILD_ID: u32 = {build_id:#010x};"));
    e.blank();
    e.block("fn states() -> Vec<StateTable> {", "}", |e| {
        e.block("vec![", "]", |e| {
            for state in model.states() {
                let mut chain = vec![format!("StateTable::new({:?}, {})", state.name, state.index)];
                let primary = state.device(DeviceRole::Primary);
                let surface = state.device(DeviceRole::Surface);
                chain.extend(primary.values.iter().map(|v| {
                    format!(".primary_value({:?}, {})", v.name, v.ty.rust_path())
                }));
                chain.extend(primary.events.iter().map(|ev| format!(".primary_event({ev:?})")));
                chain.extend(surface.values.iter().map(|v| {
                    format!(".surface_value({:?}, {})", v.name, v.ty.rust_path())
                }));
                chain.extend(surface.events.iter().map(|ev| format!(".surface_event({ev:?})")));
                let last = chain.len() - 1;
                for (i, part) in chain.iter().enumerate() {
                    let text = if i == last { format!("{part},") } else { part.clone() };
                    if i == 0 {
                        e.line(text);
                    } else {
                        e.indent();
                        e.line(text);
                        e.dedent();
                    }
                }
            }
        });
    });
    e.blank();
    e.block("fn main() {", "}", |e| {
        e.line("std::process::exit(statewire::console::main(states(), BUILD_ID));");
    });
    Ok(e.finish())
}

/// Package name for the console of `deployment`: lowercase words joined by `-`.
fn console_package_name(deployment: &str) -> String {
    let words: Vec<String> = deployment
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();
    if words.is_empty() {
        "exhibit-console".to_string()
    } else {
        format!("{}-console", words.join("-"))
    }
}

pub fn generate_console_manifest(deployment: &str, build_id: u32) -> String {
    let name = console_package_name(deployment);
    let version = env!("CARGO_PKG_VERSION");
    let requirement = version.rsplit_once('.').map_or(version, |(major_minor, _)| major_minor);
    let mut e = Emitter::new();
    e.line(format!("# {GENERATED_BANNER}"));
    e.line(format!("# BuildId {build_id:#010x}"));
    e.line("[package]");
    e.line(format!("name = {name:?}"));
    e.line("version = \"0.1.0\"");
    e.line("edition = \"2021\"");
    e.line("publish = false");
    e.blank();
    e.line("[[bin]]");
    e.line(format!("name = {name:?}"));
    e.line("path = \"main.rs\"");
    e.blank();
    e.line("[dependencies]");
    e.line(format!("statewire = {requirement:?}"));
    e.blank();
    e.line("[workspace]");
    e.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_description;

    #[test]
    fn emits_tables_in_order() {
        let model = parse_description(
            "state IDLE { }
             state RUN {
                 primary { values { counter: uint32 } events { go } }
                 surface { values { level: uint8 } events { finished } }
                 unit2 { values { speed: int16 } }
             }",
        )
        .expect("parse");
        let src = generate_console(&model, 0x0102_0304).expect("generate");
        assert!(src.contains("const BUILD_ID: u32 = 0x01020304;"));
        assert!(src.contains("    StateTable::new(\"IDLE\", 0),\n"));
        assert!(src.contains(
            "    StateTable::new(\"RUN\", 1)\n      .primary_value(\"counter\", ScalarType::Uint32)\n      .primary_event(\"go\")\n      .surface_value(\"level\", ScalarType::Uint8)\n      .surface_event(\"finished\"),\n"
        ));
        assert!(!src.contains("speed"));
        assert!(src.contains("statewire::console::main(states(), BUILD_ID)"));
    }

    #[test]
    fn manifest_builds_main_rs_against_this_crate() {
        let toml = generate_console_manifest("Lobby Hall", 0x0a0b_0c0d);
        assert!(toml.starts_with("# Generated by statewire."));
        assert!(toml.contains("# BuildId 0x0a0b0c0d\n"));
        assert!(toml.contains("[package]\nname = \"lobby-hall-console\"\n"));
        assert!(toml.contains("[[bin]]\nname = \"lobby-hall-console\"\npath = \"main.rs\"\n"));
        let requirement = format!(
            "statewire = \"{}.{}\"\n",
            env!("CARGO_PKG_VERSION_MAJOR"),
            env!("CARGO_PKG_VERSION_MINOR")
        );
        assert!(toml.contains(&requirement), "{toml}");
        assert!(toml.trim_end().ends_with("[workspace]"));
    }

    #[test]
    fn package_name_falls_back_for_symbol_only_deployments() {
        assert_eq!(console_package_name("__"), "exhibit-console");
        assert_eq!(console_package_name("DemoUNIT"), "demounit-console");
    }
}
