use anyhow::{Context, Result, anyhow};

use crate::config::TemplateLayout;
use crate::extract::{DYNAMIC_IMPORT_MARKER, STARTUP_MARKER};
use crate::types::{BenchmarkInput, FileTree};

/// Rewrite a base template so it installs and imports the benchmarked
/// dependencies. Pure: the base tree is not modified.
pub fn materialize(
    base: &FileTree,
    input: &BenchmarkInput,
    layout: &TemplateLayout,
) -> Result<FileTree> {
    let mut tree = base.clone();

    let manifest = rewrite_manifest(base, input, layout)?;
    tree.insert(layout.manifest.clone(), manifest);

    if input.bundle {
        let descriptor = base
            .get(&layout.descriptor)
            .ok_or_else(|| anyhow!("Template has no deployment descriptor {}", layout.descriptor))?;
        tree.insert(
            layout.descriptor.clone(),
            descriptor.replace(&layout.entry_source, &layout.bundle_output),
        );
    }

    tree.insert(layout.entry_source.clone(), entrypoint_source(input));
    Ok(tree)
}

fn rewrite_manifest(
    base: &FileTree,
    input: &BenchmarkInput,
    layout: &TemplateLayout,
) -> Result<String> {
    let text = base
        .get(&layout.manifest)
        .ok_or_else(|| anyhow!("Template has no dependency manifest {}", layout.manifest))?;
    let mut manifest: serde_json::Value = serde_json::from_str(text)
        .with_context(|| format!("Template manifest {} is not valid JSON", layout.manifest))?;
    let obj = manifest
        .as_object_mut()
        .ok_or_else(|| anyhow!("Template manifest {} is not a JSON object", layout.manifest))?;

    obj.insert("dependencies".to_string(), input.dependencies.to_json());

    if input.bundle {
        section(obj, "devDependencies").insert(
            layout.bundler.clone(),
            serde_json::Value::String(layout.bundler_version.clone()),
        );
        section(obj, "scripts").insert(
            "build".to_string(),
            serde_json::Value::String(build_script(layout)),
        );
    }

    let mut out = serde_json::to_string_pretty(&manifest)?;
    out.push('\n');
    Ok(out)
}

/// Get (creating or replacing a non-object value) a nested object section.
fn section<'a>(
    obj: &'a mut serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> &'a mut serde_json::Map<String, serde_json::Value> {
    let entry = obj
        .entry(key.to_string())
        .or_insert_with(|| serde_json::Value::Object(Default::default()));
    if !entry.is_object() {
        *entry = serde_json::Value::Object(Default::default());
    }
    match entry {
        serde_json::Value::Object(map) => map,
        _ => unreachable!("section was just replaced with an object"),
    }
}

fn build_script(layout: &TemplateLayout) -> String {
    format!(
        "{} {} --bundle --platform=node --format=esm --outfile={}",
        layout.bundler, layout.entry_source, layout.bundle_output
    )
}

/// Generate the instrumented entry point.
///
/// Eager dependencies are imported statically, in input order. The startup
/// line is printed once they have loaded; lazy dependencies are then imported
/// dynamically, in the order given, followed by the dynamic-import line.
pub fn entrypoint_source(input: &BenchmarkInput) -> String {
    let mut out = String::new();

    for name in input.dependencies.names().filter(|n| !input.is_lazy(n)) {
        out.push_str(&format!("import {};\n", js_string(name)));
    }
    out.push_str("import { performance } from \"node:perf_hooks\";\n\n");
    out.push_str(&format!(
        "console.log(`{STARTUP_MARKER} ${{performance.now()}}`);\n"
    ));

    if input.has_lazy() {
        out.push('\n');
        for name in &input.lazy {
            out.push_str(&format!("await import({});\n", js_string(name)));
        }
        out.push_str(&format!(
            "console.log(`{DYNAMIC_IMPORT_MARKER} ${{performance.now()}}`);\n"
        ));
    }

    out.push_str("\nexport default async function run(payload) {\n  return { ok: true };\n}\n");
    out
}

/// A double-quoted JS string literal. JSON string syntax is a subset of JS.
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}
