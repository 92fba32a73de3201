//! End-to-end rendering tests: whole template sets through the public
//! `Engine` API with the standard filter and function libraries.

#![allow(clippy::unwrap_used)]

use ktemplate::{ArrayLoader, Engine, Error, JsonDataProvider};
use serde_json::{json, Value};

fn engine(files: &[(&str, &str)]) -> Engine {
    let mut engine = Engine::new(ArrayLoader::new(files.iter().copied()));
    ktemplate::filters::register_all(&mut engine);
    ktemplate::functions::register_all(&mut engine);
    engine
}

fn render(files: &[(&str, &str)], data: Value) -> Result<String, Error> {
    let main = files.first().map(|(name, _)| *name).unwrap();
    engine(files).render(main, &JsonDataProvider::new(data))
}

#[test]
fn simple_sum() {
    let out = render(&[("main.template", "{{ 1 + 2 }}")], json!({})).unwrap();
    assert_eq!(out, "3");
}

#[test]
fn expressions_and_locals() {
    let src = r#"{{ a.b.c }}
{{ a|length }}
{{ "Hello, " ~ "World" }}
{{ "5293" matches `/\d+/` }}
{% let $v = 5.1 %}{{ $v * 2 }}
{% set $v = $v / 2 %}{{ $v }}"#;
    let out = render(&[("main.template", src)], json!({"a": {"b": {"c": 10}}})).unwrap();
    assert_eq!(out, "10\n1\nHello, World\n1\n10.2\n2.55");
}

#[test]
fn builtins() {
    let src = "{% let $s = '432' %}{% if starts_with($s, '4') -%}
    Capitalized={{ 'alex'|capitalize }}
{% end -%}
{{ languages|first|first }} {{ languages|first }} {{ languages|last }} {{ languages|keys|first }}";
    let out = render(&[("main.template", src)], json!({"languages": ["KPHP", "PHP"]})).unwrap();
    assert_eq!(out, "Capitalized=Alex\nK KPHP PHP 0");
}

#[test]
fn whitespace_control() {
    let src = "{% for $name, $v in prices -%}
    {{ $name }}: {{ $v -}}
    {% if $v > 100000 %} (WOW!){% end %}
{% end %}";
    let data = json!({"prices": {"laptop": 65020, "apple": 50, "compiler": 248_184_271}});
    let out = render(&[("main.template", src)], data).unwrap();
    assert_eq!(out, "laptop: 65020\napple: 50\ncompiler: 248184271 (WOW!)\n");
}

#[test]
fn escaping_strategies() {
    let src = r#"{% let $html = '<i>boom</i>' %}{{ $html }}|{{ $html|raw }}|{{ $html|escape }}|{{ "Status: OK"|e("url") }}"#;
    let out = render(&[("main.template", src)], json!({})).unwrap();
    assert_eq!(
        out,
        "&lt;i&gt;boom&lt;/i&gt;|<i>boom</i>|&lt;i&gt;boom&lt;/i&gt;|Status%3A%20OK"
    );
}

#[test]
fn include_with_block_args() {
    let child = r#"{% let $content %}Custom content.{% end %}
{%- include "base.template" %}
    {% arg $content = $content %}
    {% arg $title %}My super title{% end %}
{% end %}"#;
    let base = r#"{% param $title = "Default Title" %}
{%- param $content %}Default content for {{ $title }}{% end %}
<h1>{{ $title }}</h1>
{{ $content|raw }}"#;
    let files = [("child.template", child), ("base.template", base)];
    let out = render(&files, json!({})).unwrap();
    assert_eq!(out, "\n<h1>My super title</h1>\nCustom content.");

    let out = render(&[("base.template", base)], json!({})).unwrap();
    assert_eq!(out, "\n<h1>Default Title</h1>\nDefault content for Default Title");
}

#[test]
fn loop_over_data_items() {
    let src = "{% for $i, $item in page.items %}{{ $i ~ \": \" ~ $item['name'] }};{% end %}";
    let data = json!({"page": {"items": [{"name": "Bidon Pomoev"}, {"name": "Rulon Oboev"}]}});
    let out = render(&[("main.template", src)], data).unwrap();
    assert_eq!(out, "0: Bidon Pomoev;1: Rulon Oboev;");
}

#[test]
fn empty_echo_is_a_compilation_error() {
    let err = render(&[("main.template", "{{ }}")], json!({})).unwrap_err();
    assert!(matches!(err, Error::Compilation(_)));
    assert!(err.full_message().contains("}}"));
}

#[test]
fn errors_in_included_files_name_that_file() {
    let files = [
        ("main.template", "{% include \"ui/x.template\" %}{% end %}"),
        ("ui/x.template", "ok\n{% if %}"),
    ];
    let err = render(&files, json!({})).unwrap_err();
    assert!(err.full_message().starts_with("ui/x.template:2: "));
}

#[test]
fn disassembly_of_constant_echo() {
    let engine = engine(&[("main.template", "{{ 1 }}")]);
    let template = engine.get_template("main.template").unwrap();
    let lines = engine.disassemble(&template, 24);
    assert!(!lines.is_empty());
    assert_eq!(lines.last().map(String::as_str), Some("  RETURN"));
}

#[test]
fn engine_version_is_reported() {
    assert!(ktemplate::engine_version().starts_with("ktemplate "));
}
