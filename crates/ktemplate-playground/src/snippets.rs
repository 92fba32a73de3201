//! The fixed catalog of example templates offered by the playground UI
//! and the Rust client.

use serde::Serialize;

/// One example: a template blob and the JSON data to render it with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Snippet {
    /// Label shown in the snippet selector.
    pub name: &'static str,
    /// Template blob, possibly holding several `--- name` files.
    pub src: &'static str,
    /// JSON text for the data field.
    pub data: &'static str,
}

/// All snippets, in selector order. The first one is shown on load.
pub const SNIPPETS: &[Snippet] = &[
    Snippet {
        name: "Welcome",
        src: r#"{#
    Welcome to the KTemplate playground!
    You can edit and explore templates here.
#}

Here are some example expressions for you:
{{ a.b.c }}
{{ a|length }}
{{ "Hello, " ~ "World" }}
{{ "5293" matches `/\d+/` }}

Note that a.b.c comes from the template data.

You can declare and modify template-local variables:
{% let $v = 5.1 %}
{{ $v * 2 }}
{% set $v = $v / 2 %}
{{ $v }}"#,
        data: r#"{"a": {"b": {"c": 10}}}"#,
    },
    Snippet {
        name: "Multi file",
        src: r#"--- main.template
{# It's possible to use multi-file templates #}
{# Use --- followed by a file name #}
{% include "ui/button.template" %}
    {% arg $name = "example" %}
{% end %}

--- ui/button.template
{% param $name = "button" %}
{% param $label = "" %}
{% if $label %}
<label>
    {{$label}}:
    <input id="ui-{{$name}}" type="button" value="{{$name}}">
</label>
{% else %}
    <input id="ui-{{$name}}" type="button" value="{{$name}}">
{% end %}"#,
        data: "{}",
    },
    Snippet {
        name: "For loop",
        src: r#"Loop over values:
{% for $item in page.items %}
    {{ $item['name'] }}
{% end %}

Loop over keys and values:
{% for $i, $item in page.items %}
    {{ $i ~ ": " ~ $item['name'] }}
{% end %}"#,
        data: r#"{"page": {"items": [{"name": "Bidon Pomoev"}, {"name": "Rulon Oboev"}]}}"#,
    },
    Snippet {
        name: "Escape/raw",
        src: r#"{% let $html = '<i>boom</i>' %}

This sandbox uses auto-escaping for HTML:
{{ $html }}

It's possible to output the value "as is":
{{ $html|raw }}

Like in Twig, you can apply the escaping manually:
{{ $html|escape }}
Escape filter is aliased to "e" for convenience.

It's also possible to choose the escaping strategy:
{{ "Status: OK"|e("url") }}"#,
        data: "{}",
    },
    Snippet {
        name: "Block assign",
        src: r#"--- child.template
{% let $content %}
    This is our custom content.
    Try removing the arg tag to see the default content.
{% end %}

{% include "base.template" %}
    {% arg $content = $content %}
    {% arg $title %}My super title{% end %}
{% end %}

--- base.template
{% param $title = "Default Title" %}
{% param $content %}
    This is some default content.
    {# It's possible to use tags here too #}
    (The title is "{{ $title }}")
{% end %}

<h1>{{ $title }}</h1>
Page content is:
{{ $content|raw }}"#,
        data: "{}",
    },
    Snippet {
        name: "Builtins",
        src: r"{% let $s = '432' %}
{% if starts_with($s, '4') %}
    Capitalized={{ 'alex'|capitalize }}
{% end %}
{{ languages|first|first }}
{{ languages|first }}
{{ languages|last }}
{{ languages|keys|first }}",
        data: r#"{"languages": ["KPHP", "PHP"]}"#,
    },
    Snippet {
        name: "Whitespace control",
        src: r#"With "-" tag modifier you can control the whitespaces

Every loop iteration produces exactly 1-line output:

{% for $name, $v in prices -%}
    {{ $name }}: {{ $v -}}
    {% if $v > 100000 %} (WOW! That's a lot!){% end %}
{% end %}"#,
        data: r#"{"prices": {"laptop": 65020, "apple": 50, "compiler": 248184271}}"#,
    },
];

/// Look up a snippet by its label.
pub fn find(name: &str) -> Option<&'static Snippet> {
    SNIPPETS.iter().find(|snippet| snippet.name == name)
}
