//! The playground's HTML page.
//!
//! Rendered once at startup with `minijinja`. The page embeds a JSON
//! blob for `app.js` holding the API base path and the snippet catalog.

use minijinja::{context, Environment};

use crate::snippets::SNIPPETS;

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html.j2");

/// Render the index page for a playground mounted at `mount_prefix`.
pub fn render_index(mount_prefix: &str) -> Result<String, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template("index.html", INDEX_TEMPLATE)?;

    let page_config = serde_json::json!({
        "api_base": format!("{mount_prefix}/api"),
        "snippets": SNIPPETS,
    });
    // Embedded in a <script> element: `</` must not close it early.
    let page_config = page_config.to_string().replace("</", r"<\/");

    env.get_template("index.html")?.render(context! {
        engine_version => ktemplate::engine_version(),
        page_config => page_config,
        snippet_names => SNIPPETS.iter().map(|s| s.name).collect::<Vec<_>>(),
    })
}
