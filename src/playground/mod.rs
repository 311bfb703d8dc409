//! Sandbox documents for the code playgrounds.
//!
//! The server only builds the documents; they are meant to be loaded into a
//! sandboxed iframe (`sandbox="allow-scripts"`) through `srcdoc`. Nothing
//! submitted here is ever executed server side.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// HTML, CSS and JS for the live web preview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSnippet {
    pub html: String,
    pub css: String,
    pub js: String,
}

impl Default for WebSnippet {
    fn default() -> Self {
        Self {
            html: "<h1>Hello, world!</h1>".to_string(),
            css: "body{font-family:system-ui;padding:1rem} h1{letter-spacing:.5px}".to_string(),
            js: "console.log(\"JS is running!\")".to_string(),
        }
    }
}

/// A named boolean expression evaluated after the user's code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptTest {
    pub name: String,
    pub expr: String,
}

impl ScriptTest {
    pub fn new(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expr: expr.into(),
        }
    }
}

/// Tests used when a script submission carries none
pub fn default_tests() -> Vec<ScriptTest> {
    vec![
        ScriptTest::new("sum(2,3) === 5", "sum(2,3) === 5"),
        ScriptTest::new("sum(-1,1) === 0", "sum(-1,1) === 0"),
    ]
}

/// Neutralise closing `</script` and `</style` tags so embedded text cannot
/// end the element it is placed in
pub fn escape_embedded(text: &str) -> String {
    static CLOSING: OnceLock<Regex> = OnceLock::new();
    let re = CLOSING.get_or_init(|| Regex::new(r"(?i)</(script|style)").unwrap());
    re.replace_all(text, r"<\/$1").into_owned()
}

/// Preview document for an HTML/CSS/JS snippet. Runtime errors in the script
/// are reported to the console instead of aborting the page.
pub fn web_document(snippet: &WebSnippet) -> String {
    format!(
        r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8" />
  <style>{css}</style>
</head>
<body>
  {html}
  <script>
    try {{ {js} }} catch(e) {{ console.error(e); }}
  </script>
</body>
</html>
"#,
        css = escape_embedded(&snippet.css),
        html = snippet.html,
        js = escape_embedded(&snippet.js),
    )
}

/// Test harness document for a JavaScript exercise.
///
/// `console.log` output is captured, the code runs, then each test expression
/// is evaluated to a boolean. The page posts
/// `{ __jsplay: true, out, res }` to its parent; a thrown error posts its
/// message in `out` with `res: null`.
pub fn script_harness(code: &str, tests: &[ScriptTest]) -> String {
    let test_code = tests
        .iter()
        .enumerate()
        .map(|(i, test)| {
            let name = serde_json::Value::String(test.name.clone()).to_string();
            format!(
                "try{{ _res[{i}]={{name:{name}, ok:Boolean({expr})}} }}catch(e){{ _res[{i}]={{name:{name}, ok:false}} }}",
                expr = test.expr,
            )
        })
        .collect::<Vec<_>>()
        .join("\n      ");

    let script = format!(
        r#"
  (function(){{
    const out = [];
    const push = (v) => out.push(String(v));
    const origLog = console.log;
    console.log = (...a)=>{{ push(a.map(x => (typeof x==='object'? JSON.stringify(x) : String(x))).join(' ')); origLog(...a) }};

    try {{
      {code}
      const _res = [];
      {test_code}
      parent.postMessage({{ __jsplay: true, out, res: _res }}, '*');
    }} catch (e) {{
      parent.postMessage({{ __jsplay: true, out: [e.message], res: null }}, '*');
    }}
  }})();
"#
    );

    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"></head><body>\n<script>{}</script>\n</body></html>\n",
        escape_embedded(&script)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_document_layout() {
        let doc = web_document(&WebSnippet::default());
        assert!(doc.starts_with("<!doctype html>"));
        assert!(doc.contains("<meta charset=\"utf-8\" />"));
        assert!(doc.contains("<style>body{font-family:system-ui"));
        assert!(doc.contains("<h1>Hello, world!</h1>"));
        assert!(doc.contains("try { console.log(\"JS is running!\") } catch(e) { console.error(e); }"));
    }

    #[test]
    fn test_closing_tags_are_neutralised() {
        let doc = web_document(&WebSnippet {
            html: "<p>hi</p>".to_string(),
            css: "p{color:red}</style><script>alert(1)</script>".to_string(),
            js: "const s = '</SCRIPT><b>';".to_string(),
        });
        assert_eq!(doc.matches("</style>").count(), 1);
        assert_eq!(doc.matches("</script>").count(), 1);
        assert!(doc.contains(r"<\/style>"));
        assert!(doc.contains(r"<\/SCRIPT>"));
    }

    #[test]
    fn test_script_harness() {
        let doc = script_harness("function sum(a, b){ return a + b }", &default_tests());
        assert!(doc.contains("function sum(a, b){ return a + b }"));
        assert!(doc.contains("_res[0]={name:\"sum(2,3) === 5\", ok:Boolean(sum(2,3) === 5)}"));
        assert!(doc.contains("_res[1]={name:\"sum(-1,1) === 0\""));
        assert!(doc.contains("__jsplay: true, out, res: _res"));
        assert_eq!(doc.matches("</script>").count(), 1);
    }

    #[test]
    fn test_harness_escapes_test_names() {
        let tests = vec![ScriptTest::new("quote \" and </script>", "true")];
        let doc = script_harness("", &tests);
        assert!(doc.contains(r#"name:"quote \" and <\/script>""#));
        assert_eq!(doc.matches("</script>").count(), 1);
    }
}
